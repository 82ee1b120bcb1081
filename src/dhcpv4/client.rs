// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;
use std::time::SystemTime;

use super::packet::{new_udp_packet, parse_udp_packet};
use crate::{
    event::DhcpTimerPool, DhcpError, DhcpV4Action, DhcpV4ArpProber,
    DhcpV4ArpResult, DhcpV4Config, DhcpV4Event, DhcpV4Lease, DhcpV4LeaseStore,
    DhcpV4Machine, DhcpV4NoArpProber, DhcpV4NoLeaseStore, DhcpV4Socket,
    DhcpV4State, DhcpV4Timer, ErrorKind,
};

enum DhcpV4Wakeup {
    Timer(DhcpV4Timer),
    Packet(Result<Vec<u8>, DhcpError>),
}

/// Tokio driver of [DhcpV4Machine]: owns the socket, timers, ARP prober and
/// lease store and carries out the actions of the machine.
#[derive(Debug)]
pub struct DhcpV4Client<S, A = DhcpV4NoArpProber, P = DhcpV4NoLeaseStore> {
    machine: DhcpV4Machine,
    socket: S,
    arp_prober: A,
    lease_store: P,
    timers: DhcpTimerPool<DhcpV4Timer>,
}

impl<S: DhcpV4Socket> DhcpV4Client<S> {
    pub fn new(config: DhcpV4Config, socket: S) -> Self {
        Self::new_full(config, socket, DhcpV4NoArpProber, DhcpV4NoLeaseStore)
    }
}

impl<S, A, P> DhcpV4Client<S, A, P>
where
    S: DhcpV4Socket,
    A: DhcpV4ArpProber,
    P: DhcpV4LeaseStore,
{
    pub fn new_full(
        config: DhcpV4Config,
        socket: S,
        arp_prober: A,
        lease_store: P,
    ) -> Self {
        Self {
            machine: DhcpV4Machine::new(config),
            socket,
            arp_prober,
            lease_store,
            timers: DhcpTimerPool::new(),
        }
    }

    pub fn state(&self) -> DhcpV4State {
        self.machine.state()
    }

    pub fn lease(&self) -> Option<DhcpV4Lease> {
        self.machine.lease()
    }

    pub fn config(&self) -> &DhcpV4Config {
        self.machine.config()
    }

    fn load_cached_lease(&self) -> Option<DhcpV4Lease> {
        let network_id = self.machine.config().network_id();
        if network_id.is_empty() {
            return None;
        }
        match self.lease_store.load(network_id) {
            Ok(Some(lease)) if lease.is_expired(SystemTime::now()) => {
                log::info!(
                    "Cached DHCP lease {} of {network_id} expired",
                    lease.yiaddr
                );
                if let Err(e) = self.lease_store.remove(network_id) {
                    log::warn!("Failed to remove expired DHCP lease: {e}");
                }
                None
            }
            Ok(lease) => lease,
            Err(e) => {
                log::warn!("Failed to load DHCP lease of {network_id}: {e}");
                None
            }
        }
    }

    /// Start acquisition, reusing the stored lease if not expired.
    pub async fn start(&mut self) -> Result<Vec<DhcpV4Action>, DhcpError> {
        let cached = self.load_cached_lease();
        self.process_event(DhcpV4Event::Start(cached)).await
    }

    pub async fn stop(&mut self) -> Result<Vec<DhcpV4Action>, DhcpError> {
        self.process_event(DhcpV4Event::Stop).await
    }

    /// Send DHCPRELEASE for the held lease and stop.
    pub async fn release(&mut self) -> Result<Vec<DhcpV4Action>, DhcpError> {
        self.process_event(DhcpV4Event::Release).await
    }

    /// Wait for the next timer or incoming packet and process it, returning
    /// the actions carried out. A failed send is reported as
    /// [DhcpV4Action::Error] after the [DhcpV4Action::Send] it belongs to.
    pub async fn process_next(
        &mut self,
    ) -> Result<Vec<DhcpV4Action>, DhcpError> {
        if !self.machine.is_running() {
            return Err(DhcpError::new(
                ErrorKind::InvalidArgument,
                format!(
                    "DHCP client of {} is not started",
                    self.machine.config().iface_name()
                ),
            ));
        }
        let wakeup = tokio::select! {
            timer = self.timers.wait() => DhcpV4Wakeup::Timer(timer),
            packet = self.socket.recv() => DhcpV4Wakeup::Packet(packet),
        };
        let event = match wakeup {
            DhcpV4Wakeup::Timer(timer) => DhcpV4Event::TimerExpired(timer),
            DhcpV4Wakeup::Packet(packet) => {
                let packet = packet?;
                log::trace!("Received DHCP reply {packet:?}");
                if self.socket.is_raw() {
                    match parse_udp_packet(&packet) {
                        Ok(payload) => DhcpV4Event::PacketIn(payload.to_vec()),
                        Err(e) => {
                            log::debug!("Ignoring non-DHCP packet: {e}");
                            return Ok(Vec::new());
                        }
                    }
                } else {
                    DhcpV4Event::PacketIn(packet)
                }
            }
        };
        self.process_event(event).await
    }

    /// Process events till a lease is acquired or refreshed.
    pub async fn run(&mut self) -> Result<DhcpV4Lease, DhcpError> {
        loop {
            for action in self.process_next().await? {
                if let DhcpV4Action::SaveLease(lease) = action {
                    return Ok(lease);
                }
            }
        }
    }

    async fn process_event(
        &mut self,
        event: DhcpV4Event,
    ) -> Result<Vec<DhcpV4Action>, DhcpError> {
        let actions = self.machine.process(event);
        self.apply_actions(actions).await
    }

    async fn apply_actions(
        &mut self,
        actions: Vec<DhcpV4Action>,
    ) -> Result<Vec<DhcpV4Action>, DhcpError> {
        let mut pending: VecDeque<DhcpV4Action> = actions.into();
        let mut done = Vec::new();
        while let Some(action) = pending.pop_front() {
            let mut send_error = None;
            match &action {
                DhcpV4Action::Send { msg, dst } => {
                    let payload = msg.to_dhcp_packet();
                    let result = if self.socket.is_raw() {
                        self.socket
                            .send(&new_udp_packet(&payload, *dst), *dst)
                            .await
                    } else {
                        self.socket.send(&payload, *dst).await
                    };
                    // Following actions still apply, the retransmit timer
                    // recovers the lost message
                    if let Err(e) = result {
                        log::warn!(
                            "Failed to send {:?} to {dst:?}: {e}",
                            msg.message_type()
                        );
                        send_error = Some(e);
                    }
                }
                DhcpV4Action::ArmTimer { timer, after } => {
                    self.timers.add_timer(*after, *timer)
                }
                DhcpV4Action::CancelTimer(timer) => self.timers.del_timer(*timer),
                DhcpV4Action::Shutdown => self.timers.remove_all(),
                DhcpV4Action::ProbeAddress(addr) => {
                    let result = match self.arp_prober.probe(*addr).await {
                        Ok(r) => r,
                        Err(e) => {
                            log::warn!(
                                "ARP probe of {addr} failed, treating it as \
                                 free: {e}"
                            );
                            DhcpV4ArpResult::Free
                        }
                    };
                    pending.extend(self.machine.process(
                        DhcpV4Event::ArpProbeDone {
                            addr: *addr,
                            result,
                        },
                    ));
                }
                DhcpV4Action::SaveLease(lease) => self.save_lease(lease),
                DhcpV4Action::DropLease => self.remove_lease(),
                DhcpV4Action::StateChanged(state) => {
                    log::info!(
                        "DHCP client of {} entered {state} state",
                        self.machine.config().iface_name()
                    );
                }
                DhcpV4Action::Error(_) => (),
            }
            done.push(action);
            if let Some(e) = send_error {
                done.push(DhcpV4Action::Error(e));
            }
        }
        Ok(done)
    }

    fn save_lease(&self, lease: &DhcpV4Lease) {
        let network_id = self.machine.config().network_id();
        if network_id.is_empty() {
            return;
        }
        if let Err(e) = self.lease_store.save(network_id, lease) {
            log::warn!("Failed to save DHCP lease of {network_id}: {e}");
        }
    }

    fn remove_lease(&self) {
        let network_id = self.machine.config().network_id();
        if network_id.is_empty() {
            return;
        }
        if let Err(e) = self.lease_store.remove(network_id) {
            log::warn!("Failed to remove DHCP lease of {network_id}: {e}");
        }
    }
}
