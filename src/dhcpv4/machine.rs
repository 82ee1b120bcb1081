// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv4Addr;

use super::time::{
    gen_retransmit_delay, DECLINE_BACKOFF, MAX_REQUEST_RETRY_COUNT,
};
use crate::{
    DhcpError, DhcpV4Action, DhcpV4ArpResult, DhcpV4Config, DhcpV4Destination,
    DhcpV4Event, DhcpV4Lease, DhcpV4Message, DhcpV4MessageType, DhcpV4State,
    DhcpV4Timer, ErrorKind,
};

/// DHCPv4 client protocol state machine.
///
/// The machine does no I/O: each [DhcpV4Event] fed to [Self::process()]
/// returns the [DhcpV4Action]s the caller should carry out in order, for
/// example sending a message or arming a timer. Timers and ARP probes report
/// back as new events.
#[derive(Debug)]
pub struct DhcpV4Machine {
    config: DhcpV4Config,
    state: DhcpV4State,
    started: bool,
    xid: u32,
    retry_count: u32,
    // Offered lease in selecting/requesting or cached lease in
    // init_reboot/rebooting
    pending_lease: Option<DhcpV4Lease>,
    // Acknowledged lease waiting for ARP probe result
    probing_lease: Option<DhcpV4Lease>,
    lease: Option<DhcpV4Lease>,
    // Waiting for DhcpV4Timer::DeclineBackoff, server replies are dropped
    declined: bool,
}

impl DhcpV4Machine {
    pub fn new(config: DhcpV4Config) -> Self {
        Self {
            config,
            state: DhcpV4State::Init,
            started: false,
            xid: rand::random(),
            retry_count: 0,
            pending_lease: None,
            probing_lease: None,
            lease: None,
            declined: false,
        }
    }

    pub fn config(&self) -> &DhcpV4Config {
        &self.config
    }

    pub fn state(&self) -> DhcpV4State {
        self.state
    }

    /// Whether [DhcpV4Event::Start] was processed without [DhcpV4Event::Stop]
    /// or [DhcpV4Event::Release] since.
    pub fn is_running(&self) -> bool {
        self.started
    }

    /// Transaction ID of the outstanding request.
    pub fn xid(&self) -> u32 {
        self.xid
    }

    /// Copy of the committed lease.
    pub fn lease(&self) -> Option<DhcpV4Lease> {
        self.lease.clone()
    }

    pub fn process(&mut self, event: DhcpV4Event) -> Vec<DhcpV4Action> {
        log::debug!("Processing event {event} in state {}", self.state);
        let mut actions = Vec::new();
        match event {
            DhcpV4Event::Start(cached) => self.start(cached, &mut actions),
            DhcpV4Event::Stop => self.stop(&mut actions),
            DhcpV4Event::Release => self.release(&mut actions),
            DhcpV4Event::PacketIn(raw) => {
                self.process_packet(&raw, &mut actions)
            }
            DhcpV4Event::TimerExpired(timer) => {
                self.process_timer(timer, &mut actions)
            }
            DhcpV4Event::ArpProbeDone { addr, result } => {
                self.process_arp_probe(addr, result, &mut actions)
            }
        }
        actions
    }

    fn set_state(&mut self, state: DhcpV4State, actions: &mut Vec<DhcpV4Action>) {
        if self.state != state {
            log::debug!("DHCP state changed from {} to {}", self.state, state);
            self.state = state;
            actions.push(DhcpV4Action::StateChanged(state));
        }
    }

    fn send(
        &self,
        msg: DhcpV4Message,
        dst: DhcpV4Destination,
        actions: &mut Vec<DhcpV4Action>,
    ) {
        log::debug!(
            "Sending {:?} xid {:#x} to {dst:?}",
            msg.message_type(),
            msg.xid
        );
        actions.push(DhcpV4Action::Send { msg, dst });
    }

    fn arm_retransmit(&self, actions: &mut Vec<DhcpV4Action>) {
        actions.push(DhcpV4Action::ArmTimer {
            timer: DhcpV4Timer::Retransmit,
            after: gen_retransmit_delay(self.retry_count),
        });
    }

    fn report(&self, kind: ErrorKind, msg: String, actions: &mut Vec<DhcpV4Action>) {
        let e = DhcpError::new(kind, msg);
        log::warn!("{e}");
        actions.push(DhcpV4Action::Error(e));
    }

    fn start(
        &mut self,
        cached: Option<DhcpV4Lease>,
        actions: &mut Vec<DhcpV4Action>,
    ) {
        if self.started {
            log::debug!("DHCP client already started, ignoring");
            return;
        }
        self.started = true;
        match cached {
            Some(lease) => self.enter_init_reboot(lease, actions),
            None => self.enter_init(actions),
        }
    }

    fn stop(&mut self, actions: &mut Vec<DhcpV4Action>) {
        if self.state == DhcpV4State::Stopped {
            return;
        }
        self.started = false;
        self.declined = false;
        self.retry_count = 0;
        self.pending_lease = None;
        self.probing_lease = None;
        self.lease = None;
        actions.push(DhcpV4Action::Shutdown);
        self.set_state(DhcpV4State::Stopped, actions);
    }

    fn release(&mut self, actions: &mut Vec<DhcpV4Action>) {
        if let Some(lease) = self.lease.as_ref() {
            self.xid = rand::random();
            log::info!("Releasing DHCP lease {}", lease.yiaddr);
            let msg = DhcpV4Message::new_release(self.xid, &self.config, lease);
            let dst = DhcpV4Destination::Unicast(lease.srv_id);
            self.send(msg, dst, actions);
            actions.push(DhcpV4Action::DropLease);
        } else {
            log::debug!("No DHCP lease to release");
        }
        self.stop(actions);
    }

    fn cancel_lease_timers(&self, actions: &mut Vec<DhcpV4Action>) {
        for timer in [
            DhcpV4Timer::Renew,
            DhcpV4Timer::Rebind,
            DhcpV4Timer::LeaseExpired,
        ] {
            actions.push(DhcpV4Action::CancelTimer(timer));
        }
    }

    fn enter_init(&mut self, actions: &mut Vec<DhcpV4Action>) {
        if self.lease.take().is_some() {
            self.cancel_lease_timers(actions);
        }
        self.pending_lease = None;
        self.probing_lease = None;
        self.declined = false;
        self.retry_count = 0;
        self.xid = rand::random();
        self.set_state(DhcpV4State::Init, actions);
        let msg = DhcpV4Message::new_discovery(self.xid, &self.config);
        self.send(msg, DhcpV4Destination::Broadcast, actions);
        self.arm_retransmit(actions);
    }

    fn enter_init_reboot(
        &mut self,
        lease: DhcpV4Lease,
        actions: &mut Vec<DhcpV4Action>,
    ) {
        self.retry_count = 0;
        self.xid = rand::random();
        self.set_state(DhcpV4State::InitReboot, actions);
        log::info!("Requesting cached DHCP lease {}", lease.yiaddr);
        let msg = DhcpV4Message::new_init_reboot(self.xid, &self.config, &lease);
        self.send(msg, DhcpV4Destination::Broadcast, actions);
        self.arm_retransmit(actions);
        self.pending_lease = Some(lease);
    }

    fn enter_selecting(
        &mut self,
        lease: DhcpV4Lease,
        actions: &mut Vec<DhcpV4Action>,
    ) {
        // RFC 2131 4.4.1: DHCPREQUEST in selecting state reuses the xid of
        // DHCPDISCOVER.
        self.retry_count = 0;
        self.set_state(DhcpV4State::Selecting, actions);
        log::info!(
            "Got DHCP offer {} from server {}",
            lease.yiaddr,
            lease.srv_id
        );
        let msg = DhcpV4Message::new_request(self.xid, &self.config, &lease);
        self.send(msg, DhcpV4Destination::Broadcast, actions);
        self.arm_retransmit(actions);
        self.pending_lease = Some(lease);
    }

    fn enter_renewing(&mut self, actions: &mut Vec<DhcpV4Action>) {
        self.retry_count = 0;
        self.xid = rand::random();
        self.set_state(DhcpV4State::Renewing, actions);
        self.send_renew(actions);
    }

    fn enter_rebinding(&mut self, actions: &mut Vec<DhcpV4Action>) {
        self.retry_count = 0;
        self.xid = rand::random();
        self.set_state(DhcpV4State::Rebinding, actions);
        self.send_renew(actions);
    }

    fn send_renew(&mut self, actions: &mut Vec<DhcpV4Action>) {
        let lease = match self.lease.as_ref() {
            Some(l) => l,
            None => {
                log::error!(
                    "BUG: Got empty lease but in {} state, rollback to init",
                    self.state
                );
                self.enter_init(actions);
                return;
            }
        };
        let dst = if self.state == DhcpV4State::Renewing
            && self.config.unicast_arp
        {
            DhcpV4Destination::Unicast(lease.srv_id)
        } else {
            DhcpV4Destination::Broadcast
        };
        let msg = DhcpV4Message::new_renew(self.xid, &self.config, lease);
        self.send(msg, dst, actions);
        self.arm_retransmit(actions);
    }

    fn resend_request(&mut self, actions: &mut Vec<DhcpV4Action>) {
        let lease = match self.pending_lease.as_ref() {
            Some(l) => l,
            None => {
                log::error!(
                    "BUG: Got empty pending lease but in {} state, rollback \
                     to init",
                    self.state
                );
                self.enter_init(actions);
                return;
            }
        };
        let msg = match self.state {
            DhcpV4State::InitReboot | DhcpV4State::Rebooting => {
                DhcpV4Message::new_init_reboot(self.xid, &self.config, lease)
            }
            _ => DhcpV4Message::new_request(self.xid, &self.config, lease),
        };
        self.send(msg, DhcpV4Destination::Broadcast, actions);
        self.arm_retransmit(actions);
    }

    fn bind(&mut self, lease: DhcpV4Lease, actions: &mut Vec<DhcpV4Action>) {
        self.pending_lease = None;
        self.probing_lease = None;
        self.retry_count = 0;
        actions.push(DhcpV4Action::CancelTimer(DhcpV4Timer::Retransmit));
        for (timer, after) in [
            (DhcpV4Timer::Renew, lease.t1()),
            (DhcpV4Timer::Rebind, lease.t2()),
            (DhcpV4Timer::LeaseExpired, lease.lease_time()),
        ] {
            actions.push(DhcpV4Action::ArmTimer { timer, after });
        }
        log::info!(
            "DHCP lease {} acquired from server {} for {} seconds",
            lease.yiaddr,
            lease.srv_id,
            lease.lease_time_sec
        );
        self.lease = Some(lease.clone());
        actions.push(DhcpV4Action::SaveLease(lease));
        self.set_state(DhcpV4State::Bound, actions);
    }

    fn process_packet(&mut self, raw: &[u8], actions: &mut Vec<DhcpV4Action>) {
        if !self.started {
            log::debug!("Dropping DHCP packet as client is not started");
            return;
        }
        if self.declined {
            log::debug!(
                "Dropping DHCP packet during back-off after DHCPDECLINE"
            );
            return;
        }
        let msg = match DhcpV4Message::parse(raw) {
            Ok(m) => m,
            Err(e) => {
                log::info!("Ignoring invalid DHCP packet: {e}");
                return;
            }
        };
        if msg.xid != self.xid {
            log::debug!(
                "Dropping DHCP message due to xid miss-match. Expecting \
                 {:#x}, got {:#x}",
                self.xid,
                msg.xid
            );
            return;
        }
        if msg.chaddr.as_slice() != self.config.hw_addr.as_slice() {
            log::debug!(
                "Dropping DHCP message due to client hardware address \
                 miss-match: {:?}",
                msg.chaddr
            );
            return;
        }
        let msg_type = match msg.message_type() {
            Some(t) => t,
            None => {
                log::debug!(
                    "Dropping DHCP message with unknown message type {:?}",
                    msg.options.message_type
                );
                return;
            }
        };
        match (msg_type, self.state) {
            (DhcpV4MessageType::Nack, _) => self.process_nak(&msg, actions),
            (DhcpV4MessageType::Offer, DhcpV4State::Init) => {
                match DhcpV4Lease::new_from_msg(&msg) {
                    Ok(lease) => self.enter_selecting(lease, actions),
                    Err(e) => log::info!("Ignoring DHCP offer: {e}"),
                }
            }
            (
                DhcpV4MessageType::Ack,
                DhcpV4State::Selecting
                | DhcpV4State::Requesting
                | DhcpV4State::InitReboot
                | DhcpV4State::Rebooting,
            ) => {
                if self.probing_lease.is_some() {
                    log::debug!("Dropping DHCP ACK as ARP probe in progress");
                    return;
                }
                match DhcpV4Lease::new_from_msg(&msg) {
                    Ok(lease) if self.config.arp_gateway => {
                        actions.push(DhcpV4Action::CancelTimer(
                            DhcpV4Timer::Retransmit,
                        ));
                        log::debug!(
                            "Probing whether {} is used by other host",
                            lease.yiaddr
                        );
                        actions.push(DhcpV4Action::ProbeAddress(lease.yiaddr));
                        self.probing_lease = Some(lease);
                    }
                    Ok(lease) => self.bind(lease, actions),
                    Err(e) => log::info!("Ignoring DHCP ACK: {e}"),
                }
            }
            (
                DhcpV4MessageType::Ack,
                DhcpV4State::Renewing | DhcpV4State::Rebinding,
            ) => match DhcpV4Lease::new_from_msg(&msg) {
                Ok(lease) => self.bind(lease, actions),
                Err(e) => log::info!("Ignoring DHCP ACK: {e}"),
            },
            (t, s) => {
                log::debug!("Dropping unexpected {t} in state {s}");
            }
        }
    }

    fn process_nak(&mut self, msg: &DhcpV4Message, actions: &mut Vec<DhcpV4Action>) {
        self.report(
            ErrorKind::Nak,
            format!(
                "Got DHCP NAK from server {:?} in state {}",
                msg.options.server_identifier, self.state
            ),
            actions,
        );
        actions.push(DhcpV4Action::DropLease);
        self.enter_init(actions);
    }

    fn process_timer(
        &mut self,
        timer: DhcpV4Timer,
        actions: &mut Vec<DhcpV4Action>,
    ) {
        if !self.started {
            log::debug!("Ignoring timer {timer} as client is not started");
            return;
        }
        if self.declined && timer != DhcpV4Timer::DeclineBackoff {
            log::debug!("Ignoring timer {timer} during back-off");
            return;
        }
        match (timer, self.state) {
            (DhcpV4Timer::Retransmit, DhcpV4State::Init) => {
                self.retry_count += 1;
                log::info!(
                    "Timeout on waiting DHCP server reply for DHCPDISCOVER, \
                     retrying({})",
                    self.retry_count
                );
                let msg = DhcpV4Message::new_discovery(self.xid, &self.config);
                self.send(msg, DhcpV4Destination::Broadcast, actions);
                self.arm_retransmit(actions);
            }
            (
                DhcpV4Timer::Retransmit,
                DhcpV4State::Selecting
                | DhcpV4State::Requesting
                | DhcpV4State::InitReboot
                | DhcpV4State::Rebooting,
            ) => {
                if self.retry_count >= MAX_REQUEST_RETRY_COUNT {
                    self.report(
                        ErrorKind::Timeout,
                        format!(
                            "No DHCP ACK after {} DHCPREQUEST retries in \
                             state {}, fallback to discovery",
                            self.retry_count, self.state
                        ),
                        actions,
                    );
                    self.enter_init(actions);
                    return;
                }
                self.retry_count += 1;
                match self.state {
                    DhcpV4State::Selecting => {
                        self.set_state(DhcpV4State::Requesting, actions)
                    }
                    DhcpV4State::InitReboot => {
                        self.set_state(DhcpV4State::Rebooting, actions)
                    }
                    _ => (),
                }
                self.resend_request(actions);
            }
            (
                DhcpV4Timer::Retransmit,
                DhcpV4State::Renewing | DhcpV4State::Rebinding,
            ) => {
                self.retry_count += 1;
                log::info!(
                    "Timeout on waiting DHCP ACK in state {}, retrying({})",
                    self.state,
                    self.retry_count
                );
                self.send_renew(actions);
            }
            (DhcpV4Timer::Renew, DhcpV4State::Bound) => {
                log::debug!("DHCP lease T1 expired, entering renewing state");
                self.enter_renewing(actions);
            }
            (
                DhcpV4Timer::Rebind,
                DhcpV4State::Bound | DhcpV4State::Renewing,
            ) => {
                log::debug!("DHCP lease T2 expired, entering rebinding state");
                self.enter_rebinding(actions);
            }
            (DhcpV4Timer::LeaseExpired, s) if s.has_lease() => {
                self.report(
                    ErrorKind::Timeout,
                    format!(
                        "DHCP lease {:?} expired in state {s}",
                        self.lease.as_ref().map(|l| l.yiaddr)
                    ),
                    actions,
                );
                actions.push(DhcpV4Action::DropLease);
                self.enter_init(actions);
            }
            (DhcpV4Timer::DeclineBackoff, DhcpV4State::Init)
                if self.declined =>
            {
                self.enter_init(actions);
            }
            (t, s) => {
                log::debug!("Ignoring stale timer {t} in state {s}");
            }
        }
    }

    fn process_arp_probe(
        &mut self,
        addr: Ipv4Addr,
        result: DhcpV4ArpResult,
        actions: &mut Vec<DhcpV4Action>,
    ) {
        let lease = match self.probing_lease.take() {
            Some(l) if l.yiaddr == addr => l,
            other => {
                log::debug!("Ignoring ARP probe result of {addr}");
                self.probing_lease = other;
                return;
            }
        };
        match result {
            DhcpV4ArpResult::Free => self.bind(lease, actions),
            DhcpV4ArpResult::Conflict => {
                self.report(
                    ErrorKind::ArpConflict,
                    format!(
                        "Address {addr} offered by server {} is used by \
                         other host, declining",
                        lease.srv_id
                    ),
                    actions,
                );
                let msg =
                    DhcpV4Message::new_decline(self.xid, &self.config, &lease);
                self.send(msg, DhcpV4Destination::Broadcast, actions);
                actions.push(DhcpV4Action::DropLease);
                self.pending_lease = None;
                self.retry_count = 0;
                self.xid = rand::random();
                self.declined = true;
                self.set_state(DhcpV4State::Init, actions);
                actions.push(DhcpV4Action::ArmTimer {
                    timer: DhcpV4Timer::DeclineBackoff,
                    after: DECLINE_BACKOFF,
                });
            }
        }
    }
}
