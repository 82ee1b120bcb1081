// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use super::env::{
    ack, armed, init_log, nak, offer, sent, sent_msgs, test_config,
    FOO1_IP, TEST_DHCP_SRV_IP, TEST_DNS_SRV, TEST_GATEWAY, TEST_HW_ADDR,
    TEST_LEASE_TIME,
};
use crate::{
    DhcpV4Action, DhcpV4ArpResult, DhcpV4Config, DhcpV4Destination,
    DhcpV4Event, DhcpV4Machine, DhcpV4MessageType, DhcpV4State, DhcpV4Timer,
    ErrorKind,
};

fn errors(actions: &[DhcpV4Action]) -> Vec<ErrorKind> {
    actions
        .iter()
        .filter_map(|a| match a {
            DhcpV4Action::Error(e) => Some(e.kind()),
            _ => None,
        })
        .collect()
}

fn bound_machine(config: DhcpV4Config) -> DhcpV4Machine {
    let mut m = DhcpV4Machine::new(config);
    m.process(DhcpV4Event::Start(None));
    m.process(DhcpV4Event::PacketIn(offer(m.xid())));
    m.process(DhcpV4Event::PacketIn(ack(m.xid())));
    assert_eq!(m.state(), DhcpV4State::Bound);
    m
}

fn machine_in(state: DhcpV4State) -> DhcpV4Machine {
    let mut m = DhcpV4Machine::new(test_config());
    match state {
        DhcpV4State::Init => {
            m.process(DhcpV4Event::Start(None));
        }
        DhcpV4State::Selecting | DhcpV4State::Requesting => {
            m.process(DhcpV4Event::Start(None));
            m.process(DhcpV4Event::PacketIn(offer(m.xid())));
            if state == DhcpV4State::Requesting {
                m.process(DhcpV4Event::TimerExpired(DhcpV4Timer::Retransmit));
            }
        }
        DhcpV4State::InitReboot | DhcpV4State::Rebooting => {
            let cached = bound_machine(test_config()).lease();
            m.process(DhcpV4Event::Start(cached));
            if state == DhcpV4State::Rebooting {
                m.process(DhcpV4Event::TimerExpired(DhcpV4Timer::Retransmit));
            }
        }
        DhcpV4State::Bound => m = bound_machine(test_config()),
        DhcpV4State::Renewing => {
            m = bound_machine(test_config());
            m.process(DhcpV4Event::TimerExpired(DhcpV4Timer::Renew));
        }
        DhcpV4State::Rebinding => {
            m = bound_machine(test_config());
            m.process(DhcpV4Event::TimerExpired(DhcpV4Timer::Rebind));
        }
        DhcpV4State::Stopped => {
            m.process(DhcpV4Event::Start(None));
            m.process(DhcpV4Event::Stop);
        }
    }
    assert_eq!(m.state(), state);
    m
}

#[test]
fn test_dhcpv4_discovery_to_bound() {
    init_log();
    let mut m = DhcpV4Machine::new(test_config());

    let actions = m.process(DhcpV4Event::Start(None));
    assert_eq!(m.state(), DhcpV4State::Init);
    assert_eq!(
        sent(&actions),
        vec![(DhcpV4MessageType::Discovery, DhcpV4Destination::Broadcast)]
    );
    let discover = sent_msgs(&actions)[0];
    assert_eq!(discover.chaddr, TEST_HW_ADDR.to_vec());
    assert_eq!(
        discover.options.parameter_request_list,
        Some(vec![1, 3, 6, 51, 54, 58, 59])
    );
    assert!(armed(&actions, DhcpV4Timer::Retransmit).is_some());

    let xid = m.xid();
    let actions = m.process(DhcpV4Event::PacketIn(offer(xid)));
    assert_eq!(m.state(), DhcpV4State::Selecting);
    assert!(actions
        .contains(&DhcpV4Action::StateChanged(DhcpV4State::Selecting)));
    assert_eq!(
        sent(&actions),
        vec![(DhcpV4MessageType::Request, DhcpV4Destination::Broadcast)]
    );
    let request = sent_msgs(&actions)[0];
    assert_eq!(request.xid, xid);
    assert_eq!(request.options.requested_ip, Some(FOO1_IP));
    assert_eq!(request.options.server_identifier, Some(TEST_DHCP_SRV_IP));

    let actions = m.process(DhcpV4Event::PacketIn(ack(xid)));
    assert_eq!(m.state(), DhcpV4State::Bound);
    assert!(sent(&actions).is_empty());
    assert!(actions
        .contains(&DhcpV4Action::CancelTimer(DhcpV4Timer::Retransmit)));
    assert_eq!(
        armed(&actions, DhcpV4Timer::Renew),
        Some(Duration::from_secs(1800))
    );
    assert_eq!(
        armed(&actions, DhcpV4Timer::Rebind),
        Some(Duration::from_secs(3150))
    );
    assert_eq!(
        armed(&actions, DhcpV4Timer::LeaseExpired),
        Some(Duration::from_secs(TEST_LEASE_TIME.into()))
    );

    let lease = m.lease().unwrap();
    assert!(actions.contains(&DhcpV4Action::SaveLease(lease.clone())));
    assert_eq!(lease.yiaddr, FOO1_IP);
    assert_eq!(lease.srv_id, TEST_DHCP_SRV_IP);
    assert_eq!(lease.t1_sec, 1800);
    assert_eq!(lease.t2_sec, 3150);
    assert_eq!(lease.prefix_length(), Some(24));
    assert_eq!(lease.gateways, Some(vec![TEST_GATEWAY]));
    assert_eq!(lease.dns_srvs, Some(vec![TEST_DNS_SRV]));
}

#[test]
fn test_dhcpv4_renew_unicast() {
    init_log();
    let mut config = test_config();
    config.set_unicast_arp(true);
    let mut m = bound_machine(config);

    let actions = m.process(DhcpV4Event::TimerExpired(DhcpV4Timer::Renew));
    assert_eq!(m.state(), DhcpV4State::Renewing);
    assert_eq!(
        sent(&actions),
        vec![(
            DhcpV4MessageType::Request,
            DhcpV4Destination::Unicast(TEST_DHCP_SRV_IP)
        )]
    );
    let request = sent_msgs(&actions)[0];
    assert_eq!(request.ciaddr, FOO1_IP);
    assert_eq!(request.options.server_identifier, None);
    assert_eq!(request.options.requested_ip, None);

    let actions = m.process(DhcpV4Event::PacketIn(ack(m.xid())));
    assert_eq!(m.state(), DhcpV4State::Bound);
    assert_eq!(
        armed(&actions, DhcpV4Timer::Renew),
        Some(Duration::from_secs(1800))
    );
}

#[test]
fn test_dhcpv4_renew_broadcast() {
    init_log();
    let mut m = bound_machine(test_config());

    let actions = m.process(DhcpV4Event::TimerExpired(DhcpV4Timer::Renew));
    assert_eq!(m.state(), DhcpV4State::Renewing);
    assert_eq!(
        sent(&actions),
        vec![(DhcpV4MessageType::Request, DhcpV4Destination::Broadcast)]
    );

    let actions =
        m.process(DhcpV4Event::TimerExpired(DhcpV4Timer::Retransmit));
    assert_eq!(m.state(), DhcpV4State::Renewing);
    assert_eq!(sent(&actions).len(), 1);
}

#[test]
fn test_dhcpv4_rebind_and_expire() {
    init_log();
    let mut config = test_config();
    config.set_unicast_arp(true);
    let mut m = bound_machine(config);

    m.process(DhcpV4Event::TimerExpired(DhcpV4Timer::Renew));
    let actions = m.process(DhcpV4Event::TimerExpired(DhcpV4Timer::Rebind));
    assert_eq!(m.state(), DhcpV4State::Rebinding);
    assert_eq!(
        sent(&actions),
        vec![(DhcpV4MessageType::Request, DhcpV4Destination::Broadcast)]
    );

    let actions =
        m.process(DhcpV4Event::TimerExpired(DhcpV4Timer::LeaseExpired));
    assert_eq!(m.state(), DhcpV4State::Init);
    assert_eq!(m.lease(), None);
    assert!(actions.contains(&DhcpV4Action::DropLease));
    assert_eq!(errors(&actions), vec![ErrorKind::Timeout]);
    assert_eq!(
        sent(&actions),
        vec![(DhcpV4MessageType::Discovery, DhcpV4Destination::Broadcast)]
    );
}

#[test]
fn test_dhcpv4_nak_in_any_state() {
    init_log();
    for state in [
        DhcpV4State::Init,
        DhcpV4State::Selecting,
        DhcpV4State::Requesting,
        DhcpV4State::InitReboot,
        DhcpV4State::Rebooting,
        DhcpV4State::Bound,
        DhcpV4State::Renewing,
        DhcpV4State::Rebinding,
    ] {
        let mut m = machine_in(state);
        let actions = m.process(DhcpV4Event::PacketIn(nak(m.xid())));
        assert_eq!(m.state(), DhcpV4State::Init, "NAK in {state}");
        assert_eq!(m.lease(), None, "NAK in {state}");
        assert!(actions.contains(&DhcpV4Action::DropLease), "NAK in {state}");
        assert_eq!(errors(&actions), vec![ErrorKind::Nak]);
        assert_eq!(
            sent(&actions),
            vec![(DhcpV4MessageType::Discovery, DhcpV4Destination::Broadcast)]
        );
    }
}

#[test]
fn test_dhcpv4_request_retry_fallback_to_discovery() {
    init_log();
    let mut m = machine_in(DhcpV4State::Selecting);
    let xid = m.xid();

    for retry in 1..=4u64 {
        let actions =
            m.process(DhcpV4Event::TimerExpired(DhcpV4Timer::Retransmit));
        assert_eq!(m.state(), DhcpV4State::Requesting);
        assert_eq!(m.xid(), xid);
        assert_eq!(
            sent(&actions),
            vec![(DhcpV4MessageType::Request, DhcpV4Destination::Broadcast)]
        );
        let base = 4u64 << retry;
        let base = base.min(64);
        let delay = armed(&actions, DhcpV4Timer::Retransmit).unwrap();
        assert!(
            delay >= Duration::from_secs(base - 1)
                && delay < Duration::from_secs(base + 1),
            "retry {retry} got {delay:?}"
        );
    }

    let actions = m.process(DhcpV4Event::TimerExpired(DhcpV4Timer::Retransmit));
    assert_eq!(m.state(), DhcpV4State::Init);
    assert_eq!(errors(&actions), vec![ErrorKind::Timeout]);
    assert_eq!(
        sent(&actions),
        vec![(DhcpV4MessageType::Discovery, DhcpV4Destination::Broadcast)]
    );
}

#[test]
fn test_dhcpv4_init_reboot() {
    init_log();
    let cached = bound_machine(test_config()).lease();
    let mut m = DhcpV4Machine::new(test_config());

    let actions = m.process(DhcpV4Event::Start(cached));
    assert_eq!(m.state(), DhcpV4State::InitReboot);
    assert_eq!(
        sent(&actions),
        vec![(DhcpV4MessageType::Request, DhcpV4Destination::Broadcast)]
    );
    let request = sent_msgs(&actions)[0];
    assert_eq!(request.options.requested_ip, Some(FOO1_IP));
    assert_eq!(request.options.server_identifier, None);
    assert_eq!(request.ciaddr, std::net::Ipv4Addr::UNSPECIFIED);

    let actions = m.process(DhcpV4Event::TimerExpired(DhcpV4Timer::Retransmit));
    assert_eq!(m.state(), DhcpV4State::Rebooting);
    assert_eq!(
        sent(&actions),
        vec![(DhcpV4MessageType::Request, DhcpV4Destination::Broadcast)]
    );

    m.process(DhcpV4Event::PacketIn(ack(m.xid())));
    assert_eq!(m.state(), DhcpV4State::Bound);
    assert_eq!(m.lease().map(|l| l.yiaddr), Some(FOO1_IP));
}

#[test]
fn test_dhcpv4_arp_probe_free() {
    init_log();
    let mut config = test_config();
    config.set_arp_gateway(true);
    let mut m = DhcpV4Machine::new(config);
    m.process(DhcpV4Event::Start(None));
    m.process(DhcpV4Event::PacketIn(offer(m.xid())));

    let actions = m.process(DhcpV4Event::PacketIn(ack(m.xid())));
    assert_eq!(m.state(), DhcpV4State::Selecting);
    assert!(actions.contains(&DhcpV4Action::ProbeAddress(FOO1_IP)));
    assert!(actions
        .contains(&DhcpV4Action::CancelTimer(DhcpV4Timer::Retransmit)));

    // Result of other address is ignored
    let actions = m.process(DhcpV4Event::ArpProbeDone {
        addr: TEST_GATEWAY,
        result: DhcpV4ArpResult::Free,
    });
    assert!(actions.is_empty());

    m.process(DhcpV4Event::ArpProbeDone {
        addr: FOO1_IP,
        result: DhcpV4ArpResult::Free,
    });
    assert_eq!(m.state(), DhcpV4State::Bound);
}

#[test]
fn test_dhcpv4_arp_probe_conflict() {
    init_log();
    let mut config = test_config();
    config.set_arp_gateway(true);
    let mut m = DhcpV4Machine::new(config);
    m.process(DhcpV4Event::Start(None));
    let old_xid = m.xid();
    m.process(DhcpV4Event::PacketIn(offer(old_xid)));
    m.process(DhcpV4Event::PacketIn(ack(old_xid)));

    let actions = m.process(DhcpV4Event::ArpProbeDone {
        addr: FOO1_IP,
        result: DhcpV4ArpResult::Conflict,
    });
    assert_ne!(m.xid(), old_xid);
    assert_eq!(m.state(), DhcpV4State::Init);
    assert_eq!(m.lease(), None);
    assert_eq!(errors(&actions), vec![ErrorKind::ArpConflict]);
    assert_eq!(
        sent(&actions),
        vec![(DhcpV4MessageType::Decline, DhcpV4Destination::Broadcast)]
    );
    let decline = sent_msgs(&actions)[0];
    assert_eq!(decline.options.requested_ip, Some(FOO1_IP));
    assert_eq!(decline.options.server_identifier, Some(TEST_DHCP_SRV_IP));
    assert_eq!(
        armed(&actions, DhcpV4Timer::DeclineBackoff),
        Some(Duration::from_secs(10))
    );

    // Replies arriving before the back-off ends are dropped, whatever xid
    // they carry
    for xid in [old_xid, m.xid()] {
        assert!(m.process(DhcpV4Event::PacketIn(offer(xid))).is_empty());
        assert!(m.process(DhcpV4Event::PacketIn(nak(xid))).is_empty());
    }
    assert!(m
        .process(DhcpV4Event::TimerExpired(DhcpV4Timer::Retransmit))
        .is_empty());
    assert_eq!(m.state(), DhcpV4State::Init);

    let actions =
        m.process(DhcpV4Event::TimerExpired(DhcpV4Timer::DeclineBackoff));
    assert_eq!(
        sent(&actions),
        vec![(DhcpV4MessageType::Discovery, DhcpV4Destination::Broadcast)]
    );

    // Back to normal discovery afterwards
    let actions = m.process(DhcpV4Event::PacketIn(offer(m.xid())));
    assert_eq!(m.state(), DhcpV4State::Selecting);
    assert_eq!(
        sent(&actions),
        vec![(DhcpV4MessageType::Request, DhcpV4Destination::Broadcast)]
    );
    assert!(m
        .process(DhcpV4Event::TimerExpired(DhcpV4Timer::DeclineBackoff))
        .is_empty());
}

#[test]
fn test_dhcpv4_drop_unmatched_reply() {
    init_log();
    let mut m = machine_in(DhcpV4State::Init);
    let xid = m.xid();

    let actions = m.process(DhcpV4Event::PacketIn(offer(xid.wrapping_add(1))));
    assert!(actions.is_empty());

    let mut reply = super::env::server_reply(DhcpV4MessageType::Offer, xid);
    reply.chaddr = vec![0x00, 0x11, 0x22, 0x33, 0x44, 0x66];
    let actions = m.process(DhcpV4Event::PacketIn(reply.to_dhcp_packet()));
    assert!(actions.is_empty());

    // ACK is not expected in init state
    let actions = m.process(DhcpV4Event::PacketIn(ack(xid)));
    assert!(actions.is_empty());

    let actions = m.process(DhcpV4Event::PacketIn(vec![0u8; 100]));
    assert!(actions.is_empty());

    let mut raw = offer(xid);
    raw.truncate(240);
    let actions = m.process(DhcpV4Event::PacketIn(raw));
    assert!(actions.is_empty());
    assert_eq!(m.state(), DhcpV4State::Init);
}

#[test]
fn test_dhcpv4_stop_and_restart() {
    init_log();
    let mut m = bound_machine(test_config());

    let actions = m.process(DhcpV4Event::Stop);
    assert_eq!(
        actions,
        vec![
            DhcpV4Action::Shutdown,
            DhcpV4Action::StateChanged(DhcpV4State::Stopped)
        ]
    );
    assert!(!m.is_running());
    assert_eq!(m.lease(), None);

    assert!(m
        .process(DhcpV4Event::TimerExpired(DhcpV4Timer::Renew))
        .is_empty());
    assert!(m.process(DhcpV4Event::PacketIn(ack(m.xid()))).is_empty());
    assert!(m.process(DhcpV4Event::Stop).is_empty());

    let actions = m.process(DhcpV4Event::Start(None));
    assert_eq!(m.state(), DhcpV4State::Init);
    assert!(actions.contains(&DhcpV4Action::StateChanged(DhcpV4State::Init)));
    assert_eq!(
        sent(&actions),
        vec![(DhcpV4MessageType::Discovery, DhcpV4Destination::Broadcast)]
    );
}

#[test]
fn test_dhcpv4_start_twice() {
    init_log();
    let mut m = machine_in(DhcpV4State::Selecting);
    assert!(m.process(DhcpV4Event::Start(None)).is_empty());
    assert_eq!(m.state(), DhcpV4State::Selecting);
}

#[test]
fn test_dhcpv4_release() {
    init_log();
    let mut m = bound_machine(test_config());

    let actions = m.process(DhcpV4Event::Release);
    assert_eq!(m.state(), DhcpV4State::Stopped);
    assert_eq!(
        sent(&actions),
        vec![(
            DhcpV4MessageType::Release,
            DhcpV4Destination::Unicast(TEST_DHCP_SRV_IP)
        )]
    );
    let release = sent_msgs(&actions)[0];
    assert_eq!(release.ciaddr, FOO1_IP);
    assert_eq!(release.options.server_identifier, Some(TEST_DHCP_SRV_IP));
    assert!(actions.contains(&DhcpV4Action::DropLease));
    assert!(actions.contains(&DhcpV4Action::Shutdown));
}
