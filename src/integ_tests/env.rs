// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::{
    DhcpV4Action, DhcpV4Config, DhcpV4Destination, DhcpV4Message,
    DhcpV4MessageType, DhcpV4Timer,
};

pub(crate) const TEST_NIC_CLI: &str = "dhcpcli";
pub(crate) const TEST_NIC_CLI_INDEX: u32 = 2;
pub(crate) const TEST_MAC: &str = "00:11:22:33:44:55";
pub(crate) const TEST_HW_ADDR: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
pub(crate) const TEST_NETWORK_ID: &str = "wired-dhcpcli";

pub(crate) const TEST_DHCP_SRV_IP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);
pub(crate) const TEST_GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 254);
pub(crate) const TEST_DNS_SRV: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);
pub(crate) const FOO1_IP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 99);
pub(crate) const TEST_LEASE_TIME: u32 = 3600;

pub(crate) fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn test_config() -> DhcpV4Config {
    DhcpV4Config::new(TEST_NIC_CLI, TEST_NIC_CLI_INDEX, TEST_MAC).unwrap()
}

/// Reply of the test DHCP server offering [FOO1_IP] for
/// [TEST_LEASE_TIME] seconds without explicit T1/T2.
pub(crate) fn server_reply(
    msg_type: DhcpV4MessageType,
    xid: u32,
) -> DhcpV4Message {
    let mut msg = DhcpV4Message {
        op: 2,
        xid,
        chaddr: TEST_HW_ADDR.to_vec(),
        ..Default::default()
    };
    msg.options.message_type = Some(msg_type as u8);
    msg.options.server_identifier = Some(TEST_DHCP_SRV_IP);
    if msg_type != DhcpV4MessageType::Nack {
        msg.yiaddr = FOO1_IP;
        msg.options.lease_time = Some(TEST_LEASE_TIME);
        msg.options.subnet_mask = Some(Ipv4Addr::new(255, 255, 255, 0));
        msg.options.routers = Some(vec![TEST_GATEWAY]);
        msg.options.dns_servers = Some(vec![TEST_DNS_SRV]);
    }
    msg
}

pub(crate) fn offer(xid: u32) -> Vec<u8> {
    server_reply(DhcpV4MessageType::Offer, xid).to_dhcp_packet()
}

pub(crate) fn ack(xid: u32) -> Vec<u8> {
    server_reply(DhcpV4MessageType::Ack, xid).to_dhcp_packet()
}

pub(crate) fn nak(xid: u32) -> Vec<u8> {
    server_reply(DhcpV4MessageType::Nack, xid).to_dhcp_packet()
}

/// Messages sent by the actions, in order.
pub(crate) fn sent(
    actions: &[DhcpV4Action],
) -> Vec<(DhcpV4MessageType, DhcpV4Destination)> {
    actions
        .iter()
        .filter_map(|a| match a {
            DhcpV4Action::Send { msg, dst } => {
                msg.message_type().map(|t| (t, *dst))
            }
            _ => None,
        })
        .collect()
}

pub(crate) fn sent_msgs(actions: &[DhcpV4Action]) -> Vec<&DhcpV4Message> {
    actions
        .iter()
        .filter_map(|a| match a {
            DhcpV4Action::Send { msg, .. } => Some(msg),
            _ => None,
        })
        .collect()
}

pub(crate) fn armed(
    actions: &[DhcpV4Action],
    timer: DhcpV4Timer,
) -> Option<Duration> {
    actions.iter().find_map(|a| match a {
        DhcpV4Action::ArmTimer { timer: t, after } if *t == timer => {
            Some(*after)
        }
        _ => None,
    })
}
