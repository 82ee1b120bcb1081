// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv4Addr;

use crate::DhcpV4Lease;

/// Timers armed by [crate::DhcpV4Machine] through
/// [crate::DhcpV4Action::ArmTimer].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum DhcpV4Timer {
    /// No reply for outstanding DHCPDISCOVER or DHCPREQUEST
    Retransmit,
    /// T1
    Renew,
    /// T2
    Rebind,
    LeaseExpired,
    /// Wait time after DHCPDECLINE before restarting discovery
    DeclineBackoff,
}

impl std::fmt::Display for DhcpV4Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Retransmit => "Retransmit",
                Self::Renew => "Renew",
                Self::Rebind => "Rebind",
                Self::LeaseExpired => "LeaseExpired",
                Self::DeclineBackoff => "DeclineBackoff",
            }
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DhcpV4ArpResult {
    Free,
    Conflict,
}

/// Input of [crate::DhcpV4Machine::process()].
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DhcpV4Event {
    /// Begin acquisition, reusing the cached lease if any
    Start(Option<DhcpV4Lease>),
    Stop,
    /// Send DHCPRELEASE for the held lease and stop
    Release,
    /// DHCP payload received from socket, IP and UDP headers stripped
    PacketIn(Vec<u8>),
    TimerExpired(DhcpV4Timer),
    ArpProbeDone {
        addr: Ipv4Addr,
        result: DhcpV4ArpResult,
    },
}

impl std::fmt::Display for DhcpV4Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start(Some(l)) => write!(f, "Start(cached {})", l.yiaddr),
            Self::Start(None) => write!(f, "Start"),
            Self::Stop => write!(f, "Stop"),
            Self::Release => write!(f, "Release"),
            Self::PacketIn(p) => write!(f, "PacketIn({} bytes)", p.len()),
            Self::TimerExpired(t) => write!(f, "TimerExpired({t})"),
            Self::ArpProbeDone { addr, result } => {
                write!(f, "ArpProbeDone({addr} {result:?})")
            }
        }
    }
}
