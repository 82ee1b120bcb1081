// SPDX-License-Identifier: Apache-2.0

use std::{net::Ipv4Addr, time::Duration};

use crate::{
    DhcpError, DhcpV4Lease, DhcpV4Message, DhcpV4State, DhcpV4Timer,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DhcpV4Destination {
    /// From 0.0.0.0:68 to 255.255.255.255:67
    Broadcast,
    /// To the DHCP server port 67 of the specified address
    Unicast(Ipv4Addr),
}

/// Output of [crate::DhcpV4Machine::process()], to be carried out in order by
/// the caller.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DhcpV4Action {
    Send {
        msg: DhcpV4Message,
        dst: DhcpV4Destination,
    },
    /// Arm or re-arm the timer to expire after the duration
    ArmTimer {
        timer: DhcpV4Timer,
        after: Duration,
    },
    CancelTimer(DhcpV4Timer),
    /// Cancel all timers and stop listening on socket
    Shutdown,
    /// Check whether the address is used by other host, reply with
    /// [crate::DhcpV4Event::ArpProbeDone]
    ProbeAddress(Ipv4Addr),
    /// Lease acquired or refreshed, should be persisted and applied
    SaveLease(DhcpV4Lease),
    /// Held lease is no longer valid
    DropLease,
    StateChanged(DhcpV4State),
    /// Non-fatal protocol failure, the machine already recovered from it
    Error(DhcpError),
}
