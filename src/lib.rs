// SPDX-License-Identifier: Apache-2.0

mod buffer;
mod checksum;
mod dhcpv4;
mod error;
mod event;
mod mac;


pub use crate::checksum::compute_checksum;
pub use crate::dhcpv4::{
    new_udp_packet, parse_udp_packet, DhcpUdpV4Socket, DhcpV4Action,
    DhcpV4ArpProber, DhcpV4ArpResult, DhcpV4Client, DhcpV4Config,
    DhcpV4Destination, DhcpV4Event, DhcpV4Lease, DhcpV4LeaseStore,
    DhcpV4Machine, DhcpV4Message, DhcpV4MessageType, DhcpV4NoArpProber,
    DhcpV4NoLeaseStore, DhcpV4Options, DhcpV4Socket, DhcpV4State,
    DhcpV4Timer,
};
pub use crate::error::{DhcpError, ErrorKind};

pub(crate) use crate::buffer::{Buffer, BufferMut};
pub(crate) use crate::error::ErrorContext;
