// SPDX-License-Identifier: Apache-2.0

mod action;
mod client;
mod config;
mod event;
mod lease;
mod machine;
mod msg;
mod option;
mod packet;
mod socket;
mod state;
mod time;

pub use self::{
    action::{DhcpV4Action, DhcpV4Destination},
    client::DhcpV4Client,
    config::DhcpV4Config,
    event::{DhcpV4ArpResult, DhcpV4Event, DhcpV4Timer},
    lease::DhcpV4Lease,
    machine::DhcpV4Machine,
    msg::{DhcpV4Message, DhcpV4MessageType},
    option::DhcpV4Options,
    packet::{new_udp_packet, parse_udp_packet},
    socket::{
        DhcpUdpV4Socket, DhcpV4ArpProber, DhcpV4LeaseStore, DhcpV4NoArpProber,
        DhcpV4NoLeaseStore, DhcpV4Socket,
    },
    state::DhcpV4State,
};
