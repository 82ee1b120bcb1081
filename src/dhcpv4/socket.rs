// SPDX-License-Identifier: Apache-2.0

use std::{future::Future, net::Ipv4Addr};

use tokio::net::UdpSocket;

use super::packet::{CLIENT_PORT, SERVER_PORT};
use crate::{DhcpError, DhcpV4ArpResult, DhcpV4Destination, DhcpV4Lease};

/// Datagram transport used by [crate::DhcpV4Client].
pub trait DhcpV4Socket {
    /// Send to port 67 of the destination. For raw socket, the buffer is a
    /// full IPv4 packet.
    fn send(
        &self,
        buffer: &[u8],
        dst: DhcpV4Destination,
    ) -> impl Future<Output = Result<(), DhcpError>> + Send;

    fn recv(&self) -> impl Future<Output = Result<Vec<u8>, DhcpError>> + Send;

    /// Whether the socket sends and receives IPv4 packets instead of UDP
    /// payloads.
    fn is_raw(&self) -> bool {
        false
    }
}

/// Checks whether other host on the link already uses the address.
pub trait DhcpV4ArpProber {
    fn probe(
        &self,
        addr: Ipv4Addr,
    ) -> impl Future<Output = Result<DhcpV4ArpResult, DhcpError>> + Send;
}

/// Persistent lease storage indexed by [crate::DhcpV4Config::network_id()].
pub trait DhcpV4LeaseStore {
    fn load(&self, network_id: &str)
        -> Result<Option<DhcpV4Lease>, DhcpError>;
    fn save(
        &self,
        network_id: &str,
        lease: &DhcpV4Lease,
    ) -> Result<(), DhcpError>;
    fn remove(&self, network_id: &str) -> Result<(), DhcpError>;
}

/// ARP prober treating every address as free.
#[derive(Debug, Default, Clone, Copy)]
pub struct DhcpV4NoArpProber;

impl DhcpV4ArpProber for DhcpV4NoArpProber {
    async fn probe(&self, _addr: Ipv4Addr) -> Result<DhcpV4ArpResult, DhcpError> {
        Ok(DhcpV4ArpResult::Free)
    }
}

/// Lease store keeping nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DhcpV4NoLeaseStore;

impl DhcpV4LeaseStore for DhcpV4NoLeaseStore {
    fn load(&self, _network_id: &str) -> Result<Option<DhcpV4Lease>, DhcpError> {
        Ok(None)
    }

    fn save(
        &self,
        _network_id: &str,
        _lease: &DhcpV4Lease,
    ) -> Result<(), DhcpError> {
        Ok(())
    }

    fn remove(&self, _network_id: &str) -> Result<(), DhcpError> {
        Ok(())
    }
}

/// UDP socket bound to port 68 with broadcast enabled.
#[derive(Debug)]
pub struct DhcpUdpV4Socket {
    socket: UdpSocket,
}

impl DhcpUdpV4Socket {
    pub async fn new(src_ip: Ipv4Addr) -> Result<Self, DhcpError> {
        log::debug!("Creating UDP socket on {src_ip}:{CLIENT_PORT}");
        let socket = UdpSocket::bind((src_ip, CLIENT_PORT)).await?;
        socket.set_broadcast(true)?;
        log::debug!("Finished UDP socket creation");
        Ok(Self { socket })
    }
}

impl DhcpV4Socket for DhcpUdpV4Socket {
    async fn send(
        &self,
        packet: &[u8],
        dst: DhcpV4Destination,
    ) -> Result<(), DhcpError> {
        log::trace!("Sending DHCP packet to {dst:?}: {packet:?}");
        self.socket
            .send_to(packet, (dst.address(), SERVER_PORT))
            .await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, DhcpError> {
        let mut buffer = [0u8; 1500];
        let (received, src) = self.socket.recv_from(&mut buffer).await?;
        log::trace!("UDP socket received {received} bytes from {src}");
        Ok(buffer[..received].to_vec())
    }
}
