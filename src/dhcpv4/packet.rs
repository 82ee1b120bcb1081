// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv4Addr;

use crate::{
    compute_checksum, BufferMut, DhcpError, DhcpV4Destination, ErrorKind,
};

pub(crate) const SERVER_PORT: u16 = 67;
pub(crate) const CLIENT_PORT: u16 = 68;

const DEFAULT_TTL: u8 = 128;
const IPV4_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;
const IP_PROTO_UDP: u8 = 17;
// IPTOS_LOWDELAY
const IP_TOS: u8 = 0x10;

impl DhcpV4Destination {
    pub fn address(&self) -> Ipv4Addr {
        match self {
            Self::Broadcast => Ipv4Addr::BROADCAST,
            Self::Unicast(a) => *a,
        }
    }
}

/// Wrap DHCP payload into IPv4 and UDP headers from `0.0.0.0:68` to port 67
/// of the destination, for sockets without an IP address bound.
pub fn new_udp_packet(payload: &[u8], dst: DhcpV4Destination) -> Vec<u8> {
    let src_ip = Ipv4Addr::UNSPECIFIED;
    let dst_ip = dst.address();
    let udp_len = (UDP_HEADER_LEN + payload.len()) as u16;
    let total_len = IPV4_HEADER_LEN as u16 + udp_len;

    let mut ip_hdr = BufferMut::new(IPV4_HEADER_LEN);
    // Version 4, IHL 5
    ip_hdr.write_u8(0x45);
    ip_hdr.write_u8(IP_TOS);
    ip_hdr.write_u16_be(total_len);
    // Identification
    ip_hdr.write_u16_be(0);
    // Flags and fragment offset
    ip_hdr.write_u16_be(0);
    ip_hdr.write_u8(DEFAULT_TTL);
    ip_hdr.write_u8(IP_PROTO_UDP);
    ip_hdr.write_u16_be(0);
    ip_hdr.write_ipv4(src_ip);
    ip_hdr.write_ipv4(dst_ip);
    let ip_sum = compute_checksum(&ip_hdr.data);
    ip_hdr.data[10..12].copy_from_slice(&ip_sum.to_be_bytes());

    let mut udp = BufferMut::new(udp_len as usize);
    udp.write_u16_be(CLIENT_PORT);
    udp.write_u16_be(SERVER_PORT);
    udp.write_u16_be(udp_len);
    udp.write_u16_be(0);
    udp.write_bytes(payload);

    let mut pseudo = BufferMut::new(12 + udp.len());
    pseudo.write_ipv4(src_ip);
    pseudo.write_ipv4(dst_ip);
    pseudo.write_u8(0);
    pseudo.write_u8(IP_PROTO_UDP);
    pseudo.write_u16_be(udp_len);
    pseudo.write_bytes(&udp.data);
    // RFC 768: computed zero is transmitted as all ones
    let udp_sum = match compute_checksum(&pseudo.data) {
        0 => 0xffff,
        s => s,
    };
    udp.data[6..8].copy_from_slice(&udp_sum.to_be_bytes());

    let mut ret = ip_hdr.data;
    ret.extend_from_slice(&udp.data);
    log::trace!("IPv4 UDP packet generated {ret:?}");
    ret
}

/// Strip IPv4 and UDP headers, returning the DHCP payload sent to client
/// port 68.
pub fn parse_udp_packet(raw: &[u8]) -> Result<&[u8], DhcpError> {
    let packet = match etherparse::SlicedPacket::from_ip(raw) {
        Ok(p) => p,
        Err(error) => {
            return Err(DhcpError::new(
                ErrorKind::InvalidMessage,
                format!("Failed to parse IP packet to DHCP message: {error}"),
            ));
        }
    };
    match packet.transport {
        Some(etherparse::TransportSlice::Udp(udp))
            if udp.destination_port() == CLIENT_PORT =>
        {
            Ok(udp.payload())
        }
        Some(etherparse::TransportSlice::Udp(udp)) => Err(DhcpError::new(
            ErrorKind::InvalidMessage,
            format!(
                "UDP packet is sent to port {} instead of DHCP client port \
                 {CLIENT_PORT}",
                udp.destination_port()
            ),
        )),
        _ => Err(DhcpError::new(
            ErrorKind::InvalidMessage,
            "Failed to parse IP packet to DHCP message: Not UDP payload"
                .to_string(),
        )),
    }
}
