// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv4Addr;

use super::option::{DhcpV4OptionRegistry, DhcpV4Options, CODE_PAD};
use crate::{
    Buffer, BufferMut, DhcpError, DhcpV4Config, DhcpV4Lease, ErrorContext,
    ErrorKind,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
#[non_exhaustive]
pub enum DhcpV4MessageType {
    #[default]
    Discovery = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nack = 6,
    Release = 7,
    Inform = 8,
}

impl std::fmt::Display for DhcpV4MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovery => write!(f, "DHCPDISCOVER"),
            Self::Offer => write!(f, "DHCPOFFER"),
            Self::Request => write!(f, "DHCPREQUEST"),
            Self::Ack => write!(f, "DHCPACK"),
            Self::Nack => write!(f, "DHCPNAK"),
            Self::Decline => write!(f, "DHCPDECLINE"),
            Self::Release => write!(f, "DHCPRELEASE"),
            Self::Inform => write!(f, "DHCPINFORM"),
        }
    }
}

impl std::convert::TryFrom<u8> for DhcpV4MessageType {
    type Error = DhcpError;

    fn try_from(d: u8) -> Result<Self, DhcpError> {
        match d {
            d if d == Self::Discovery as u8 => Ok(Self::Discovery),
            d if d == Self::Offer as u8 => Ok(Self::Offer),
            d if d == Self::Request as u8 => Ok(Self::Request),
            d if d == Self::Decline as u8 => Ok(Self::Decline),
            d if d == Self::Ack as u8 => Ok(Self::Ack),
            d if d == Self::Nack as u8 => Ok(Self::Nack),
            d if d == Self::Release as u8 => Ok(Self::Release),
            d if d == Self::Inform as u8 => Ok(Self::Inform),
            _ => Err(DhcpError::new(
                ErrorKind::InvalidMessage,
                format!("DHCPv4 message type {d} is not supported"),
            )),
        }
    }
}

pub(crate) const MAX_CHADDR_LEN: usize = 16;
pub(crate) const SNAME_LEN: usize = 64;
pub(crate) const FILE_LEN: usize = 128;

pub(crate) const BOOTREQUEST: u8 = 1;
pub(crate) const BOOTREPLY: u8 = 2;
// https://www.iana.org/assignments/arp-parameters/arp-parameters.xhtml#arp-parameters-2
pub(crate) const ARP_HW_TYPE_ETHERNET: u8 = 1;
pub(crate) const HW_ADDR_LEN_ETHERNET: u8 = 6;
pub(crate) const DHCPV4_MAGIC_COOKIE: u32 = 0x63825363;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DhcpV4Message {
    /// Message op code / message type. 1 = BOOTREQUEST, 2 = BOOTREPLY
    pub op: u8,
    /// Hardware address type
    pub htype: u8,
    /// Hardware address length
    pub hlen: u8,
    /// Client sets to zero, optionally used by relay agents when booting via a
    /// relay agent.
    pub hops: u8,
    /// Transaction ID
    pub xid: u32,
    /// Filled in by client, seconds elapsed since client began address
    /// acquisition or renewal process.
    pub secs: u16,
    pub flags: u16,
    /// Client IP address; only filled in if client is in BOUND, RENEW or
    /// REBINDING state and can respond to ARP requests.
    pub ciaddr: Ipv4Addr,
    /// 'your' (client) IP address.
    pub yiaddr: Ipv4Addr,
    /// IP address of next server to use in bootstrap; returned in DHCPOFFER,
    /// DHCPACK by server.
    pub siaddr: Ipv4Addr,
    /// Relay agent IP address, used in booting via a relay agent.
    pub giaddr: Ipv4Addr,
    /// Client hardware address, `hlen` bytes.
    pub chaddr: Vec<u8>,
    /// Optional server host name, raw fixed size field.
    pub sname: [u8; SNAME_LEN],
    /// Boot file name, raw fixed size field.
    pub file: [u8; FILE_LEN],
    pub cookie: u32,
    pub options: DhcpV4Options,
}

impl Default for DhcpV4Message {
    fn default() -> Self {
        Self {
            op: BOOTREQUEST,
            htype: ARP_HW_TYPE_ETHERNET,
            hlen: HW_ADDR_LEN_ETHERNET,
            hops: 0,
            xid: 0,
            secs: 0,
            flags: 0,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr: vec![0u8; HW_ADDR_LEN_ETHERNET as usize],
            sname: [0u8; SNAME_LEN],
            file: [0u8; FILE_LEN],
            cookie: DHCPV4_MAGIC_COOKIE,
            options: DhcpV4Options::default(),
        }
    }
}

impl DhcpV4Message {
    /// Fixed BOOTP header size, magic cookie excluded.
    pub const HEADER_LEN: usize = 236;
    /// 576 bytes minimum IP datagram minus IP and UDP headers.
    pub const MAX_LEN: usize = 548;
    // RFC 1542 2.1: BOOTP relay agents may drop messages shorter than 300
    // bytes.
    const MIN_EMIT_LEN: usize = 300;

    /// Parse a DHCP reply with IP and UDP headers already stripped.
    pub fn parse(raw: &[u8]) -> Result<Self, DhcpError> {
        if raw.len() < Self::HEADER_LEN || raw.len() > Self::MAX_LEN {
            return Err(DhcpError::new(
                ErrorKind::InvalidLength,
                format!(
                    "DHCP message length {} is not in the range of {}-{}",
                    raw.len(),
                    Self::HEADER_LEN,
                    Self::MAX_LEN
                ),
            ));
        }
        let mut buf = Buffer::new(raw);

        let mut ret = Self {
            op: buf.get_u8().context("Invalid DHCPv4 header 'op'")?,
            htype: buf.get_u8().context("Invalid DHCPv4 header 'htype'")?,
            hlen: buf.get_u8().context("Invalid DHCPv4 header 'hlen'")?,
            hops: buf.get_u8().context("Invalid DHCPv4 header 'hops'")?,
            xid: buf.get_u32_be().context("Invalid DHCPv4 header 'xid'")?,
            secs: buf.get_u16_be().context("Invalid DHCPv4 header 'secs'")?,
            flags: buf.get_u16_be().context("Invalid DHCPv4 header 'flags'")?,
            ciaddr: buf.get_ipv4().context("Invalid DHCPv4 header 'ciaddr'")?,
            yiaddr: buf.get_ipv4().context("Invalid DHCPv4 header 'yiaddr'")?,
            siaddr: buf.get_ipv4().context("Invalid DHCPv4 header 'siaddr'")?,
            giaddr: buf.get_ipv4().context("Invalid DHCPv4 header 'giaddr'")?,
            chaddr: Vec::new(),
            sname: [0u8; SNAME_LEN],
            file: [0u8; FILE_LEN],
            cookie: 0,
            options: DhcpV4Options::new(),
        };
        let chaddr: [u8; MAX_CHADDR_LEN] = buf
            .get_array()
            .context("Invalid DHCPv4 header 'chaddr'")?;
        ret.sname = buf.get_array().context("Invalid DHCPv4 header 'sname'")?;
        ret.file = buf.get_array().context("Invalid DHCPv4 header 'file'")?;

        if usize::from(ret.hlen) > MAX_CHADDR_LEN {
            return Err(DhcpError::new(
                ErrorKind::InvalidMessage,
                format!(
                    "DHCPv4 hardware address length {} exceeds {}",
                    ret.hlen, MAX_CHADDR_LEN
                ),
            ));
        }
        ret.chaddr = chaddr[..usize::from(ret.hlen)].to_vec();

        // A message of exactly the header size carries no cookie, which
        // cannot match the magic cookie.
        ret.cookie = buf.get_u32_be().unwrap_or_default();
        ret.validate()?;

        ret.options = DhcpV4Options::parse(buf.get_remains())?;

        log::trace!("Parsed DHCP message {ret:?}");
        Ok(ret)
    }

    fn validate(&self) -> Result<(), DhcpError> {
        let invalid = |msg: String| {
            Err(DhcpError::new(ErrorKind::InvalidMessage, msg))
        };
        if self.op != BOOTREPLY {
            return invalid(format!("Invalid DHCPv4 op code {}", self.op));
        }
        if self.htype != ARP_HW_TYPE_ETHERNET {
            return invalid(format!(
                "DHCPv4 hardware address type {} is not ethernet",
                self.htype
            ));
        }
        if self.hlen != HW_ADDR_LEN_ETHERNET {
            return invalid(format!(
                "DHCPv4 hardware address length {} is not {}",
                self.hlen, HW_ADDR_LEN_ETHERNET
            ));
        }
        // RFC 2131: 'secs' is always 0 in server replies
        if self.secs != 0 {
            return invalid(format!("Invalid DHCPv4 secs {}", self.secs));
        }
        // Client never set the broadcast flag
        if self.flags != 0 {
            return invalid(format!("Invalid DHCPv4 flags {:#x}", self.flags));
        }
        if self.cookie != DHCPV4_MAGIC_COOKIE {
            return invalid(format!(
                "DHCPv4 magic cookie not match, expected {:#x}, got {:#x}",
                DHCPV4_MAGIC_COOKIE, self.cookie
            ));
        }
        Ok(())
    }

    pub(crate) fn emit(&self, buf: &mut BufferMut) {
        let start = buf.len();
        buf.write_u8(self.op);
        buf.write_u8(self.htype);
        buf.write_u8(self.hlen);
        buf.write_u8(self.hops);
        buf.write_u32_be(self.xid);
        buf.write_u16_be(self.secs);
        buf.write_u16_be(self.flags);
        buf.write_ipv4(self.ciaddr);
        buf.write_ipv4(self.yiaddr);
        buf.write_ipv4(self.siaddr);
        buf.write_ipv4(self.giaddr);
        buf.write_fixed(&self.chaddr, MAX_CHADDR_LEN);
        buf.write_bytes(&self.sname);
        buf.write_bytes(&self.file);
        buf.write_u32_be(self.cookie);
        self.options.emit(buf);
        while buf.len() - start < Self::MIN_EMIT_LEN {
            buf.write_u8(CODE_PAD);
        }
    }

    /// Serialize into a DHCP payload for UDP.
    pub fn to_dhcp_packet(&self) -> Vec<u8> {
        let mut buf = BufferMut::new(Self::MAX_LEN);
        self.emit(&mut buf);
        log::trace!("DHCP packet generated {:?}", buf.data);
        buf.data
    }

    pub fn message_type(&self) -> Option<DhcpV4MessageType> {
        self.options
            .message_type
            .and_then(|t| DhcpV4MessageType::try_from(t).ok())
    }

    fn new(
        xid: u32,
        config: &DhcpV4Config,
        msg_type: DhcpV4MessageType,
    ) -> Self {
        let mut ret = Self {
            xid,
            chaddr: config.hw_addr.to_vec(),
            ..Default::default()
        };
        ret.options.message_type = Some(msg_type as u8);
        if !config.client_id.is_empty() {
            ret.options.client_identifier = Some(config.client_id.clone());
        }
        ret
    }

    fn with_request_options(mut self, config: &DhcpV4Config) -> Self {
        if config.request_hostname && !config.host_name.is_empty() {
            self.options.host_name = Some(config.host_name.clone());
        }
        self.options.parameter_request_list =
            Some(DhcpV4OptionRegistry::global().tags());
        self
    }

    pub(crate) fn new_discovery(xid: u32, config: &DhcpV4Config) -> Self {
        Self::new(xid, config, DhcpV4MessageType::Discovery)
            .with_request_options(config)
    }

    /// DHCPREQUEST in SELECTING state: server identifier and requested IP
    /// address set, ciaddr zero.
    pub(crate) fn new_request(
        xid: u32,
        config: &DhcpV4Config,
        lease: &DhcpV4Lease,
    ) -> Self {
        let mut ret = Self::new(xid, config, DhcpV4MessageType::Request)
            .with_request_options(config);
        ret.options.server_identifier = Some(lease.srv_id);
        ret.options.requested_ip = Some(lease.yiaddr);
        ret
    }

    /// DHCPREQUEST in INIT-REBOOT state: no server identifier.
    pub(crate) fn new_init_reboot(
        xid: u32,
        config: &DhcpV4Config,
        lease: &DhcpV4Lease,
    ) -> Self {
        let mut ret = Self::new(xid, config, DhcpV4MessageType::Request)
            .with_request_options(config);
        ret.options.requested_ip = Some(lease.yiaddr);
        ret
    }

    /// DHCPREQUEST in RENEWING or REBINDING state: ciaddr set, no server
    /// identifier nor requested IP address.
    pub(crate) fn new_renew(
        xid: u32,
        config: &DhcpV4Config,
        lease: &DhcpV4Lease,
    ) -> Self {
        let mut ret = Self::new(xid, config, DhcpV4MessageType::Request)
            .with_request_options(config);
        ret.ciaddr = lease.yiaddr;
        ret
    }

    pub(crate) fn new_decline(
        xid: u32,
        config: &DhcpV4Config,
        lease: &DhcpV4Lease,
    ) -> Self {
        let mut ret = Self::new(xid, config, DhcpV4MessageType::Decline);
        ret.options.server_identifier = Some(lease.srv_id);
        ret.options.requested_ip = Some(lease.yiaddr);
        ret
    }

    pub(crate) fn new_release(
        xid: u32,
        config: &DhcpV4Config,
        lease: &DhcpV4Lease,
    ) -> Self {
        let mut ret = Self::new(xid, config, DhcpV4MessageType::Release);
        ret.ciaddr = lease.yiaddr;
        ret.options.server_identifier = Some(lease.srv_id);
        ret
    }
}
