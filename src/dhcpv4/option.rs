// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::{HashMap, HashSet},
    net::Ipv4Addr,
    sync::OnceLock,
};

use crate::{Buffer, BufferMut, DhcpError, ErrorKind};

pub(crate) const CODE_PAD: u8 = 0;
pub(crate) const CODE_SUBNET_MASK: u8 = 1;
pub(crate) const CODE_ROUTER: u8 = 3;
pub(crate) const CODE_DOMAIN_NAME_SERVER: u8 = 6;
pub(crate) const CODE_HOST_NAME: u8 = 12;
pub(crate) const CODE_REQUESTED_IP_ADDRESS: u8 = 50;
pub(crate) const CODE_IP_ADDRESS_LEASE_TIME: u8 = 51;
pub(crate) const CODE_MESSAGE_TYPE: u8 = 53;
pub(crate) const CODE_SERVER_IDENTIFIER: u8 = 54;
pub(crate) const CODE_PARAMETER_REQUEST_LIST: u8 = 55;
pub(crate) const CODE_RENEWAL_TIME: u8 = 58;
pub(crate) const CODE_REBINDING_TIME: u8 = 59;
pub(crate) const CODE_CLIENT_IDENTIFIER: u8 = 61;
pub(crate) const CODE_END: u8 = 255;

/// How the payload of a registered option is turned into a value.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) enum DhcpV4OptionDecoder {
    /// Single big-endian unsigned integer of the given byte width.
    UInt(usize),
    /// Non-empty list of big-endian unsigned integers of the given byte
    /// width, wire order preserved.
    UIntList(usize),
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub(crate) enum DhcpV4OptionValue {
    UInt(u32),
    UIntList(Vec<u32>),
}

impl DhcpV4OptionDecoder {
    pub(crate) fn decode(&self, raw: &[u8]) -> Result<DhcpV4OptionValue, DhcpError> {
        match *self {
            Self::UInt(width) => {
                if raw.len() != width {
                    return Err(DhcpError::new(
                        ErrorKind::InvalidMessage,
                        format!(
                            "Expecting {width} bytes integer, got {} bytes",
                            raw.len()
                        ),
                    ));
                }
                Ok(DhcpV4OptionValue::UInt(be_uint(raw)))
            }
            Self::UIntList(width) => {
                if raw.is_empty() || width == 0 || raw.len() % width != 0 {
                    return Err(DhcpError::new(
                        ErrorKind::InvalidMessage,
                        format!(
                            "Expecting positive multiple of {width} bytes, \
                             got {} bytes",
                            raw.len()
                        ),
                    ));
                }
                Ok(DhcpV4OptionValue::UIntList(
                    raw.chunks_exact(width).map(be_uint).collect(),
                ))
            }
        }
    }
}

fn be_uint(raw: &[u8]) -> u32 {
    raw.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

/// The field of [DhcpV4Options] a decoded option value is stored into.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) enum DhcpV4OptionField {
    MessageType,
    LeaseTime,
    ServerIdentifier,
    RenewalTime,
    RebindingTime,
    DnsServers,
    SubnetMask,
    Routers,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct DhcpV4OptionBinding {
    pub(crate) decoder: DhcpV4OptionDecoder,
    pub(crate) field: DhcpV4OptionField,
}

/// Table of option tags understood by the client.
///
/// Built once and shared read only by every decode, see
/// [DhcpV4OptionRegistry::global()].
#[derive(Debug, Default)]
pub(crate) struct DhcpV4OptionRegistry {
    bindings: HashMap<u8, DhcpV4OptionBinding>,
}

impl DhcpV4OptionRegistry {
    pub(crate) fn new() -> Self {
        let mut ret = Self::default();
        ret.register(
            CODE_MESSAGE_TYPE,
            DhcpV4OptionDecoder::UInt(1),
            DhcpV4OptionField::MessageType,
        );
        ret.register(
            CODE_IP_ADDRESS_LEASE_TIME,
            DhcpV4OptionDecoder::UInt(4),
            DhcpV4OptionField::LeaseTime,
        );
        ret.register(
            CODE_SERVER_IDENTIFIER,
            DhcpV4OptionDecoder::UInt(4),
            DhcpV4OptionField::ServerIdentifier,
        );
        ret.register(
            CODE_RENEWAL_TIME,
            DhcpV4OptionDecoder::UInt(4),
            DhcpV4OptionField::RenewalTime,
        );
        ret.register(
            CODE_REBINDING_TIME,
            DhcpV4OptionDecoder::UInt(4),
            DhcpV4OptionField::RebindingTime,
        );
        ret.register(
            CODE_DOMAIN_NAME_SERVER,
            DhcpV4OptionDecoder::UIntList(4),
            DhcpV4OptionField::DnsServers,
        );
        ret.register(
            CODE_SUBNET_MASK,
            DhcpV4OptionDecoder::UInt(4),
            DhcpV4OptionField::SubnetMask,
        );
        ret.register(
            CODE_ROUTER,
            DhcpV4OptionDecoder::UIntList(4),
            DhcpV4OptionField::Routers,
        );
        ret
    }

    pub(crate) fn global() -> &'static Self {
        static REGISTRY: OnceLock<DhcpV4OptionRegistry> = OnceLock::new();
        REGISTRY.get_or_init(Self::new)
    }

    /// # Panics
    ///
    /// Registering the same tag twice is a programming error and panics.
    pub(crate) fn register(
        &mut self,
        tag: u8,
        decoder: DhcpV4OptionDecoder,
        field: DhcpV4OptionField,
    ) {
        assert!(
            tag != CODE_PAD && tag != CODE_END,
            "DHCPv4 option {tag} cannot be registered"
        );
        let old = self
            .bindings
            .insert(tag, DhcpV4OptionBinding { decoder, field });
        assert!(old.is_none(), "DHCPv4 option {tag} registered twice");
    }

    pub(crate) fn lookup(&self, tag: u8) -> Option<&DhcpV4OptionBinding> {
        self.bindings.get(&tag)
    }

    /// Registered tags in ascending order, used as parameter request list.
    pub(crate) fn tags(&self) -> Vec<u8> {
        let mut ret: Vec<u8> = self
            .bindings
            .keys()
            .copied()
            .filter(|t| *t != CODE_MESSAGE_TYPE)
            .collect();
        ret.sort_unstable();
        ret
    }
}

/// DHCPv4 options carried by a message.
///
/// Options decoded from server replies are those of the
/// [DhcpV4OptionRegistry], the rest are only emitted by the client.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct DhcpV4Options {
    pub message_type: Option<u8>,
    pub lease_time: Option<u32>,
    pub server_identifier: Option<Ipv4Addr>,
    pub renewal_time: Option<u32>,
    pub rebinding_time: Option<u32>,
    pub dns_servers: Option<Vec<Ipv4Addr>>,
    pub subnet_mask: Option<Ipv4Addr>,
    pub routers: Option<Vec<Ipv4Addr>>,
    pub requested_ip: Option<Ipv4Addr>,
    pub host_name: Option<String>,
    pub client_identifier: Option<Vec<u8>>,
    pub parameter_request_list: Option<Vec<u8>>,
}

impl DhcpV4Options {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn store(
        &mut self,
        field: DhcpV4OptionField,
        value: DhcpV4OptionValue,
    ) -> Result<(), DhcpError> {
        match (field, value) {
            (DhcpV4OptionField::MessageType, DhcpV4OptionValue::UInt(v)) => {
                self.message_type = Some(v as u8)
            }
            (DhcpV4OptionField::LeaseTime, DhcpV4OptionValue::UInt(v)) => {
                self.lease_time = Some(v)
            }
            (
                DhcpV4OptionField::ServerIdentifier,
                DhcpV4OptionValue::UInt(v),
            ) => self.server_identifier = Some(Ipv4Addr::from(v)),
            (DhcpV4OptionField::RenewalTime, DhcpV4OptionValue::UInt(v)) => {
                self.renewal_time = Some(v)
            }
            (DhcpV4OptionField::RebindingTime, DhcpV4OptionValue::UInt(v)) => {
                self.rebinding_time = Some(v)
            }
            (DhcpV4OptionField::SubnetMask, DhcpV4OptionValue::UInt(v)) => {
                self.subnet_mask = Some(Ipv4Addr::from(v))
            }
            (
                DhcpV4OptionField::DnsServers,
                DhcpV4OptionValue::UIntList(v),
            ) => {
                self.dns_servers =
                    Some(v.into_iter().map(Ipv4Addr::from).collect())
            }
            (DhcpV4OptionField::Routers, DhcpV4OptionValue::UIntList(v)) => {
                self.routers = Some(v.into_iter().map(Ipv4Addr::from).collect())
            }
            (field, value) => {
                let e = DhcpError::new(
                    ErrorKind::Bug,
                    format!(
                        "Option field {field:?} bound to mismatched value \
                         {value:?}"
                    ),
                );
                log::error!("{e}");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Parse TLV encoded options following the magic cookie till the END
    /// option.
    pub(crate) fn parse(raw: &[u8]) -> Result<Self, DhcpError> {
        let registry = DhcpV4OptionRegistry::global();
        let mut ret = Self::new();
        let mut seen: HashSet<u8> = HashSet::new();
        let mut buf = Buffer::new(raw);

        while let Ok(tag) = buf.get_u8() {
            match tag {
                CODE_PAD => continue,
                CODE_END => {
                    if !seen.contains(&CODE_MESSAGE_TYPE) {
                        return Err(DhcpError::new(
                            ErrorKind::MissingMessageType,
                            "No DHCP message type option(53) found".to_string(),
                        ));
                    }
                    return Ok(ret);
                }
                _ => (),
            }
            let len = usize::from(buf.get_u8().map_err(|_| {
                DhcpError::new(
                    ErrorKind::TruncatedOption,
                    format!("No length for DHCPv4 option {tag}"),
                )
            })?);
            // Payload must end before the buffer does, the END option still
            // has to follow.
            if len >= buf.remain_len() {
                return Err(DhcpError::new(
                    ErrorKind::TruncatedOption,
                    format!(
                        "DHCPv4 option {tag} length {len} exceeds remaining \
                         {} bytes",
                        buf.remain_len()
                    ),
                ));
            }
            if seen.contains(&tag) {
                return Err(DhcpError::new(
                    ErrorKind::DuplicateOption,
                    format!("Found repeated DHCPv4 option {tag}"),
                ));
            }
            let payload = buf.get_bytes(len)?;
            if let Some(binding) = registry.lookup(tag) {
                let value = binding.decoder.decode(payload).map_err(|e| {
                    DhcpError::new(
                        ErrorKind::OptionDecodeError(tag),
                        format!("Invalid DHCPv4 option {tag}: {}", e.msg()),
                    )
                })?;
                ret.store(binding.field, value)?;
                seen.insert(tag);
            } else {
                log::trace!("Ignoring DHCPv4 option {tag}");
            }
        }
        Err(DhcpError::new(
            ErrorKind::UnterminatedOptions,
            "DHCPv4 options have no END option(255)".to_string(),
        ))
    }

    /// Emit options in ascending tag order followed by END.
    pub(crate) fn emit(&self, buf: &mut BufferMut) {
        if let Some(v) = self.subnet_mask {
            emit_ipv4(buf, CODE_SUBNET_MASK, v);
        }
        if let Some(v) = self.routers.as_deref() {
            emit_ipv4_list(buf, CODE_ROUTER, v);
        }
        if let Some(v) = self.dns_servers.as_deref() {
            emit_ipv4_list(buf, CODE_DOMAIN_NAME_SERVER, v);
        }
        if let Some(v) = self.host_name.as_deref() {
            emit_bytes(buf, CODE_HOST_NAME, v.as_bytes());
        }
        if let Some(v) = self.requested_ip {
            emit_ipv4(buf, CODE_REQUESTED_IP_ADDRESS, v);
        }
        if let Some(v) = self.lease_time {
            emit_u32(buf, CODE_IP_ADDRESS_LEASE_TIME, v);
        }
        if let Some(v) = self.message_type {
            emit_bytes(buf, CODE_MESSAGE_TYPE, &[v]);
        }
        if let Some(v) = self.server_identifier {
            emit_ipv4(buf, CODE_SERVER_IDENTIFIER, v);
        }
        if let Some(v) = self.parameter_request_list.as_deref() {
            emit_bytes(buf, CODE_PARAMETER_REQUEST_LIST, v);
        }
        if let Some(v) = self.renewal_time {
            emit_u32(buf, CODE_RENEWAL_TIME, v);
        }
        if let Some(v) = self.rebinding_time {
            emit_u32(buf, CODE_REBINDING_TIME, v);
        }
        if let Some(v) = self.client_identifier.as_deref() {
            emit_bytes(buf, CODE_CLIENT_IDENTIFIER, v);
        }
        buf.write_u8(CODE_END);
    }
}

fn emit_bytes(buf: &mut BufferMut, code: u8, data: &[u8]) {
    let data = if data.len() > u8::MAX as usize {
        log::warn!(
            "The value of DHCPv4 option {code} has exceeded the maximum \
             length 255, truncating"
        );
        &data[..u8::MAX as usize]
    } else {
        data
    };
    buf.write_u8(code);
    buf.write_u8(data.len() as u8);
    buf.write_bytes(data);
}

fn emit_u32(buf: &mut BufferMut, code: u8, value: u32) {
    emit_bytes(buf, code, &value.to_be_bytes());
}

fn emit_ipv4(buf: &mut BufferMut, code: u8, ip: Ipv4Addr) {
    emit_bytes(buf, code, &ip.octets());
}

fn emit_ipv4_list(buf: &mut BufferMut, code: u8, ips: &[Ipv4Addr]) {
    let data: Vec<u8> = ips.iter().flat_map(|ip| ip.octets()).collect();
    emit_bytes(buf, code, &data);
}
