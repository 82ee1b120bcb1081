// SPDX-License-Identifier: Apache-2.0

use super::msg::ARP_HW_TYPE_ETHERNET;
use crate::{
    mac::{parse_mac, ETH_ALEN},
    DhcpError, ErrorKind,
};

// Linux HOST_NAME_MAX
const MAX_HOST_NAME_LEN: usize = 64;
// Excluding the type byte
const MAX_CLIENT_ID_LEN: usize = 127;

#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct DhcpV4Config {
    pub(crate) iface_name: String,
    pub(crate) iface_index: u32,
    pub(crate) hw_addr: [u8; ETH_ALEN],
    /// Lease is persisted and reused only when not empty.
    pub(crate) network_id: String,
    pub(crate) client_id: Vec<u8>,
    pub(crate) host_name: String,
    pub(crate) request_hostname: bool,
    pub(crate) arp_gateway: bool,
    pub(crate) unicast_arp: bool,
}

impl DhcpV4Config {
    /// The `hw_addr` should be ethernet MAC address in the format of
    /// `01:02:2a:2c:f7:04`.
    pub fn new(
        iface_name: &str,
        iface_index: u32,
        hw_addr: &str,
    ) -> Result<Self, DhcpError> {
        if iface_name.is_empty() {
            return Err(DhcpError::new(
                ErrorKind::InvalidArgument,
                "Interface name cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            iface_name: iface_name.to_string(),
            iface_index,
            hw_addr: parse_mac(hw_addr)?,
            ..Default::default()
        })
    }

    pub fn iface_name(&self) -> &str {
        self.iface_name.as_str()
    }

    pub fn iface_index(&self) -> u32 {
        self.iface_index
    }

    pub fn network_id(&self) -> &str {
        self.network_id.as_str()
    }

    /// Identifier used as key for storing the lease.
    pub fn set_network_id(&mut self, network_id: &str) -> &mut Self {
        self.network_id = network_id.to_string();
        self
    }

    pub fn set_host_name(
        &mut self,
        host_name: &str,
    ) -> Result<&mut Self, DhcpError> {
        if host_name.len() > MAX_HOST_NAME_LEN {
            return Err(DhcpError::new(
                ErrorKind::InvalidArgument,
                format!(
                    "Host name {host_name} is longer than \
                     {MAX_HOST_NAME_LEN} bytes"
                ),
            ));
        }
        self.host_name = host_name.to_string();
        Ok(self)
    }

    /// Include host name option(12) in DHCPDISCOVER and DHCPREQUEST.
    pub fn set_request_hostname(&mut self, enabled: bool) -> &mut Self {
        self.request_hostname = enabled;
        self
    }

    /// Hold the lease until the ARP probe collaborator confirmed the new
    /// address is not in use.
    pub fn set_arp_gateway(&mut self, enabled: bool) -> &mut Self {
        self.arp_gateway = enabled;
        self
    }

    /// Unicast DHCPREQUEST to the server in RENEWING state instead of
    /// broadcasting.
    pub fn set_unicast_arp(&mut self, enabled: bool) -> &mut Self {
        self.unicast_arp = enabled;
        self
    }

    pub fn use_mac_as_client_id(&mut self) -> &mut Self {
        self.client_id = vec![ARP_HW_TYPE_ETHERNET];
        self.client_id.extend_from_slice(&self.hw_addr);
        self
    }

    pub fn set_client_id(
        &mut self,
        client_id_type: u8,
        client_id: &[u8],
    ) -> Result<&mut Self, DhcpError> {
        // RFC 2132: 9.14. Client-identifier, minimum length is 2
        if client_id.is_empty() || client_id.len() > MAX_CLIENT_ID_LEN {
            return Err(DhcpError::new(
                ErrorKind::InvalidArgument,
                format!(
                    "Client identifier should be 1 to {MAX_CLIENT_ID_LEN} \
                     bytes, got {}",
                    client_id.len()
                ),
            ));
        }
        self.client_id = vec![client_id_type];
        self.client_id.extend_from_slice(client_id);
        Ok(self)
    }
}
