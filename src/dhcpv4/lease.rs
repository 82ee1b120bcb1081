// SPDX-License-Identifier: Apache-2.0

use std::{
    net::Ipv4Addr,
    time::{Duration, SystemTime},
};

use super::{msg::DhcpV4Message, time::{default_t1, default_t2}};
use crate::{DhcpError, ErrorKind};

#[derive(Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub struct DhcpV4Lease {
    /// Your(Client) IP address
    pub yiaddr: Ipv4Addr,
    /// Server IP address
    pub siaddr: Ipv4Addr,
    pub srv_id: Ipv4Addr,
    pub lease_time_sec: u32,
    pub t1_sec: u32,
    pub t2_sec: u32,
    pub subnet_mask: Option<Ipv4Addr>,
    pub gateways: Option<Vec<Ipv4Addr>>,
    pub dns_srvs: Option<Vec<Ipv4Addr>>,
    /// Wall clock time the reply granting this lease was received
    pub acquired_at: SystemTime,
}

impl Default for DhcpV4Lease {
    fn default() -> Self {
        Self {
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            srv_id: Ipv4Addr::UNSPECIFIED,
            lease_time_sec: 0,
            t1_sec: 0,
            t2_sec: 0,
            subnet_mask: None,
            gateways: None,
            dns_srvs: None,
            acquired_at: SystemTime::UNIX_EPOCH,
        }
    }
}

impl DhcpV4Lease {
    pub(crate) fn new_from_msg(msg: &DhcpV4Message) -> Result<Self, DhcpError> {
        let lease_time_sec = match msg.options.lease_time {
            Some(v) => v,
            None => {
                return Err(DhcpError::new(
                    ErrorKind::InvalidMessage,
                    format!("No lease time in DHCP message {:#x}", msg.xid),
                ));
            }
        };
        let ret = Self {
            yiaddr: msg.yiaddr,
            siaddr: msg.siaddr,
            srv_id: msg.options.server_identifier.unwrap_or(msg.siaddr),
            lease_time_sec,
            // RFC 2131 4.4.5: T1 defaults to 0.5 of the lease time, T2 to
            // 0.875 of the lease time.
            t1_sec: msg
                .options
                .renewal_time
                .unwrap_or_else(|| default_t1(lease_time_sec)),
            t2_sec: msg
                .options
                .rebinding_time
                .unwrap_or_else(|| default_t2(lease_time_sec)),
            subnet_mask: msg.options.subnet_mask,
            gateways: msg.options.routers.clone(),
            dns_srvs: msg.options.dns_servers.clone(),
            acquired_at: SystemTime::now(),
        };
        ret.validate()?;
        Ok(ret)
    }

    fn validate(&self) -> Result<(), DhcpError> {
        if self.yiaddr.is_unspecified() || self.yiaddr.is_broadcast() {
            return Err(DhcpError::new(
                ErrorKind::InvalidMessage,
                format!("Invalid DHCP lease address {}", self.yiaddr),
            ));
        }
        if self.t1_sec > self.t2_sec {
            return Err(DhcpError::new(
                ErrorKind::InvalidMessage,
                "Invalid DHCP lease: T1 is bigger than T2".to_string(),
            ));
        }
        if self.t2_sec > self.lease_time_sec {
            return Err(DhcpError::new(
                ErrorKind::InvalidMessage,
                "Invalid DHCP lease: T2 is bigger than lease time".to_string(),
            ));
        }
        Ok(())
    }

    pub fn lease_time(&self) -> Duration {
        Duration::from_secs(self.lease_time_sec.into())
    }

    pub fn t1(&self) -> Duration {
        Duration::from_secs(self.t1_sec.into())
    }

    pub fn t2(&self) -> Duration {
        Duration::from_secs(self.t2_sec.into())
    }

    /// Whether the lease time elapsed at `now`. A lease acquired in the future
    /// (clock stepped backward) is treated as expired.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        match now.duration_since(self.acquired_at) {
            Ok(elapsed) => elapsed >= self.lease_time(),
            Err(_) => true,
        }
    }

    pub fn prefix_length(&self) -> Option<u8> {
        self.subnet_mask
            .map(|m| u32::from(m).count_ones() as u8)
    }
}
