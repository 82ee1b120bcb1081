// SPDX-License-Identifier: Apache-2.0

use crate::{DhcpError, ErrorKind};

pub(crate) const ETH_ALEN: usize = 6;

pub(crate) const BROADCAST_MAC_ADDRESS: [u8; ETH_ALEN] = [u8::MAX; ETH_ALEN];

pub(crate) fn parse_mac(mac: &str) -> Result<[u8; ETH_ALEN], DhcpError> {
    let invalid = || {
        DhcpError::new(
            ErrorKind::InvalidArgument,
            format!(
                "Invalid MAC address {mac}, expecting format \
                 01:02:2a:2c:f7:04"
            ),
        )
    };
    let mut ret = [0u8; ETH_ALEN];
    let mut count = 0;
    for item in mac.split(':') {
        if count >= ETH_ALEN || item.is_empty() || item.len() > 2 {
            return Err(invalid());
        }
        ret[count] = u8::from_str_radix(item, 16).map_err(|_| invalid())?;
        count += 1;
    }
    if count != ETH_ALEN {
        return Err(invalid());
    }
    if ret == BROADCAST_MAC_ADDRESS {
        return Err(DhcpError::new(
            ErrorKind::InvalidArgument,
            format!("Broadcast MAC address {mac} cannot be used by client"),
        ));
    }
    Ok(ret)
}
