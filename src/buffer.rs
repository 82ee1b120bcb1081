// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv4Addr;

use crate::{DhcpError, ErrorKind};

#[derive(Debug)]
pub(crate) struct Buffer<'a> {
    index: usize,
    data: &'a [u8],
}

impl<'a> Buffer<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { index: 0, data }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remain_len() == 0
    }

    pub(crate) fn remain_len(&self) -> usize {
        self.data.len().saturating_sub(self.index)
    }

    pub(crate) fn get_u8(&mut self) -> Result<u8, DhcpError> {
        if self.is_empty() {
            return Err(DhcpError::new(
                ErrorKind::InvalidMessage,
                "Remain buffer not enough for getting u8".to_string(),
            ));
        }
        let ret = self.data[self.index];
        self.index += 1;
        Ok(ret)
    }

    pub(crate) fn get_u16_be(&mut self) -> Result<u16, DhcpError> {
        let raw = self.get_array::<2>().map_err(|_| {
            DhcpError::new(
                ErrorKind::InvalidMessage,
                "Remain buffer not enough for getting u16".to_string(),
            )
        })?;
        Ok(u16::from_be_bytes(raw))
    }

    pub(crate) fn get_u32_be(&mut self) -> Result<u32, DhcpError> {
        let raw = self.get_array::<4>().map_err(|_| {
            DhcpError::new(
                ErrorKind::InvalidMessage,
                "Remain buffer not enough for getting u32".to_string(),
            )
        })?;
        Ok(u32::from_be_bytes(raw))
    }

    pub(crate) fn get_ipv4(&mut self) -> Result<Ipv4Addr, DhcpError> {
        Ok(Ipv4Addr::from(self.get_u32_be().map_err(|_| {
            DhcpError::new(
                ErrorKind::InvalidMessage,
                "Remain buffer not enough for getting IPv4 address"
                    .to_string(),
            )
        })?))
    }

    pub(crate) fn get_bytes(&mut self, len: usize) -> Result<&'a [u8], DhcpError> {
        if self.remain_len() < len {
            return Err(DhcpError::new(
                ErrorKind::InvalidMessage,
                format!(
                    "Remain buffer not enough for getting {len} bytes array"
                ),
            ));
        }
        let ret = &self.data[self.index..self.index + len];
        self.index += len;
        Ok(ret)
    }

    pub(crate) fn get_array<const N: usize>(
        &mut self,
    ) -> Result<[u8; N], DhcpError> {
        let mut ret = [0u8; N];
        ret.copy_from_slice(self.get_bytes(N)?);
        Ok(ret)
    }

    pub(crate) fn get_remains(&mut self) -> &'a [u8] {
        let ret = if self.index > self.data.len() {
            &[]
        } else {
            &self.data[self.index..]
        };
        self.index = self.data.len();
        ret
    }
}

#[derive(Debug, Default)]
pub(crate) struct BufferMut {
    pub(crate) data: Vec<u8>,
}

impl BufferMut {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub(crate) fn write_u16_be(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn write_u32_be(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub(crate) fn write_ipv4(&mut self, addr: Ipv4Addr) {
        self.data.extend_from_slice(&addr.octets());
    }

    /// Write `bytes` into a field of exactly `fix_size` bytes, truncating or
    /// zero filling as needed.
    pub(crate) fn write_fixed(&mut self, bytes: &[u8], fix_size: usize) {
        let len = std::cmp::min(bytes.len(), fix_size);
        self.data.extend_from_slice(&bytes[..len]);
        self.data.resize(self.data.len() + fix_size - len, 0);
    }
}
