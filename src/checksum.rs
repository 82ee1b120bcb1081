// SPDX-License-Identifier: Apache-2.0

/// Internet checksum defined by RFC 1071.
///
/// The data is summed as big-endian 16 bits words, a trailing odd byte is
/// treated as the high order byte of a zero padded word. The carries are
/// folded back into the low 16 bits and the ones' complement of the result is
/// returned.
pub fn compute_checksum(data: &[u8]) -> u16 {
    let mut sum: u64 = data
        .chunks(2)
        .map(|c| match c {
            [h, l] => u64::from(u16::from_be_bytes([*h, *l])),
            [h] => u64::from(*h) << 8,
            _ => 0,
        })
        .sum();
    while (sum >> 16) != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}
