// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

// RFC 2131 suggests four times(60 seconds) retry before fallback to
// discovery phase
pub(crate) const MAX_REQUEST_RETRY_COUNT: u32 = 4;

// RFC 2131, section 3.1.5: after DHCPDECLINE, the client SHOULD wait a
// minimum of ten seconds before restarting the configuration process.
pub(crate) const DECLINE_BACKOFF: Duration = Duration::from_secs(10);

const MAX_RETRANSMIT_BASE_SEC: u64 = 64;

pub(crate) fn default_t1(lease_time_sec: u32) -> u32 {
    lease_time_sec / 2
}

pub(crate) fn default_t2(lease_time_sec: u32) -> u32 {
    (u64::from(lease_time_sec) * 7 / 8) as u32
}

// RFC 2131, section 4.1 "Constructing and sending DHCP messages":
//      The delay before the next retransmission SHOULD be 4 seconds
//      randomized by the value of a uniform number chosen from the range -1
//      to +1. The retransmission delay SHOULD be doubled with subsequent
//      retransmissions up to a maximum of 64 seconds.
pub(crate) fn gen_retransmit_delay(retry_count: u32) -> Duration {
    let base = if retry_count >= 4 {
        MAX_RETRANSMIT_BASE_SEC
    } else {
        4u64 << retry_count
    };
    let ms: u64 = rand::random_range(0..2000);
    Duration::from_secs(base - 1) + Duration::from_millis(ms)
}
