// SPDX-License-Identifier: Apache-2.0

/// DHCPv4 Client State
/// RFC 2131 Figure 5: State-transition diagram for DHCP clients
#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash, Default)]
pub enum DhcpV4State {
    /// Broadcasting DHCPDISCOVER and waiting DHCPOFFER
    #[default]
    Init,
    /// DHCPOFFER accepted, broadcasting DHCPREQUEST and waiting DHCPACK
    Selecting,
    /// No reply for the first DHCPREQUEST of selecting state, retransmitting
    Requesting,
    /// Broadcasting DHCPREQUEST for the cached lease and waiting DHCPACK
    InitReboot,
    /// No reply for the first DHCPREQUEST of init_reboot state,
    /// retransmitting
    Rebooting,
    /// DHCP lease acquired, waiting T1/T2 to refresh the lease
    Bound,
    /// T1 expired, sending DHCPREQUEST to the leasing server
    Renewing,
    /// T2 expired, broadcasting DHCPREQUEST to any server
    Rebinding,
    /// Stopped by host, no timer or socket registered
    Stopped,
}

impl std::fmt::Display for DhcpV4State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Init => "init",
                Self::Selecting => "selecting",
                Self::Requesting => "requesting",
                Self::InitReboot => "init_reboot",
                Self::Rebooting => "rebooting",
                Self::Bound => "bound",
                Self::Renewing => "renewing",
                Self::Rebinding => "rebinding",
                Self::Stopped => "stopped",
            }
        )
    }
}

impl DhcpV4State {
    /// States holding a committed lease.
    pub fn has_lease(&self) -> bool {
        matches!(self, Self::Bound | Self::Renewing | Self::Rebinding)
    }
}
