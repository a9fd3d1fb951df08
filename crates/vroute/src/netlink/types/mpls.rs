//! MPLS label stack entries and lightweight tunnel constants.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// MPLS label entry (struct mpls_label).
///
/// The entry is a big-endian 32-bit value with:
/// - Bits 31-12: Label (20 bits)
/// - Bits 11-9: Traffic Class (3 bits)
/// - Bit 8: Bottom-of-Stack (S bit)
/// - Bits 7-0: TTL (8 bits)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct MplsLabelEntry {
    /// Big-endian encoded label entry.
    pub entry: u32,
}

impl MplsLabelEntry {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Encode one entry of a label stack. TC and TTL are left zero.
    pub fn new(label: u32, bos: bool) -> Self {
        let entry = ((label & mpls_label::MAX) << 12) | if bos { 1 << 8 } else { 0 };
        Self {
            entry: entry.to_be(),
        }
    }

    /// Get the label value (20 bits).
    pub fn label(&self) -> u32 {
        (u32::from_be(self.entry) >> 12) & mpls_label::MAX
    }

    /// Check if this is the bottom of stack.
    pub fn is_bos(&self) -> bool {
        (u32::from_be(self.entry) & 0x100) != 0
    }
}

/// MPLS tunnel attributes (MPLS_IPTUNNEL_*).
pub mod mpls_tunnel {
    /// Destination label stack.
    pub const DST: u16 = 1;
}

/// Lightweight tunnel encapsulation types (LWTUNNEL_ENCAP_*).
pub mod lwtunnel_encap {
    /// MPLS encapsulation.
    pub const MPLS: u16 = 1;
    /// IP encapsulation.
    pub const IP: u16 = 2;
    /// ILA encapsulation.
    pub const ILA: u16 = 3;
    /// IPv6 encapsulation.
    pub const IP6: u16 = 4;
}

/// IP tunnel attributes (LWTUNNEL_IP_* and LWTUNNEL_IP6_*).
///
/// Both families share numbering; IPv6 names slot 4 `HOPLIMIT` and slot 5 `TC`.
pub mod lwtunnel_ip {
    pub const ID: u16 = 1;
    pub const DST: u16 = 2;
    pub const SRC: u16 = 3;
    pub const TTL: u16 = 4;
    pub const TOS: u16 = 5;
    pub const FLAGS: u16 = 6;
}

/// ILA attributes (ILA_ATTR_*).
pub mod ila_attr {
    pub const LOCATOR: u16 = 1;
}

/// MPLS label limits.
pub mod mpls_label {
    /// Maximum valid label value.
    pub const MAX: u32 = 0xFFFFF;
    /// Deepest label stack the kernel accepts in one encapsulation.
    pub const MAX_LABELS: usize = 30;
}
