/// Optional engine behaviors, combined with `|`.
///
/// ```
/// use rohcomp::Features;
///
/// let features = Features::TIME_BASED_REFRESHES | Features::DUMP_PACKETS;
/// assert!(features.contains(Features::DUMP_PACKETS));
/// assert!(!features.contains(Features::NO_IP_CHECKSUMS));
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Features(u32);

impl Features {
    /// No optional behavior.
    pub const NONE: Features = Features(0);

    /// Additionally trigger IR refreshes based on the wall-clock
    /// timestamps the caller passes to `compress`.
    pub const TIME_BASED_REFRESHES: Features = Features(1 << 0);

    /// Do not verify IPv4 header checksums on intake.
    pub const NO_IP_CHECKSUMS: Features = Features(1 << 1);

    /// Include IPv6 headers in the ROHCv2 control field CRC the way
    /// peers predating RFC 5225 erratum 2703 do.
    pub const COMPAT_PRE_ERRATUM: Features = Features(1 << 2);

    /// Hex-dump every packet at trace log level.
    pub const DUMP_PACKETS: Features = Features(1 << 3);

    /// True if every flag in `other` is set in `self`.
    #[inline]
    pub fn contains(self, other: Features) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl core::ops::BitOr for Features {
    type Output = Features;
    fn bitor(self, rhs: Features) -> Features {
        Features(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for Features {
    fn bitor_assign(&mut self, rhs: Features) {
        self.0 |= rhs.0;
    }
}
