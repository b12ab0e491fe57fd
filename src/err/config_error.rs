use crate::ProfileId;

/// Errors caused by invalid engine configuration values.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ConfigError {
    /// `max_contexts` was zero.
    ZeroContexts,

    /// `max_contexts` exceeded the CID space of the chosen CID type.
    TooManyContexts {
        /// Requested number of contexts.
        requested: usize,
        /// Number of CIDs available with the chosen CID type.
        cid_space: usize,
    },

    /// The W-LSB window width was not a power of two in the range 1..=64.
    UnsupportedWindowWidth {
        /// Requested window width.
        width: u8,
    },

    /// A profile id that this implementation does not implement was
    /// passed to `enable_profiles`.
    ProfileNotImplemented {
        /// The rejected profile.
        profile: ProfileId,
    },
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use ConfigError::*;
        match self {
            ZeroContexts => {
                write!(f, "ROHC Config Error: 'max_contexts' must be at least 1.")
            }
            TooManyContexts {
                requested,
                cid_space,
            } => write!(
                f,
                "ROHC Config Error: {} contexts requested, but the chosen CID type only allows {}.",
                requested, cid_space
            ),
            UnsupportedWindowWidth { width } => write!(
                f,
                "ROHC Config Error: W-LSB window width {} is not a power of two in the range 1..=64.",
                width
            ),
            ProfileNotImplemented { profile } => write!(
                f,
                "ROHC Config Error: profile {} is not implemented by this library.",
                profile
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
