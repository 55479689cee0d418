//! Typed token newtypes backed by strings.
//!
//! Every record in the device-management backend is addressed by an opaque,
//! externally assigned string. Wrapping them keeps a hardware id from being
//! passed where a site token is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_token {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing token value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw token value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the token is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_token!(
    /// Stable identifier of a physical [`Device`](crate::device::Device).
    HardwareId
);

define_token!(
    /// Token of a [`DeviceSpecification`](crate::specification::DeviceSpecification).
    SpecificationToken
);

define_token!(
    /// Token of a [`Site`](crate::site::Site).
    SiteToken
);

define_token!(
    /// Token of a [`DeviceAssignment`](crate::assignment::DeviceAssignment).
    AssignmentToken
);

impl AssignmentToken {
    /// Generate a fresh random assignment token.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
