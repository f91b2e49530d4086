//! Identifier newtypes.
//!
//! Feed identifiers are opaque strings, but mixing them up (passing a route ID
//! where a calendar ID is expected) is an easy mistake. Each kind of ID gets
//! its own type so the compiler catches that.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
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
    };
}

string_id!(
    /// A physical stop (platform or station) in the canonical stop lists.
    StopId
);

string_id!(
    /// A line, e.g. a named metro line or regional corridor.
    LineId
);

string_id!(
    /// One of the routes a line runs (a line may branch).
    RouteId
);

string_id!(
    /// Direction of travel along a route.
    DirectionId
);

string_id!(
    /// A service calendar.
    CalendarId
);

string_id!(
    /// One independently published schedule source.
    SubfeedId
);
