use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Random v4 identifiers. Ordering carries no meaning beyond determinism.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// First eight hex digits, enough to tell ids apart in a log line.
            #[must_use]
            pub fn short(&self) -> String {
                let mut buf = Uuid::encode_buffer();
                let full = self.0.simple().encode_lower(&mut buf);
                full.chars().take(8).collect()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

uuid_id! {
    /// One preview session, i.e. one tab.
    SessionId
}

uuid_id! {
    /// One render attempt. A completion whose run id is not the session's
    /// in-flight run is stale and ignored.
    RunId
}
