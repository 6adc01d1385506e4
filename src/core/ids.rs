//! Identifiers for the keyed entities of a game document.
//!
//! Nations, territories and players are keyed by strings chosen by the
//! game setup (nation names, map ids, auth uids). Each key gets its own
//! newtype so a territory id can never be passed where a nation is expected.
//!
//! ```
//! use nation_turns::core::{NationId, TerritoryId};
//!
//! let nation = NationId::new("Avalon");
//! let territory = TerritoryId::from("avalon-capital");
//!
//! assert_eq!(nation.as_str(), "Avalon");
//! assert_eq!(territory.to_string(), "avalon-capital");
//! ```

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from any string-like key.
            #[must_use]
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Borrow the raw key.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_string())
            }
        }

        impl From<String> for $name {
            fn from(key: String) -> Self {
                Self(key)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// A player's stable identity (the auth uid of the client).
    PlayerId
);

string_id!(
    /// A nation, keyed by its name.
    NationId
);

string_id!(
    /// A map territory.
    TerritoryId
);

string_id!(
    /// A game document in the persistence store.
    GameId
);
