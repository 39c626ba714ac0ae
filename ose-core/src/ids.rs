//! Identifier types for host documents.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! document_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s.trim())?))
            }
        }
    };
}

document_id!(
    /// Unique identifier for actors.
    ActorId
);
document_id!(
    /// Unique identifier for owned items.
    ItemId
);
document_id!(
    /// Unique identifier for scenes.
    SceneId
);
document_id!(
    /// Unique identifier for tokens within a scene.
    TokenId
);
document_id!(
    /// Unique identifier for users.
    UserId
);
document_id!(
    /// Unique identifier for chat messages.
    MessageId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trip() {
        let id = ActorId::new();
        assert_eq!(id.to_string().parse::<ActorId>().unwrap(), id);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("not-an-id".parse::<ItemId>().is_err());
    }
}
