//! Type-safe identifier wrappers.
//!
//! Accounts are identified by the chat platform's stable numeric user ID,
//! so [`AccountId`] wraps an `i64` rather than a UUID. Engine-owned
//! entities (battles, ledger entries) use UUID v7 (time-ordered) for
//! efficient database indexing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_uuid_id! {
    /// Unique identifier for a battle.
    BattleId
}

define_uuid_id! {
    /// Unique identifier for a ledger entry (balance mutation record).
    LedgerEntryId
}

/// The economic identity holding a currency balance.
///
/// This is the chat platform's numeric user ID, carried through the engine
/// unchanged so the command layer never needs a mapping table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct AccountId(pub i64);

impl AccountId {
    /// Wrap a raw platform user ID.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Return the raw platform user ID.
    pub const fn into_inner(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for AccountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AccountId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<AccountId> for i64 {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

/// Opaque handle to an externally rendered display surface.
///
/// The command layer owns the actual surface (a chat message, typically);
/// the engine only stores and echoes the handle back on updates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayRef(pub String);

impl DisplayRef {
    /// Wrap an opaque surface handle issued by the command layer.
    pub const fn new(raw: String) -> Self {
        Self(raw)
    }

    /// Return the raw handle.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Borrow the raw handle.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for DisplayRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_distinct() {
        let a = BattleId::new();
        let b = BattleId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }

    #[test]
    fn account_id_roundtrip_serde() {
        let original = AccountId::new(823_471_920_113);
        let json = serde_json::to_string(&original).ok();
        let restored: Result<AccountId, _> =
            serde_json::from_str(json.as_deref().unwrap_or(""));
        assert_eq!(restored.ok(), Some(original));
    }

    #[test]
    fn account_id_display_is_raw_number() {
        let id = AccountId::new(42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn battle_ids_are_time_ordered() {
        let earlier = BattleId::new();
        let later = BattleId::new();
        // UUID v7 sorts by creation time.
        assert!(earlier <= later);
    }
}
