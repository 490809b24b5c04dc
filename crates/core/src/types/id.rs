//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.

/// Error returned when an ID cannot be parsed from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id: {0}")]
pub struct ParseIdError(pub String);

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `Ord`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>`, `Into<i64>` and `FromStr` implementations
///
/// The backend serializes ids as JSON numbers; the persisted session stores
/// the selected account id as its decimal string, hence `FromStr`.
///
/// # Example
///
/// ```rust
/// # use ad_console_core::define_id;
/// define_id!(PlanId);
/// define_id!(GroupId);
///
/// let plan = PlanId::new(1);
/// let group = GroupId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: PlanId = group;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|_| $crate::types::id::ParseIdError(s.to_string()))
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(UserId);
define_id!(AccountId);
define_id!(AdPlanId);
define_id!(AdGroupId);
define_id!(AdCreativeId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrips_through_display_and_from_str() {
        let id = AccountId::new(7);
        assert_eq!(id.to_string(), "7");
        assert_eq!("7".parse::<AccountId>(), Ok(id));
        assert_eq!(" 9 ".parse::<AccountId>(), Ok(AccountId::new(9)));
    }

    #[test]
    fn test_id_rejects_garbage() {
        assert!("seven".parse::<AccountId>().is_err());
        assert!("".parse::<UserId>().is_err());
    }

    #[test]
    fn test_id_serializes_as_number() {
        let json = serde_json::to_string(&AdPlanId::new(42)).expect("serialize");
        assert_eq!(json, "42");
        let id: AdPlanId = serde_json::from_str("42").expect("deserialize");
        assert_eq!(id.as_i64(), 42);
    }
}
