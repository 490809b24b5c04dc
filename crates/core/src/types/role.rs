//! Global and account-scoped roles.
//!
//! A user carries one global [`Role`] and, for every account they belong to,
//! an [`AccountRole`]. Capabilities are derived from both by
//! [`crate::CapabilitySet`].

use serde::{Deserialize, Serialize};

/// Global role on the user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    /// Regular user; access is governed by account roles.
    #[default]
    #[serde(rename = "user")]
    User,
    /// Console administrator.
    #[serde(rename = "admin")]
    Admin,
    /// Full access including user and account management.
    #[serde(rename = "super-admin")]
    SuperAdmin,
}

impl Role {
    /// All roles, lowest privilege first.
    pub const ALL: [Self; 3] = [Self::User, Self::Admin, Self::SuperAdmin];

    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::SuperAdmin => "super-admin",
        }
    }

    /// Human-readable label for tables.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Admin => "Administrator",
            Self::SuperAdmin => "Super administrator",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "super-admin" => Ok(Self::SuperAdmin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Role a user holds within one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    /// Manages the account: campaigns, statistics and finances.
    SiteAdmin,
    /// Operates campaigns; statistics are read-only.
    AdOperator,
}

impl AccountRole {
    /// All account roles.
    pub const ALL: [Self; 2] = [Self::SiteAdmin, Self::AdOperator];

    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SiteAdmin => "site_admin",
            Self::AdOperator => "ad_operator",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SiteAdmin => "Site admin",
            Self::AdOperator => "Ad operator",
        }
    }
}

impl std::fmt::Display for AccountRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "site_admin" => Ok(Self::SiteAdmin),
            "ad_operator" => Ok(Self::AdOperator),
            _ => Err(format!("invalid account role: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(
            serde_json::to_string(&Role::SuperAdmin).expect("serialize"),
            "\"super-admin\""
        );
        let role: Role = serde_json::from_str("\"user\"").expect("deserialize");
        assert_eq!(role, Role::User);
        assert_eq!(
            serde_json::to_string(&AccountRole::AdOperator).expect("serialize"),
            "\"ad_operator\""
        );
    }

    #[test]
    fn test_from_str_matches_display() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>(), Ok(role));
        }
        for role in AccountRole::ALL {
            assert_eq!(role.to_string().parse::<AccountRole>(), Ok(role));
        }
        assert!("root".parse::<Role>().is_err());
    }
}
