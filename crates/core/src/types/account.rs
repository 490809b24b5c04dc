//! Advertiser accounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{AccountId, UserId};
use super::role::AccountRole;

/// An account the logged-in user can act in.
///
/// Returned by `GET /users/accounts`. `user_role` is the caller's role in this
/// account; account-scoped capabilities derive from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    #[serde(default)]
    pub display_id: Option<String>,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default, alias = "account_daily_budget")]
    pub daily_budget: Decimal,
    #[serde(default)]
    pub today_cost: Decimal,
    #[serde(default, alias = "role")]
    pub user_role: Option<AccountRole>,
}

impl Account {
    /// Label for the account switcher.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.display_id {
            Some(display_id) if !display_id.is_empty() => format!("{} ({display_id})", self.name),
            _ => self.name.clone(),
        }
    }

    /// Apply a finance update returned or submitted from the dashboard.
    pub fn apply_update(&mut self, update: &AccountUpdate) {
        if let Some(name) = &update.name {
            self.name.clone_from(name);
        }
        if let Some(display_id) = &update.display_id {
            self.display_id = Some(display_id.clone());
        }
        if let Some(balance) = update.balance {
            self.balance = balance;
        }
        if let Some(budget) = update.daily_budget {
            self.daily_budget = budget;
        }
        if let Some(cost) = update.today_cost {
            self.today_cost = cost;
        }
    }
}

/// A user bound to an account, as listed on the account administration page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMember {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    pub account_role: AccountRole,
}

/// An account as seen by a super-admin (`GET /admin/account/list`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub name: String,
    #[serde(default)]
    pub display_id: Option<String>,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default, rename = "account_daily_budget", alias = "daily_budget")]
    pub daily_budget: Decimal,
    #[serde(default)]
    pub today_cost: Decimal,
    #[serde(default)]
    pub users: Vec<AccountMember>,
}

impl AccountRecord {
    /// Merge an update that the backend accepted.
    pub fn apply_update(&mut self, update: &AccountUpdate) {
        if let Some(name) = &update.name {
            self.name.clone_from(name);
        }
        if let Some(display_id) = &update.display_id {
            self.display_id = Some(display_id.clone());
        }
        if let Some(balance) = update.balance {
            self.balance = balance;
        }
        if let Some(budget) = update.daily_budget {
            self.daily_budget = budget;
        }
        if let Some(cost) = update.today_cost {
            self.today_cost = cost;
        }
    }
}

/// Body of `POST /admin/account`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_id: Option<String>,
    pub balance: Decimal,
    #[serde(rename = "account_daily_budget")]
    pub daily_budget: Decimal,
}

/// Body of `PUT /admin/account/:id`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,
    #[serde(
        default,
        rename = "account_daily_budget",
        skip_serializing_if = "Option::is_none"
    )]
    pub daily_budget: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today_cost: Option<Decimal>,
}

impl AccountUpdate {
    /// Whether the update carries no fields.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.display_id.is_none()
            && self.balance.is_none()
            && self.daily_budget.is_none()
            && self.today_cost.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_account_accepts_backend_budget_name() {
        let json = r#"{
            "id": 7,
            "name": "North",
            "display_id": "N-7",
            "balance": "1200.50",
            "account_daily_budget": 300,
            "today_cost": "12.3",
            "user_role": "site_admin"
        }"#;
        let account: Account = serde_json::from_str(json).expect("deserialize");
        assert_eq!(account.id, AccountId::new(7));
        assert_eq!(account.daily_budget, Decimal::from(300));
        assert_eq!(account.user_role, Some(AccountRole::SiteAdmin));
        assert_eq!(account.label(), "North (N-7)");
    }

    #[test]
    fn test_account_tolerates_missing_figures() {
        let account: Account =
            serde_json::from_str(r#"{"id": 9, "name": "South"}"#).expect("deserialize");
        assert_eq!(account.balance, Decimal::ZERO);
        assert!(account.user_role.is_none());
        assert_eq!(account.label(), "South");
    }

    #[test]
    fn test_update_serializes_only_present_fields() {
        let update = AccountUpdate {
            daily_budget: Some(Decimal::from_str("50.00").expect("decimal")),
            ..AccountUpdate::default()
        };
        let value = serde_json::to_value(&update).expect("serialize");
        assert_eq!(value, serde_json::json!({"account_daily_budget": "50.00"}));
        assert!(AccountUpdate::default().is_empty());
    }

    #[test]
    fn test_apply_update_merges_fields() {
        let mut record = AccountRecord {
            id: AccountId::new(1),
            name: "Old".into(),
            display_id: None,
            balance: Decimal::ZERO,
            daily_budget: Decimal::ZERO,
            today_cost: Decimal::ZERO,
            users: vec![],
        };
        record.apply_update(&AccountUpdate {
            name: Some("New".into()),
            balance: Some(Decimal::from(10)),
            ..AccountUpdate::default()
        });
        assert_eq!(record.name, "New");
        assert_eq!(record.balance, Decimal::from(10));
    }
}
