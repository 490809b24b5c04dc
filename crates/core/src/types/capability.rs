//! Role-derived capabilities.
//!
//! Every permission check in the console goes through [`has_capability`] or a
//! [`CapabilitySet`]; both read the same role tables below, so adding a
//! capability means touching exactly one place.
//!
//! Resolution order: `super-admin` holds every capability regardless of
//! account. Everyone else gets the union of what their global role grants and
//! what their role in the currently selected account grants.

use serde::{Deserialize, Serialize};

use super::account::Account;
use super::role::{AccountRole, Role};
use super::user::UserProfile;

/// Something a user may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// See campaign lists and the home overview.
    ViewCampaigns,
    /// Create, edit and delete ad plans, groups and creatives.
    ManageCampaigns,
    /// Edit statistic columns (costs, counts, rates) on campaign records.
    EditStatistics,
    /// Edit account balance and daily budget.
    ManageAccountFinance,
    /// Enter the `/admin` area at all.
    AccessAdminConsole,
    /// Manage users and their account bindings.
    ManageUsers,
    /// Create and edit advertiser accounts.
    ManageAccounts,
}

impl Capability {
    /// Every capability.
    pub const ALL: [Self; 7] = [
        Self::ViewCampaigns,
        Self::ManageCampaigns,
        Self::EditStatistics,
        Self::ManageAccountFinance,
        Self::AccessAdminConsole,
        Self::ManageUsers,
        Self::ManageAccounts,
    ];

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

const fn global_grants(role: Role) -> &'static [Capability] {
    match role {
        Role::SuperAdmin => &Capability::ALL,
        Role::Admin => &[Capability::ViewCampaigns, Capability::AccessAdminConsole],
        Role::User => &[Capability::ViewCampaigns],
    }
}

const fn account_grants(role: AccountRole) -> &'static [Capability] {
    match role {
        AccountRole::SiteAdmin => &[
            Capability::ViewCampaigns,
            Capability::ManageCampaigns,
            Capability::EditStatistics,
            Capability::ManageAccountFinance,
            Capability::AccessAdminConsole,
        ],
        AccountRole::AdOperator => &[
            Capability::ViewCampaigns,
            Capability::ManageCampaigns,
            Capability::AccessAdminConsole,
        ],
    }
}

/// A resolved set of capabilities for one user in one account scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Resolve capabilities from a global role and an optional account role.
    #[must_use]
    pub fn resolve(role: Role, account_role: Option<AccountRole>) -> Self {
        let mut set = Self::empty();
        set.extend(global_grants(role));
        if let Some(account_role) = account_role {
            set.extend(account_grants(account_role));
        }
        set
    }

    /// Resolve capabilities for `user` with `account` selected.
    #[must_use]
    pub fn for_user(user: &UserProfile, account: Option<&Account>) -> Self {
        Self::resolve(user.role, account.and_then(|a| a.user_role))
    }

    fn extend(&mut self, caps: &[Capability]) {
        for cap in caps {
            self.0 |= cap.bit();
        }
    }

    /// Whether `cap` is in the set.
    #[must_use]
    pub const fn contains(self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    /// Iterate over the capabilities in the set.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |cap| self.contains(*cap))
    }

    // Template-facing shorthands.

    #[must_use]
    pub const fn can_manage_campaigns(self) -> bool {
        self.contains(Capability::ManageCampaigns)
    }

    #[must_use]
    pub const fn can_edit_statistics(self) -> bool {
        self.contains(Capability::EditStatistics)
    }

    #[must_use]
    pub const fn can_manage_finance(self) -> bool {
        self.contains(Capability::ManageAccountFinance)
    }

    #[must_use]
    pub const fn can_access_admin(self) -> bool {
        self.contains(Capability::AccessAdminConsole)
    }

    #[must_use]
    pub const fn can_manage_users(self) -> bool {
        self.contains(Capability::ManageUsers)
    }

    #[must_use]
    pub const fn can_manage_accounts(self) -> bool {
        self.contains(Capability::ManageAccounts)
    }
}

/// Whether `user`, acting in `account`, holds `cap`.
#[must_use]
pub fn has_capability(user: &UserProfile, account: Option<&Account>, cap: Capability) -> bool {
    CapabilitySet::for_user(user, account).contains(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_super_admin_has_everything() {
        let set = CapabilitySet::resolve(Role::SuperAdmin, None);
        for cap in Capability::ALL {
            assert!(set.contains(cap), "{cap:?}");
        }
    }

    #[test]
    fn test_plain_user_without_account_only_views() {
        let set = CapabilitySet::resolve(Role::User, None);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Capability::ViewCampaigns]);
    }

    #[test]
    fn test_ad_operator_cannot_edit_statistics() {
        let set = CapabilitySet::resolve(Role::User, Some(AccountRole::AdOperator));
        assert!(set.can_manage_campaigns());
        assert!(set.can_access_admin());
        assert!(!set.can_edit_statistics());
        assert!(!set.can_manage_finance());
    }

    #[test]
    fn test_site_admin_manages_account_but_not_users() {
        let set = CapabilitySet::resolve(Role::User, Some(AccountRole::SiteAdmin));
        assert!(set.can_edit_statistics());
        assert!(set.can_manage_finance());
        assert!(!set.can_manage_users());
        assert!(!set.can_manage_accounts());
    }

    #[test]
    fn test_global_admin_unions_with_account_role() {
        let without = CapabilitySet::resolve(Role::Admin, None);
        assert!(without.can_access_admin());
        assert!(!without.can_manage_campaigns());

        let with = CapabilitySet::resolve(Role::Admin, Some(AccountRole::AdOperator));
        assert!(with.can_manage_campaigns());
        assert!(!with.can_manage_users());
    }
}
