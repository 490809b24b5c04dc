//! In-memory list state for the CRUD pages.
//!
//! A [`ListState`] holds one page of records fetched for one account, plus
//! the pagination inputs that produced it. Mutations from forms reconcile the
//! held page locally instead of re-fetching.
//!
//! Fetches are ticketed: [`ListState::begin_fetch`] hands out a
//! [`FetchTicket`] and [`ListState::finish_fetch`] applies a result only if no
//! newer fetch, invalidation or account change happened in between.

use thiserror::Error;

use ad_console_core::{
    AccountId, AccountRecord, AdCreative, AdCreativeId, AdGroup, AdGroupId, AdPlan, AdPlanId,
    ManagedUser, Page, PageRequest, UserId,
};

/// Errors from list-level checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    /// The group still has plans bound to it.
    #[error("ad group still contains {count} ad plan(s); unbind them before deleting")]
    HasDependents { count: usize },

    /// The record is not in the current page.
    #[error("record not found in the current list")]
    Missing,
}

/// A record with a stable identity inside a list.
pub trait Keyed {
    type Key: Copy + Eq;

    fn key(&self) -> Self::Key;
}

impl Keyed for AdPlan {
    type Key = AdPlanId;

    fn key(&self) -> AdPlanId {
        self.id
    }
}

impl Keyed for AdGroup {
    type Key = AdGroupId;

    fn key(&self) -> AdGroupId {
        self.id
    }
}

impl Keyed for AdCreative {
    type Key = AdCreativeId;

    fn key(&self) -> AdCreativeId {
        self.id
    }
}

impl Keyed for ManagedUser {
    type Key = UserId;

    fn key(&self) -> UserId {
        self.id
    }
}

impl Keyed for AccountRecord {
    type Key = AccountId;

    fn key(&self) -> AccountId {
        self.id
    }
}

/// Proof that a fetch was started at a given generation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "pass the ticket back to finish_fetch"]
pub struct FetchTicket {
    generation: u64,
    account: Option<AccountId>,
    query: PageRequest,
}

impl FetchTicket {
    /// The account the fetch is scoped to.
    #[must_use]
    pub const fn account(&self) -> Option<AccountId> {
        self.account
    }

    /// The page to fetch.
    #[must_use]
    pub const fn query(&self) -> &PageRequest {
        &self.query
    }
}

/// One page of records and the inputs that produced it.
#[derive(Debug, Clone)]
pub struct ListState<T> {
    items: Vec<T>,
    total: u64,
    query: PageRequest,
    account: Option<AccountId>,
    loaded: bool,
    generation: u64,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            query: PageRequest::default(),
            account: None,
            loaded: false,
            generation: 0,
        }
    }
}

impl<T: Keyed> ListState<T> {
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            query: PageRequest::first(page_size),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub const fn query(&self) -> &PageRequest {
        &self.query
    }

    /// The account the held records belong to.
    #[must_use]
    pub const fn account(&self) -> Option<AccountId> {
        self.account
    }

    /// Whether a fetch is needed to show `account`'s records.
    #[must_use]
    pub fn is_stale_for(&self, account: Option<AccountId>) -> bool {
        !self.loaded || self.account != account
    }

    /// Change the page, size or keyword. Held records are kept until the next
    /// fetch completes.
    pub fn set_query(&mut self, query: PageRequest) {
        if query != self.query {
            self.query = query;
            self.loaded = false;
        }
    }

    /// Start a fetch for `account`. Any fetch started earlier becomes stale.
    pub fn begin_fetch(&mut self, account: Option<AccountId>) -> FetchTicket {
        self.generation += 1;
        FetchTicket {
            generation: self.generation,
            account,
            query: self.query.clone(),
        }
    }

    /// Start a fetch only if the held records do not already answer for
    /// `account` and the current query.
    pub fn begin_refresh(&mut self, account: Option<AccountId>) -> Option<FetchTicket> {
        self.is_stale_for(account)
            .then(|| self.begin_fetch(account))
    }

    /// Apply a fetch result. Returns `false` and leaves the list untouched if
    /// the ticket is out of date.
    pub fn finish_fetch(&mut self, ticket: FetchTicket, page: Page<T>) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                "Discarding stale list response"
            );
            return false;
        }
        self.items = page.items;
        self.total = page.total;
        self.account = ticket.account;
        self.loaded = true;
        true
    }

    /// Force the next refresh to fetch, keeping the query. Used after changes
    /// to nested collections the list cannot reconcile locally.
    pub fn mark_stale(&mut self) {
        self.loaded = false;
    }

    /// Drop the held records and make every outstanding ticket stale.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.items.clear();
        self.total = 0;
        self.account = None;
        self.loaded = false;
        self.query = self.query.with_page(1);
    }

    /// Insert a newly created record at the top.
    pub fn prepend(&mut self, item: T) {
        self.items.insert(0, item);
        self.total += 1;
    }

    /// Replace the record with the same key. Returns `false` if absent.
    pub fn replace(&mut self, item: T) -> bool {
        match self.items.iter_mut().find(|i| i.key() == item.key()) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    /// Modify the record with `key` in place.
    ///
    /// # Errors
    ///
    /// Returns [`ListError::Missing`] if no such record is held.
    pub fn merge(&mut self, key: T::Key, f: impl FnOnce(&mut T)) -> Result<(), ListError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.key() == key)
            .ok_or(ListError::Missing)?;
        f(item);
        Ok(())
    }

    /// Remove the record with `key`. Returns it if it was held.
    ///
    /// Emptying a page past the first steps back one page and marks the list
    /// stale.
    pub fn remove(&mut self, key: T::Key) -> Option<T> {
        let index = self.items.iter().position(|i| i.key() == key)?;
        self.total = self.total.saturating_sub(1);
        let removed = self.items.remove(index);
        let page = self.query.page();
        if self.items.is_empty() && page > 1 {
            self.query = self.query.with_page(page - 1);
            self.loaded = false;
        }
        Some(removed)
    }

    #[must_use]
    pub fn get(&self, key: T::Key) -> Option<&T> {
        self.items.iter().find(|i| i.key() == key)
    }
}

/// Refuse to delete a group that still has plans bound.
///
/// # Errors
///
/// Returns [`ListError::HasDependents`] with the number of bound plans.
pub fn ensure_group_deletable(group: &AdGroup) -> Result<(), ListError> {
    match group.dependents() {
        0 => Ok(()),
        count => Err(ListError::HasDependents { count }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(id: i64, name: &str) -> AdPlan {
        serde_json::from_value(serde_json::json!({"id": id, "name": name})).expect("plan")
    }

    fn page(items: Vec<AdPlan>) -> Page<AdPlan> {
        let total = items.len() as u64;
        Page { items, total }
    }

    #[test]
    fn test_fresh_list_needs_fetch() {
        let list = ListState::<AdPlan>::new(20);
        assert!(list.is_stale_for(None));
        assert_eq!(list.query().page_size(), 20);
    }

    #[test]
    fn test_finish_fetch_records_account_scope() {
        let mut list = ListState::new(20);
        let ticket = list.begin_fetch(Some(AccountId::new(7)));
        assert!(list.finish_fetch(ticket, page(vec![plan(1, "a")])));

        assert!(!list.is_stale_for(Some(AccountId::new(7))));
        assert!(list.begin_refresh(Some(AccountId::new(7))).is_none());
        assert!(list.begin_refresh(Some(AccountId::new(9))).is_some());
        assert!(list.is_stale_for(Some(AccountId::new(9))));
        assert_eq!(list.items().len(), 1);
    }

    #[test]
    fn test_older_ticket_is_discarded() {
        let mut list = ListState::new(20);
        let first = list.begin_fetch(Some(AccountId::new(7)));
        let second = list.begin_fetch(Some(AccountId::new(9)));

        assert!(list.finish_fetch(second, page(vec![plan(2, "nine")])));
        assert!(!list.finish_fetch(first, page(vec![plan(1, "seven")])));

        assert_eq!(list.items()[0].name, "nine");
        assert_eq!(list.account(), Some(AccountId::new(9)));
    }

    #[test]
    fn test_invalidate_discards_in_flight_fetch() {
        let mut list = ListState::new(20);
        let ticket = list.begin_fetch(Some(AccountId::new(7)));
        list.invalidate();

        assert!(!list.finish_fetch(ticket, page(vec![plan(1, "a")])));
        assert!(list.items().is_empty());
        assert!(list.is_stale_for(Some(AccountId::new(7))));
    }

    #[test]
    fn test_local_reconciliation() {
        let mut list = ListState::new(20);
        let ticket = list.begin_fetch(None);
        list.finish_fetch(ticket, page(vec![plan(1, "a"), plan(2, "b")]));

        list.prepend(plan(3, "c"));
        assert_eq!(list.items()[0].id, AdPlanId::new(3));
        assert_eq!(list.total(), 3);

        assert!(list.replace(plan(2, "b2")));
        assert_eq!(list.get(AdPlanId::new(2)).map(|p| p.name.as_str()), Some("b2"));
        assert!(!list.replace(plan(9, "nope")));

        list.merge(AdPlanId::new(1), |p| p.name = "a2".into())
            .expect("merge");
        assert_eq!(list.get(AdPlanId::new(1)).map(|p| p.name.as_str()), Some("a2"));
        assert_eq!(
            list.merge(AdPlanId::new(9), |_| {}),
            Err(ListError::Missing)
        );

        assert!(list.remove(AdPlanId::new(3)).is_some());
        assert!(list.remove(AdPlanId::new(3)).is_none());
        assert_eq!(list.total(), 2);
    }

    #[test]
    fn test_emptying_last_page_steps_back() {
        let mut list = ListState::new(2);
        list.set_query(PageRequest::new(3, 2, Some("a")));
        let ticket = list.begin_fetch(None);
        list.finish_fetch(
            ticket,
            Page {
                items: vec![plan(5, "a5")],
                total: 5,
            },
        );

        assert!(list.remove(AdPlanId::new(5)).is_some());
        assert_eq!(list.total(), 4);
        assert_eq!(list.query().page(), 2);
        assert_eq!(list.query().keyword(), Some("a"));
        assert!(list.is_stale_for(None));
    }

    #[test]
    fn test_emptying_first_page_stays_loaded() {
        let mut list = ListState::new(20);
        let ticket = list.begin_fetch(None);
        list.finish_fetch(ticket, page(vec![plan(1, "a")]));

        assert!(list.remove(AdPlanId::new(1)).is_some());
        assert_eq!(list.query().page(), 1);
        assert!(!list.is_stale_for(None));
    }

    #[test]
    fn test_changing_query_marks_list_stale() {
        let mut list = ListState::<AdPlan>::new(20);
        let ticket = list.begin_fetch(None);
        list.finish_fetch(ticket, Page::default());
        assert!(!list.is_stale_for(None));

        list.set_query(PageRequest::new(2, 20, None));
        assert!(list.is_stale_for(None));
    }

    #[test]
    fn test_group_with_plans_is_not_deletable() {
        let mut group = AdGroup {
            id: AdGroupId::new(1),
            name: "g".into(),
            ad_plans: vec![plan(1, "a"), plan(2, "b")],
        };
        assert_eq!(
            ensure_group_deletable(&group),
            Err(ListError::HasDependents { count: 2 })
        );

        group.ad_plans.clear();
        assert_eq!(ensure_group_deletable(&group), Ok(()));
    }
}
