//! Home overview endpoint.

use reqwest::Method;
use serde::Deserialize;

use ad_console_core::{Account, AccountId, AdCreative, AdPlan};

use super::{ApiError, Backend, account_query};

/// Data behind the home page.
#[derive(Debug, Clone, Deserialize)]
pub struct HomeOverview {
    #[serde(default)]
    pub account: Option<Account>,
    #[serde(default, rename = "adPlans")]
    pub ad_plans: Vec<AdPlan>,
    #[serde(default, rename = "adCreatives")]
    pub ad_creatives: Vec<AdCreative>,
}

impl Backend<'_> {
    /// `GET /home`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn home(&self, account: Option<AccountId>) -> Result<HomeOverview, ApiError> {
        let query: Vec<_> = account_query(account).into_iter().collect();
        self.fetch::<(), _>(Method::GET, "/home", &query, None).await
    }
}
