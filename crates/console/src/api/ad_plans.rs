//! Ad plan endpoints.

use reqwest::Method;
use serde::Deserialize;

use ad_console_core::{AccountId, AdPlan, AdPlanId, AdPlanInput, Page, PageRequest, Pagination};

use super::{ApiError, Backend, Scoped, account_query, list_query};

#[derive(Deserialize)]
struct AdPlanList {
    #[serde(default)]
    ad_plans: Vec<AdPlan>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Deserialize)]
struct CreatedAdPlan {
    ad_plan: AdPlan,
}

impl Backend<'_> {
    /// `GET /ad-plans`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn list_ad_plans(
        &self,
        page: &PageRequest,
        account: Option<AccountId>,
    ) -> Result<Page<AdPlan>, ApiError> {
        let query = list_query(page, account);
        let list: AdPlanList = self
            .fetch::<(), _>(Method::GET, "/ad-plans", &query, None)
            .await?;
        let total = list
            .pagination
            .map_or(list.ad_plans.len() as u64, |p| p.total);
        Ok(Page {
            items: list.ad_plans,
            total,
        })
    }

    /// `POST /ad-plans`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn create_ad_plan(
        &self,
        input: &AdPlanInput,
        account: Option<AccountId>,
    ) -> Result<AdPlan, ApiError> {
        let body = Scoped {
            body: input,
            account_id: account,
        };
        let created: CreatedAdPlan = self
            .fetch(Method::POST, "/ad-plans", &[], Some(&body))
            .await?;
        Ok(created.ad_plan)
    }

    /// `PUT /ad-plans/:id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn update_ad_plan(
        &self,
        id: AdPlanId,
        input: &AdPlanInput,
        account: Option<AccountId>,
    ) -> Result<(), ApiError> {
        let body = Scoped {
            body: input,
            account_id: account,
        };
        self.execute(Method::PUT, &format!("/ad-plans/{id}"), &[], Some(&body))
            .await
    }

    /// `DELETE /ad-plans/:id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn delete_ad_plan(
        &self,
        id: AdPlanId,
        account: Option<AccountId>,
    ) -> Result<(), ApiError> {
        let query: Vec<_> = account_query(account).into_iter().collect();
        self.execute::<()>(Method::DELETE, &format!("/ad-plans/{id}"), &query, None)
            .await
    }
}
