//! Ad group endpoints, including plan binding.

use reqwest::Method;
use serde::{Deserialize, Serialize};

use ad_console_core::{AccountId, AdGroup, AdGroupId, AdPlanId};

use super::{ApiError, Backend, Scoped, account_query};

#[derive(Deserialize)]
struct AdGroupList {
    #[serde(default)]
    ad_groups: Vec<AdGroup>,
}

#[derive(Deserialize)]
struct CreatedAdGroup {
    ad_group: AdGroup,
}

#[derive(Serialize)]
struct GroupName<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct PlanIds<'a> {
    #[serde(rename = "planIds")]
    plan_ids: &'a [AdPlanId],
}

impl Backend<'_> {
    /// `GET /ad-plans/ad-groups`. Groups are not paginated.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn list_ad_groups(&self, account: Option<AccountId>) -> Result<Vec<AdGroup>, ApiError> {
        let query: Vec<_> = account_query(account).into_iter().collect();
        let list: AdGroupList = self
            .fetch::<(), _>(Method::GET, "/ad-plans/ad-groups", &query, None)
            .await?;
        Ok(list.ad_groups)
    }

    /// `POST /ad-plans/ad-groups`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn create_ad_group(
        &self,
        name: &str,
        account: Option<AccountId>,
    ) -> Result<AdGroup, ApiError> {
        let body = Scoped {
            body: &GroupName { name },
            account_id: account,
        };
        let created: CreatedAdGroup = self
            .fetch(Method::POST, "/ad-plans/ad-groups", &[], Some(&body))
            .await?;
        Ok(created.ad_group)
    }

    /// `PUT /ad-plans/ad-groups/:id`: rename.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn rename_ad_group(
        &self,
        id: AdGroupId,
        name: &str,
        account: Option<AccountId>,
    ) -> Result<(), ApiError> {
        let body = Scoped {
            body: &GroupName { name },
            account_id: account,
        };
        self.execute(
            Method::PUT,
            &format!("/ad-plans/ad-groups/{id}"),
            &[],
            Some(&body),
        )
        .await
    }

    /// `DELETE /ad-plans/ad-groups/:id`.
    ///
    /// Callers must refuse groups that still have bound plans; see
    /// [`crate::listing::ensure_group_deletable`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn delete_ad_group(
        &self,
        id: AdGroupId,
        account: Option<AccountId>,
    ) -> Result<(), ApiError> {
        let query: Vec<_> = account_query(account).into_iter().collect();
        self.execute::<()>(
            Method::DELETE,
            &format!("/ad-plans/ad-groups/{id}"),
            &query,
            None,
        )
        .await
    }

    /// `POST /ad-plans/ad-groups/:id/plans`: bind plans to a group.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn bind_ad_plans(
        &self,
        id: AdGroupId,
        plan_ids: &[AdPlanId],
        account: Option<AccountId>,
    ) -> Result<(), ApiError> {
        let body = Scoped {
            body: &PlanIds { plan_ids },
            account_id: account,
        };
        self.execute(
            Method::POST,
            &format!("/ad-plans/ad-groups/{id}/plans"),
            &[],
            Some(&body),
        )
        .await
    }

    /// `DELETE /ad-plans/ad-groups/:id/plans/:plan_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn unbind_ad_plan(
        &self,
        id: AdGroupId,
        plan_id: AdPlanId,
        account: Option<AccountId>,
    ) -> Result<(), ApiError> {
        let query: Vec<_> = account_query(account).into_iter().collect();
        self.execute::<()>(
            Method::DELETE,
            &format!("/ad-plans/ad-groups/{id}/plans/{plan_id}"),
            &query,
            None,
        )
        .await
    }
}
