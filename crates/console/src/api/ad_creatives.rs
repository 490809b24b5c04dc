//! Ad creative endpoints.

use reqwest::Method;
use serde::Deserialize;

use ad_console_core::{
    AccountId, AdCreative, AdCreativeId, AdCreativeInput, Page, PageRequest, Pagination,
};

use super::{ApiError, Backend, Scoped, account_query, list_query};

#[derive(Deserialize)]
struct AdCreativeList {
    #[serde(default)]
    ad_creatives: Vec<AdCreative>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Deserialize)]
struct OneAdCreative {
    ad_creative: AdCreative,
}

impl Backend<'_> {
    /// `GET /ad-creatives`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn list_ad_creatives(
        &self,
        page: &PageRequest,
        account: Option<AccountId>,
    ) -> Result<Page<AdCreative>, ApiError> {
        let query = list_query(page, account);
        let list: AdCreativeList = self
            .fetch::<(), _>(Method::GET, "/ad-creatives", &query, None)
            .await?;
        let total = list
            .pagination
            .map_or(list.ad_creatives.len() as u64, |p| p.total);
        Ok(Page {
            items: list.ad_creatives,
            total,
        })
    }

    /// `POST /ad-creatives`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn create_ad_creative(
        &self,
        input: &AdCreativeInput,
        account: Option<AccountId>,
    ) -> Result<AdCreative, ApiError> {
        let body = Scoped {
            body: input,
            account_id: account,
        };
        let created: OneAdCreative = self
            .fetch(Method::POST, "/ad-creatives", &[], Some(&body))
            .await?;
        Ok(created.ad_creative)
    }

    /// `PUT /ad-creatives/:id`. Returns the stored record when the backend
    /// echoes it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn update_ad_creative(
        &self,
        id: AdCreativeId,
        input: &AdCreativeInput,
        account: Option<AccountId>,
    ) -> Result<Option<AdCreative>, ApiError> {
        let body = Scoped {
            body: input,
            account_id: account,
        };
        let updated: Option<OneAdCreative> = self
            .send(
                Method::PUT,
                &format!("/ad-creatives/{id}"),
                &[],
                Some(&body),
            )
            .await?;
        Ok(updated.map(|u| u.ad_creative))
    }

    /// `DELETE /ad-creatives/:id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn delete_ad_creative(
        &self,
        id: AdCreativeId,
        account: Option<AccountId>,
    ) -> Result<(), ApiError> {
        let query: Vec<_> = account_query(account).into_iter().collect();
        self.execute::<()>(
            Method::DELETE,
            &format!("/ad-creatives/{id}"),
            &query,
            None,
        )
        .await
    }
}
