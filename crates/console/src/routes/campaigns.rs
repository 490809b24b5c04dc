//! Read-only campaign lists.
//!
//! These share their list state with the admin pages, so a record edited in
//! the admin console shows up here without a re-fetch.

use askama::Template;
use axum::{
    Router,
    extract::{Query, State},
    response::Response,
    routing::get,
};
use tracing::instrument;

use ad_console_core::{AdCreative, AdGroup, AdPlan, Capability, Page};

use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireSession;
use crate::state::AppState;

use super::{Chrome, ListParams, Pager, refresh_list, render};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ad-plans", get(ad_plans))
        .route("/ad-groups", get(ad_groups))
        .route("/ad-creatives", get(ad_creatives))
}

#[derive(Template)]
#[template(path = "pages/ad_plans.html")]
struct AdPlansTemplate {
    chrome: Chrome,
    plans: Vec<AdPlan>,
    pager: Pager,
    list_path: &'static str,
}

#[derive(Template)]
#[template(path = "pages/ad_groups.html")]
struct AdGroupsTemplate {
    chrome: Chrome,
    groups: Vec<AdGroup>,
    pager: Pager,
    list_path: &'static str,
}

#[derive(Template)]
#[template(path = "pages/ad_creatives.html")]
struct AdCreativesTemplate {
    chrome: Chrome,
    creatives: Vec<AdCreative>,
    pager: Pager,
    list_path: &'static str,
}

/// GET /ad-plans
#[instrument(skip_all)]
async fn ad_plans(
    guard: RequireSession,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    const PATH: &str = "/ad-plans";
    guard.require(Capability::ViewCampaigns)?;
    guard.console.with_workspace(|w| params.apply(&mut w.ad_plans));

    let backend = guard.backend();
    refresh_list(&guard, |w| &mut w.ad_plans, |query, account| async move {
        backend.list_ad_plans(&query, account).await
    })
    .await?;

    let (plans, pager) = guard
        .console
        .with_workspace(|w| (w.ad_plans.items().to_vec(), Pager::of(&w.ad_plans)));
    Ok(render(&AdPlansTemplate {
        chrome: Chrome::new(&guard, &state, PATH).await,
        plans,
        pager,
        list_path: PATH,
    }))
}

/// GET /ad-groups
#[instrument(skip_all)]
async fn ad_groups(
    guard: RequireSession,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    const PATH: &str = "/ad-groups";
    guard.require(Capability::ViewCampaigns)?;
    guard.console.with_workspace(|w| params.apply(&mut w.ad_groups));

    let backend = guard.backend();
    refresh_list(&guard, |w| &mut w.ad_groups, |query, account| async move {
        backend
            .list_ad_groups(account)
            .await
            .map(|groups| Page::from_all(groups, &query, |g| g.name.as_str()))
    })
    .await?;

    let (groups, pager) = guard
        .console
        .with_workspace(|w| (w.ad_groups.items().to_vec(), Pager::of(&w.ad_groups)));
    Ok(render(&AdGroupsTemplate {
        chrome: Chrome::new(&guard, &state, PATH).await,
        groups,
        pager,
        list_path: PATH,
    }))
}

/// GET /ad-creatives
#[instrument(skip_all)]
async fn ad_creatives(
    guard: RequireSession,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    const PATH: &str = "/ad-creatives";
    guard.require(Capability::ViewCampaigns)?;
    guard.console.with_workspace(|w| params.apply(&mut w.ad_creatives));

    let backend = guard.backend();
    refresh_list(&guard, |w| &mut w.ad_creatives, |query, account| async move {
        backend.list_ad_creatives(&query, account).await
    })
    .await?;

    let (creatives, pager) = guard.console.with_workspace(|w| {
        (w.ad_creatives.items().to_vec(), Pager::of(&w.ad_creatives))
    });
    Ok(render(&AdCreativesTemplate {
        chrome: Chrome::new(&guard, &state, PATH).await,
        creatives,
        pager,
        list_path: PATH,
    }))
}
