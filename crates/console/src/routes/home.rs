//! Home overview.

use askama::Template;
use axum::{Router, extract::State, response::Response, routing::get};
use tracing::instrument;

use ad_console_core::{Account, AdCreative, AdPlan, Capability};

use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireSession;
use crate::state::AppState;

use super::{Chrome, render};

/// Rows shown per table on the home page.
const TOP_ROWS: usize = 5;

#[derive(Template)]
#[template(path = "pages/home.html")]
struct HomeTemplate {
    chrome: Chrome,
    account: Option<Account>,
    ad_plans: Vec<AdPlan>,
    ad_creatives: Vec<AdCreative>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(home))
}

/// Figures of the selected account and its leading plans and creatives.
///
/// GET /
#[instrument(skip_all)]
async fn home(guard: RequireSession, State(state): State<AppState>) -> Result<Response, AppError> {
    guard.require(Capability::ViewCampaigns)?;

    let account = guard.state.current_account_id();
    let result = guard.backend().home(account).await;
    let mut overview = guard.checked(result).await?;
    overview.ad_plans.truncate(TOP_ROWS);
    overview.ad_creatives.truncate(TOP_ROWS);

    let template = HomeTemplate {
        chrome: Chrome::new(&guard, &state, "/").await,
        account: overview
            .account
            .or_else(|| guard.state.current_account().cloned()),
        ad_plans: overview.ad_plans,
        ad_creatives: overview.ad_creatives,
    };
    Ok(render(&template))
}
