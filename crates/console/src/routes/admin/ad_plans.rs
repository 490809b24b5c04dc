//! Ad plan management.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use ad_console_core::{
    AdPlan, AdPlanId, AdPlanInput, Capability, InputError, PlanStatistics, PlanStatus,
    PriceStrategy, PromotionTarget,
};

use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireSession;
use crate::routes::{
    Chrome, ListParams, OpenForm, Pager, SelectOption, inline_error, refresh_list, render,
    set_flash,
};
use crate::state::AppState;

use super::form;

const PATH: &str = "/admin/ad-plans";

#[derive(Template)]
#[template(path = "admin/ad_plans.html")]
struct AdPlansTemplate {
    chrome: Chrome,
    plans: Vec<AdPlan>,
    pager: Pager,
    list_path: &'static str,
    editor: Option<PlanEditor>,
    error: Option<String>,
    can_manage: bool,
}

/// Create or edit form as rendered.
struct PlanEditor {
    title: &'static str,
    action: String,
    values: AdPlanForm,
    targets: Vec<SelectOption>,
    strategies: Vec<SelectOption>,
    statuses: Vec<SelectOption>,
    statistics: Vec<StatField>,
    statistics_editable: bool,
}

/// One statistic input.
pub struct StatField {
    pub name: &'static str,
    pub label: &'static str,
    pub value: String,
}

/// Which form is open.
enum Editor {
    Create(AdPlanForm),
    Update(AdPlanId, AdPlanForm),
}

/// The ad plan form as posted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdPlanForm {
    pub name: String,
    pub plan_type: String,
    pub target: String,
    pub price_strategy: String,
    pub placement_type: String,
    pub status: String,
    /// Checkbox; present when ticked.
    pub creative_optimization: Option<String>,
    pub budget: String,
    pub cost: String,
    pub display_count: String,
    pub click_count: String,
    pub download_count: String,
    pub click_per_price: String,
    pub click_rate: String,
    pub ecpm: String,
    pub download_per_count: String,
    pub download_rate: String,
}

impl Default for AdPlanForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            plan_type: String::new(),
            target: PromotionTarget::default().as_str().to_string(),
            price_strategy: PriceStrategy::default().as_str().to_string(),
            placement_type: String::new(),
            status: PlanStatus::default().code().to_string(),
            creative_optimization: None,
            budget: String::new(),
            cost: String::new(),
            display_count: String::new(),
            click_count: String::new(),
            download_count: String::new(),
            click_per_price: String::new(),
            click_rate: String::new(),
            ecpm: String::new(),
            download_per_count: String::new(),
            download_rate: String::new(),
        }
    }
}

impl From<&AdPlan> for AdPlanForm {
    fn from(plan: &AdPlan) -> Self {
        Self {
            name: plan.name.clone(),
            plan_type: plan.plan_type.clone(),
            target: plan.target.as_str().to_string(),
            price_strategy: plan.price_strategy.as_str().to_string(),
            placement_type: plan.placement_type.clone(),
            status: plan.status.code().to_string(),
            creative_optimization: plan.creative_optimization.then(|| "1".to_string()),
            budget: form::decimal_value(plan.budget),
            cost: form::decimal_value(plan.cost),
            display_count: plan.display_count.to_string(),
            click_count: plan.click_count.to_string(),
            download_count: plan.download_count.to_string(),
            click_per_price: form::decimal_value(plan.click_per_price),
            click_rate: plan.click_rate.to_string(),
            ecpm: form::decimal_value(plan.ecpm),
            download_per_count: form::decimal_value(plan.download_per_count),
            download_rate: plan.download_rate.to_string(),
        }
    }
}

impl AdPlanForm {
    /// Parse and validate. Statistic overrides are only read when
    /// `with_statistics` is set.
    fn to_input(&self, with_statistics: bool) -> Result<AdPlanInput, InputError> {
        let status = self
            .status
            .trim()
            .parse::<u8>()
            .map_err(|_| InputError::Invalid(format!("unknown plan status: {}", self.status)))?;

        let statistics = if with_statistics {
            PlanStatistics {
                cost: form::optional_decimal("cost", &self.cost)?,
                display_count: form::optional_count("impressions", &self.display_count)?,
                click_count: form::optional_count("clicks", &self.click_count)?,
                download_count: form::optional_count("downloads", &self.download_count)?,
                click_per_price: form::optional_decimal("cost per click", &self.click_per_price)?,
                click_rate: form::optional_rate("click rate", &self.click_rate)?,
                ecpm: form::optional_decimal("eCPM", &self.ecpm)?,
                download_per_count: form::optional_decimal(
                    "cost per download",
                    &self.download_per_count,
                )?,
                download_rate: form::optional_rate("download rate", &self.download_rate)?,
            }
        } else {
            PlanStatistics::default()
        };

        let input = AdPlanInput {
            name: self.name.trim().to_string(),
            plan_type: self.plan_type.trim().to_string(),
            target: self.target.parse()?,
            price_strategy: self.price_strategy.parse()?,
            placement_type: self.placement_type.trim().to_string(),
            status: PlanStatus::try_from(status)?,
            creative_optimization: self.creative_optimization.is_some(),
            budget: form::decimal("budget", &self.budget)?,
            statistics,
        };
        input.validate()?;
        Ok(input)
    }

    fn statistics(&self) -> Vec<StatField> {
        [
            ("cost", "Cost", &self.cost),
            ("display_count", "Impressions", &self.display_count),
            ("click_count", "Clicks", &self.click_count),
            ("download_count", "Downloads", &self.download_count),
            ("click_per_price", "Cost per click", &self.click_per_price),
            ("click_rate", "Click rate (%)", &self.click_rate),
            ("ecpm", "eCPM", &self.ecpm),
            ("download_per_count", "Cost per download", &self.download_per_count),
            ("download_rate", "Download rate (%)", &self.download_rate),
        ]
        .into_iter()
        .map(|(name, label, value)| StatField {
            name,
            label,
            value: value.clone(),
        })
        .collect()
    }
}

impl Editor {
    fn view(self, can_edit_statistics: bool) -> PlanEditor {
        let (title, action, values, show_statistics) = match self {
            Self::Create(values) => ("New ad plan", PATH.to_string(), values, can_edit_statistics),
            Self::Update(id, values) => ("Edit ad plan", format!("{PATH}/{id}"), values, true),
        };
        PlanEditor {
            title,
            action,
            targets: PromotionTarget::ALL
                .iter()
                .map(|t| SelectOption::new(t.as_str(), t.label(), &values.target))
                .collect(),
            strategies: PriceStrategy::ALL
                .iter()
                .map(|p| SelectOption::new(p.as_str(), p.label(), &values.price_strategy))
                .collect(),
            statuses: PlanStatus::ALL
                .iter()
                .map(|s| SelectOption::new(s.code().to_string(), s.label(), values.status.trim()))
                .collect(),
            statistics: if show_statistics {
                values.statistics()
            } else {
                Vec::new()
            },
            statistics_editable: can_edit_statistics,
            values,
        }
    }
}

/// GET /admin/ad-plans
#[instrument(skip_all)]
pub async fn index(
    guard: RequireSession,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.console.with_workspace(|w| params.apply(&mut w.ad_plans));
    refresh(&guard).await?;

    let can_manage = guard.state.capabilities().can_manage_campaigns();
    let editor = match params.open_form() {
        Some(OpenForm::New) if can_manage => Some(Editor::Create(AdPlanForm::default())),
        Some(OpenForm::Edit(id)) if can_manage => {
            let id = AdPlanId::new(id);
            guard
                .console
                .with_workspace(|w| w.ad_plans.get(id).map(AdPlanForm::from))
                .map(|values| Editor::Update(id, values))
        }
        _ => None,
    };
    render_page(&guard, &state, editor, None).await
}

/// POST /admin/ad-plans
#[instrument(skip_all)]
pub async fn create(
    guard: RequireSession,
    State(state): State<AppState>,
    Form(values): Form<AdPlanForm>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.require(Capability::ManageCampaigns)?;
    let with_statistics = guard.state.capabilities().can_edit_statistics();
    let account = guard.state.current_account_id();

    let result = match values.to_input(with_statistics) {
        Ok(input) => {
            let result = guard.backend().create_ad_plan(&input, account).await;
            guard.checked(result).await
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(plan) => {
            tracing::info!(plan_id = %plan.id, "Ad plan created");
            guard.console.with_workspace(|w| w.ad_plans.prepend(plan));
            set_flash(&guard.session, "Ad plan created").await;
            Ok(Redirect::to(PATH).into_response())
        }
        Err(e) => {
            let message = inline_error(e)?;
            render_page(&guard, &state, Some(Editor::Create(values)), Some(message)).await
        }
    }
}

/// POST /admin/ad-plans/{id}
#[instrument(skip_all, fields(plan_id = %id))]
pub async fn update(
    guard: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<AdPlanId>,
    Form(values): Form<AdPlanForm>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.require(Capability::ManageCampaigns)?;
    let with_statistics = guard.state.capabilities().can_edit_statistics();
    let account = guard.state.current_account_id();

    let result = match values.to_input(with_statistics) {
        Ok(input) => {
            let result = guard.backend().update_ad_plan(id, &input, account).await;
            guard.checked(result).await.map(|()| input)
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(input) => {
            tracing::info!("Ad plan updated");
            let merged = guard
                .console
                .with_workspace(|w| w.ad_plans.merge(id, |plan| plan.apply_input(&input)));
            if merged.is_err() {
                guard.console.with_workspace(|w| w.ad_plans.mark_stale());
            }
            set_flash(&guard.session, "Ad plan updated").await;
            Ok(Redirect::to(PATH).into_response())
        }
        Err(e) => {
            let message = inline_error(e)?;
            render_page(&guard, &state, Some(Editor::Update(id, values)), Some(message)).await
        }
    }
}

/// POST /admin/ad-plans/{id}/delete
#[instrument(skip_all, fields(plan_id = %id))]
pub async fn delete(
    guard: RequireSession,
    Path(id): Path<AdPlanId>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.require(Capability::ManageCampaigns)?;
    let account = guard.state.current_account_id();

    let result = guard.backend().delete_ad_plan(id, account).await;
    match guard.checked(result).await {
        Ok(()) => {
            tracing::info!("Ad plan deleted");
            guard.console.with_workspace(|w| w.ad_plans.remove(id));
            set_flash(&guard.session, "Ad plan deleted").await;
        }
        Err(e) => set_flash(&guard.session, inline_error(e)?).await,
    }
    Ok(Redirect::to(PATH).into_response())
}

async fn refresh(guard: &RequireSession) -> Result<(), AppError> {
    let backend = guard.backend();
    refresh_list(guard, |w| &mut w.ad_plans, |query, account| async move {
        backend.list_ad_plans(&query, account).await
    })
    .await
}

async fn render_page(
    guard: &RequireSession,
    state: &AppState,
    editor: Option<Editor>,
    error: Option<String>,
) -> Result<Response, AppError> {
    refresh(guard).await?;
    let capabilities = guard.state.capabilities();
    let (plans, pager) = guard
        .console
        .with_workspace(|w| (w.ad_plans.items().to_vec(), Pager::of(&w.ad_plans)));

    Ok(render(&AdPlansTemplate {
        chrome: Chrome::new(guard, state, PATH).await,
        plans,
        pager,
        list_path: PATH,
        editor: editor.map(|e| e.view(capabilities.can_edit_statistics())),
        error,
        can_manage: capabilities.can_manage_campaigns(),
    }))
}
