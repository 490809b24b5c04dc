//! Ad creative management.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use ad_console_core::{
    AdCreative, AdCreativeId, AdCreativeInput, Capability, CreativeStatistics, InputError,
};

use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireSession;
use crate::routes::{
    Chrome, ListParams, OpenForm, Pager, inline_error, refresh_list, render, set_flash,
};
use crate::state::AppState;

use super::ad_plans::StatField;
use super::form;

const PATH: &str = "/admin/ad-creatives";

#[derive(Template)]
#[template(path = "admin/ad_creatives.html")]
struct AdCreativesTemplate {
    chrome: Chrome,
    creatives: Vec<AdCreative>,
    pager: Pager,
    list_path: &'static str,
    editor: Option<CreativeEditor>,
    error: Option<String>,
    can_manage: bool,
}

struct CreativeEditor {
    title: &'static str,
    action: String,
    values: AdCreativeForm,
    statistics: Vec<StatField>,
    statistics_editable: bool,
}

enum Editor {
    Create(AdCreativeForm),
    Update(AdCreativeId, AdCreativeForm),
}

/// The ad creative form as posted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdCreativeForm {
    pub name: String,
    pub display_id: String,
    /// Checkbox; present when switched on.
    pub status: Option<String>,
    pub budget: String,
    pub download_cost: String,
    pub click_cost: String,
    pub costs: String,
    pub download_count: String,
    pub download_rate: String,
    pub ecpm: String,
    pub display_count: String,
    pub click_count: String,
    pub click_rate: String,
}

impl From<&AdCreative> for AdCreativeForm {
    fn from(creative: &AdCreative) -> Self {
        Self {
            name: creative.name.clone(),
            display_id: creative.display_id.clone().unwrap_or_default(),
            status: creative.status.then(|| "1".to_string()),
            budget: form::decimal_value(creative.budget),
            download_cost: form::decimal_value(creative.download_cost),
            click_cost: form::decimal_value(creative.click_cost),
            costs: form::decimal_value(creative.costs),
            download_count: creative.download_count.to_string(),
            download_rate: creative.download_rate.to_string(),
            ecpm: form::decimal_value(creative.ecpm),
            display_count: creative.display_count.to_string(),
            click_count: creative.click_count.to_string(),
            click_rate: creative.click_rate.to_string(),
        }
    }
}

impl AdCreativeForm {
    fn to_input(&self, with_statistics: bool) -> Result<AdCreativeInput, InputError> {
        let statistics = if with_statistics {
            CreativeStatistics {
                download_cost: form::optional_decimal("cost per download", &self.download_cost)?,
                click_cost: form::optional_decimal("cost per click", &self.click_cost)?,
                costs: form::optional_decimal("total cost", &self.costs)?,
                download_count: form::optional_count("downloads", &self.download_count)?,
                download_rate: form::optional_rate("download rate", &self.download_rate)?,
                ecpm: form::optional_decimal("eCPM", &self.ecpm)?,
                display_count: form::optional_count("impressions", &self.display_count)?,
                click_count: form::optional_count("clicks", &self.click_count)?,
                click_rate: form::optional_rate("click rate", &self.click_rate)?,
            }
        } else {
            CreativeStatistics::default()
        };

        let input = AdCreativeInput {
            name: self.name.trim().to_string(),
            display_id: form::optional_text(&self.display_id),
            status: self.status.is_some(),
            budget: form::decimal("budget", &self.budget)?,
            statistics,
        };
        input.validate()?;
        Ok(input)
    }

    fn statistics(&self) -> Vec<StatField> {
        [
            ("download_cost", "Cost per download", &self.download_cost),
            ("click_cost", "Cost per click", &self.click_cost),
            ("costs", "Total cost", &self.costs),
            ("download_count", "Downloads", &self.download_count),
            ("download_rate", "Download rate (%)", &self.download_rate),
            ("ecpm", "eCPM", &self.ecpm),
            ("display_count", "Impressions", &self.display_count),
            ("click_count", "Clicks", &self.click_count),
            ("click_rate", "Click rate (%)", &self.click_rate),
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
    fn view(self, can_edit_statistics: bool) -> CreativeEditor {
        let (title, action, values, show_statistics) = match self {
            Self::Create(values) => (
                "New ad creative",
                PATH.to_string(),
                values,
                can_edit_statistics,
            ),
            Self::Update(id, values) => ("Edit ad creative", format!("{PATH}/{id}"), values, true),
        };
        CreativeEditor {
            title,
            action,
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

/// GET /admin/ad-creatives
#[instrument(skip_all)]
pub async fn index(
    guard: RequireSession,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.console.with_workspace(|w| params.apply(&mut w.ad_creatives));
    refresh(&guard).await?;

    let can_manage = guard.state.capabilities().can_manage_campaigns();
    let editor = match params.open_form() {
        Some(OpenForm::New) if can_manage => Some(Editor::Create(AdCreativeForm {
            status: Some("1".to_string()),
            ..AdCreativeForm::default()
        })),
        Some(OpenForm::Edit(id)) if can_manage => {
            let id = AdCreativeId::new(id);
            guard
                .console
                .with_workspace(|w| w.ad_creatives.get(id).map(AdCreativeForm::from))
                .map(|values| Editor::Update(id, values))
        }
        _ => None,
    };
    render_page(&guard, &state, editor, None).await
}

/// POST /admin/ad-creatives
#[instrument(skip_all)]
pub async fn create(
    guard: RequireSession,
    State(state): State<AppState>,
    Form(values): Form<AdCreativeForm>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.require(Capability::ManageCampaigns)?;
    let with_statistics = guard.state.capabilities().can_edit_statistics();
    let account = guard.state.current_account_id();

    let result = match values.to_input(with_statistics) {
        Ok(input) => {
            let result = guard.backend().create_ad_creative(&input, account).await;
            guard.checked(result).await
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(creative) => {
            tracing::info!(creative_id = %creative.id, "Ad creative created");
            guard.console.with_workspace(|w| w.ad_creatives.prepend(creative));
            set_flash(&guard.session, "Ad creative created").await;
            Ok(Redirect::to(PATH).into_response())
        }
        Err(e) => {
            let message = inline_error(e)?;
            render_page(&guard, &state, Some(Editor::Create(values)), Some(message)).await
        }
    }
}

/// POST /admin/ad-creatives/{id}
#[instrument(skip_all, fields(creative_id = %id))]
pub async fn update(
    guard: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<AdCreativeId>,
    Form(values): Form<AdCreativeForm>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.require(Capability::ManageCampaigns)?;
    let with_statistics = guard.state.capabilities().can_edit_statistics();
    let account = guard.state.current_account_id();

    let result = match values.to_input(with_statistics) {
        Ok(input) => {
            let result = guard.backend().update_ad_creative(id, &input, account).await;
            guard.checked(result).await.map(|stored| (input, stored))
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok((input, stored)) => {
            tracing::info!("Ad creative updated");
            let reconciled = guard.console.with_workspace(|w| match stored {
                Some(creative) => w.ad_creatives.replace(creative),
                None => w
                    .ad_creatives
                    .merge(id, |creative| creative.apply_input(&input))
                    .is_ok(),
            });
            if !reconciled {
                guard.console.with_workspace(|w| w.ad_creatives.mark_stale());
            }
            set_flash(&guard.session, "Ad creative updated").await;
            Ok(Redirect::to(PATH).into_response())
        }
        Err(e) => {
            let message = inline_error(e)?;
            render_page(&guard, &state, Some(Editor::Update(id, values)), Some(message)).await
        }
    }
}

/// POST /admin/ad-creatives/{id}/delete
#[instrument(skip_all, fields(creative_id = %id))]
pub async fn delete(
    guard: RequireSession,
    Path(id): Path<AdCreativeId>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.require(Capability::ManageCampaigns)?;
    let account = guard.state.current_account_id();

    let result = guard.backend().delete_ad_creative(id, account).await;
    match guard.checked(result).await {
        Ok(()) => {
            tracing::info!("Ad creative deleted");
            guard.console.with_workspace(|w| w.ad_creatives.remove(id));
            set_flash(&guard.session, "Ad creative deleted").await;
        }
        Err(e) => set_flash(&guard.session, inline_error(e)?).await,
    }
    Ok(Redirect::to(PATH).into_response())
}

async fn refresh(guard: &RequireSession) -> Result<(), AppError> {
    let backend = guard.backend();
    refresh_list(guard, |w| &mut w.ad_creatives, |query, account| async move {
        backend.list_ad_creatives(&query, account).await
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
    let (creatives, pager) = guard.console.with_workspace(|w| {
        (w.ad_creatives.items().to_vec(), Pager::of(&w.ad_creatives))
    });

    Ok(render(&AdCreativesTemplate {
        chrome: Chrome::new(guard, state, PATH).await,
        creatives,
        pager,
        list_path: PATH,
        editor: editor.map(|e| e.view(capabilities.can_edit_statistics())),
        error,
        can_manage: capabilities.can_manage_campaigns(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_form_to_input() {
        let values = AdCreativeForm {
            name: "Banner".into(),
            display_id: "  ".into(),
            status: Some("1".into()),
            budget: "0".into(),
            click_count: "10".into(),
            ..AdCreativeForm::default()
        };
        let input = values.to_input(true).expect("input");
        assert_eq!(input.display_id, None);
        assert!(input.status);
        assert_eq!(input.budget, Decimal::ZERO);
        assert_eq!(input.statistics.click_count, Some(10));

        let input = values.to_input(false).expect("input");
        assert_eq!(input.statistics, CreativeStatistics::default());
    }

    #[test]
    fn test_unticked_status_is_off() {
        let values = AdCreativeForm {
            name: "Banner".into(),
            budget: "10".into(),
            ..AdCreativeForm::default()
        };
        assert!(!values.to_input(false).expect("input").status);
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let values = AdCreativeForm {
            budget: "10".into(),
            ..AdCreativeForm::default()
        };
        assert_eq!(
            values.to_input(false),
            Err(InputError::Required { field: "name" })
        );
    }
}
