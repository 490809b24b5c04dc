//! Ad group management, including binding plans to groups.
//!
//! Bind and unbind change a group's nested plan list, so they re-fetch the
//! groups instead of patching the held page.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use ad_console_core::{
    AdGroup, AdGroupId, AdPlan, AdPlanId, Capability, Page, PageRequest, page::MAX_PAGE_SIZE,
    validation::required_text,
};

use crate::error::AppError;
use crate::filters;
use crate::listing::ensure_group_deletable;
use crate::middleware::RequireSession;
use crate::routes::{
    Chrome, ListParams, OpenForm, Pager, inline_error, refresh_list, render, set_flash,
};
use crate::state::AppState;

const PATH: &str = "/admin/ad-groups";

#[derive(Template)]
#[template(path = "admin/ad_groups.html")]
struct AdGroupsTemplate {
    chrome: Chrome,
    groups: Vec<AdGroup>,
    pager: Pager,
    list_path: &'static str,
    editor: Option<GroupEditor>,
    error: Option<String>,
    can_manage: bool,
}

/// Create, rename or bind form as rendered.
struct GroupEditor {
    title: String,
    action: String,
    name: String,
    binding: bool,
    candidates: Vec<AdPlan>,
}

enum Editor {
    Create(String),
    Rename(AdGroupId, String),
    Bind(AdGroup, Vec<AdPlan>),
}

impl Editor {
    fn view(self) -> GroupEditor {
        match self {
            Self::Create(name) => GroupEditor {
                title: "New ad group".to_string(),
                action: PATH.to_string(),
                name,
                binding: false,
                candidates: Vec::new(),
            },
            Self::Rename(id, name) => GroupEditor {
                title: "Rename ad group".to_string(),
                action: format!("{PATH}/{id}"),
                name,
                binding: false,
                candidates: Vec::new(),
            },
            Self::Bind(group, candidates) => GroupEditor {
                title: format!("Add ad plans to {}", group.name),
                action: format!("{PATH}/{}/plans", group.id),
                name: group.name,
                binding: true,
                candidates,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GroupForm {
    pub name: String,
}

impl GroupForm {
    fn validated_name(&self) -> Result<String, AppError> {
        required_text("name", &self.name, ad_console_core::campaign::MAX_NAME_LENGTH)?;
        Ok(self.name.trim().to_string())
    }
}

/// Plan ids from a bind form's checkboxes.
fn selected_plans(fields: &[(String, String)]) -> Vec<AdPlanId> {
    fields
        .iter()
        .filter(|(key, _)| key == "plan_id")
        .filter_map(|(_, value)| value.parse().ok())
        .collect()
}

/// GET /admin/ad-groups
#[instrument(skip_all)]
pub async fn index(
    guard: RequireSession,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.console.with_workspace(|w| params.apply(&mut w.ad_groups));
    refresh(&guard).await?;

    let can_manage = guard.state.capabilities().can_manage_campaigns();
    let editor = match params.open_form() {
        Some(OpenForm::New) if can_manage => Some(Editor::Create(String::new())),
        Some(OpenForm::Edit(id)) if can_manage => {
            let id = AdGroupId::new(id);
            guard
                .console
                .with_workspace(|w| w.ad_groups.get(id).map(|g| g.name.clone()))
                .map(|name| Editor::Rename(id, name))
        }
        Some(OpenForm::Bind(id)) if can_manage => {
            let group = guard
                .console
                .with_workspace(|w| w.ad_groups.get(AdGroupId::new(id)).cloned());
            match group {
                Some(group) => {
                    let candidates = bind_candidates(&guard, &group).await?;
                    Some(Editor::Bind(group, candidates))
                }
                None => None,
            }
        }
        _ => None,
    };
    render_page(&guard, &state, editor, None).await
}

/// POST /admin/ad-groups
#[instrument(skip_all)]
pub async fn create(
    guard: RequireSession,
    State(state): State<AppState>,
    Form(form): Form<GroupForm>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.require(Capability::ManageCampaigns)?;
    let account = guard.state.current_account_id();

    let result = match form.validated_name() {
        Ok(name) => {
            let result = guard.backend().create_ad_group(&name, account).await;
            guard.checked(result).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(group) => {
            tracing::info!(group_id = %group.id, "Ad group created");
            guard.console.with_workspace(|w| w.ad_groups.prepend(group));
            set_flash(&guard.session, "Ad group created").await;
            Ok(Redirect::to(PATH).into_response())
        }
        Err(e) => {
            let message = inline_error(e)?;
            render_page(&guard, &state, Some(Editor::Create(form.name)), Some(message)).await
        }
    }
}

/// POST /admin/ad-groups/{id}
#[instrument(skip_all, fields(group_id = %id))]
pub async fn rename(
    guard: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<AdGroupId>,
    Form(form): Form<GroupForm>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.require(Capability::ManageCampaigns)?;
    let account = guard.state.current_account_id();

    let result = match form.validated_name() {
        Ok(name) => {
            let result = guard.backend().rename_ad_group(id, &name, account).await;
            guard.checked(result).await.map(|()| name)
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(name) => {
            tracing::info!("Ad group renamed");
            let merged = guard
                .console
                .with_workspace(|w| w.ad_groups.merge(id, |group| group.name = name));
            if merged.is_err() {
                guard.console.with_workspace(|w| w.ad_groups.mark_stale());
            }
            set_flash(&guard.session, "Ad group renamed").await;
            Ok(Redirect::to(PATH).into_response())
        }
        Err(e) => {
            let message = inline_error(e)?;
            render_page(&guard, &state, Some(Editor::Rename(id, form.name)), Some(message)).await
        }
    }
}

/// Delete a group. A group that still has plans bound is refused here,
/// without asking the backend.
///
/// POST /admin/ad-groups/{id}/delete
#[instrument(skip_all, fields(group_id = %id))]
pub async fn delete(
    guard: RequireSession,
    Path(id): Path<AdGroupId>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.require(Capability::ManageCampaigns)?;
    refresh(&guard).await?;

    let group = guard
        .console
        .with_workspace(|w| w.ad_groups.get(id).cloned())
        .ok_or_else(|| AppError::NotFound("Ad group".to_string()))?;

    if let Err(e) = ensure_group_deletable(&group) {
        tracing::info!(error = %e, "Refusing to delete non-empty ad group");
        set_flash(&guard.session, e.to_string()).await;
        return Ok(Redirect::to(PATH).into_response());
    }

    let account = guard.state.current_account_id();
    let result = guard.backend().delete_ad_group(id, account).await;
    match guard.checked(result).await {
        Ok(()) => {
            tracing::info!("Ad group deleted");
            guard.console.with_workspace(|w| w.ad_groups.remove(id));
            set_flash(&guard.session, "Ad group deleted").await;
        }
        Err(e) => set_flash(&guard.session, inline_error(e)?).await,
    }
    Ok(Redirect::to(PATH).into_response())
}

/// POST /admin/ad-groups/{id}/plans
#[instrument(skip_all, fields(group_id = %id))]
pub async fn bind(
    guard: RequireSession,
    Path(id): Path<AdGroupId>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.require(Capability::ManageCampaigns)?;
    let retry = format!("{PATH}?form=bind-{id}");

    let plan_ids = selected_plans(&fields);
    if plan_ids.is_empty() {
        set_flash(&guard.session, "Select at least one ad plan").await;
        return Ok(Redirect::to(&retry).into_response());
    }

    let account = guard.state.current_account_id();
    let result = guard.backend().bind_ad_plans(id, &plan_ids, account).await;
    match guard.checked(result).await {
        Ok(()) => {
            tracing::info!(count = plan_ids.len(), "Ad plans bound");
            guard.console.with_workspace(|w| w.ad_groups.mark_stale());
            set_flash(&guard.session, "Ad plans added to group").await;
            Ok(Redirect::to(PATH).into_response())
        }
        Err(e) => {
            set_flash(&guard.session, inline_error(e)?).await;
            Ok(Redirect::to(&retry).into_response())
        }
    }
}

/// POST /admin/ad-groups/{id}/plans/{plan_id}/unbind
#[instrument(skip_all, fields(group_id = %id, plan_id = %plan_id))]
pub async fn unbind(
    guard: RequireSession,
    Path((id, plan_id)): Path<(AdGroupId, AdPlanId)>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.require(Capability::ManageCampaigns)?;
    let account = guard.state.current_account_id();

    let result = guard.backend().unbind_ad_plan(id, plan_id, account).await;
    match guard.checked(result).await {
        Ok(()) => {
            tracing::info!("Ad plan unbound");
            guard.console.with_workspace(|w| w.ad_groups.mark_stale());
            set_flash(&guard.session, "Ad plan removed from group").await;
        }
        Err(e) => set_flash(&guard.session, inline_error(e)?).await,
    }
    Ok(Redirect::to(PATH).into_response())
}

/// The selected account's plans not yet bound to `group`.
async fn bind_candidates(guard: &RequireSession, group: &AdGroup) -> Result<Vec<AdPlan>, AppError> {
    let account = guard.state.current_account_id();
    let result = guard
        .backend()
        .list_ad_plans(&PageRequest::first(MAX_PAGE_SIZE), account)
        .await;
    let page = guard.checked(result).await?;
    Ok(page
        .items
        .into_iter()
        .filter(|plan| group.ad_plans.iter().all(|bound| bound.id != plan.id))
        .collect())
}

async fn refresh(guard: &RequireSession) -> Result<(), AppError> {
    let backend = guard.backend();
    refresh_list(guard, |w| &mut w.ad_groups, |query, account| async move {
        backend
            .list_ad_groups(account)
            .await
            .map(|groups| Page::from_all(groups, &query, |g| g.name.as_str()))
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
    let (groups, pager) = guard
        .console
        .with_workspace(|w| (w.ad_groups.items().to_vec(), Pager::of(&w.ad_groups)));

    Ok(render(&AdGroupsTemplate {
        chrome: Chrome::new(guard, state, PATH).await,
        groups,
        pager,
        list_path: PATH,
        editor: editor.map(Editor::view),
        error,
        can_manage: guard.state.capabilities().can_manage_campaigns(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_plans_reads_repeated_fields() {
        let fields = vec![
            ("plan_id".to_string(), "3".to_string()),
            ("other".to_string(), "9".to_string()),
            ("plan_id".to_string(), "5".to_string()),
            ("plan_id".to_string(), "x".to_string()),
        ];
        assert_eq!(
            selected_plans(&fields),
            vec![AdPlanId::new(3), AdPlanId::new(5)]
        );
    }

    #[test]
    fn test_group_name_is_required() {
        let form = GroupForm {
            name: "   ".into(),
        };
        assert!(matches!(
            form.validated_name(),
            Err(AppError::BadRequest(_))
        ));

        let form = GroupForm {
            name: " Launch ".into(),
        };
        assert_eq!(form.validated_name().expect("name"), "Launch");
    }

    #[test]
    fn test_bind_editor_posts_to_group() {
        let group = AdGroup {
            id: AdGroupId::new(2),
            name: "Launch".into(),
            ad_plans: vec![],
        };
        let view = Editor::Bind(group, vec![]).view();
        assert!(view.binding);
        assert_eq!(view.action, "/admin/ad-groups/2/plans");
    }
}
