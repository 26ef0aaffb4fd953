use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use cardmatrix_core::{
    BatchOutcome, CardOption, GroupedOptions, MatrixSummary, OptionPatch, OverrideToggle, Plan,
    Resolution,
};
use cardmatrix_db::PlanOptionOverrideRow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{map_db_error, ApiError, ApiResponse, AppState};
use crate::middleware::RequestId;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct AdminMatrixQuery {
    plan_id: Option<i64>,
    material_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action")]
pub(super) enum AdminAction {
    #[serde(rename = "togglePlan")]
    TogglePlan {
        option_id: i64,
        plan_id: i64,
        #[serde(default)]
        material_key: Option<String>,
    },
    #[serde(rename = "batchToggle")]
    BatchToggle {
        plan_id: i64,
        toggles: Vec<OverrideToggle>,
    },
    #[serde(rename = "updatePrice")]
    UpdatePrice { option_id: i64, price: Decimal },
    #[serde(rename = "setPlanPrice")]
    SetPlanPrice {
        plan_id: i64,
        option_id: i64,
        #[serde(default)]
        price: Option<Decimal>,
    },
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct AdminMatrix {
    #[serde(flatten)]
    resolution: Resolution,
    grouped: GroupedOptions,
    summary: MatrixSummary,
    plans: Vec<Plan>,
}

#[derive(Debug, Serialize)]
pub(super) struct PlanOptionItem {
    id: i64,
    plan_id: i64,
    option_id: i64,
    material_key: Option<String>,
    enabled: bool,
    price_override: Option<Decimal>,
    updated_at: DateTime<Utc>,
}

impl From<PlanOptionOverrideRow> for PlanOptionItem {
    fn from(row: PlanOptionOverrideRow) -> Self {
        Self {
            id: row.id,
            plan_id: row.plan_id,
            option_id: row.option_id,
            material_key: row.material_scope,
            enabled: row.enabled,
            price_override: row.price_override_usd,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(super) enum AdminActionResult {
    PlanOption { plan_option: PlanOptionItem },
    Batch(BatchOutcome),
    Option { option: CardOption },
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn reject_body(request_id: String, rejection: &JsonRejection) -> ApiError {
    ApiError::new(request_id, "validation_error", rejection.body_text())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Scoped matrix for one plan and material, or the unscoped catalog when no
/// plan is given.
pub(super) async fn get_admin_matrix(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<AdminMatrixQuery>,
) -> Result<Json<ApiResponse<AdminMatrix>>, ApiError> {
    let material_key = non_blank(query.material_key);
    let store = state.store();

    let resolution = store
        .resolve_matrix(query.plan_id, material_key.as_deref())
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let plans = cardmatrix_db::list_customizable_plans(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = AdminMatrix {
        grouped: resolution.grouped(),
        summary: resolution.summary(),
        resolution,
        plans,
    };
    Ok(ApiResponse::new(data, req_id.0))
}

pub(super) async fn apply_admin_action(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<AdminAction>, JsonRejection>,
) -> Result<Json<ApiResponse<AdminActionResult>>, ApiError> {
    let Json(action) = payload.map_err(|e| reject_body(req_id.0.clone(), &e))?;
    let pool = &state.pool;

    let result = match action {
        AdminAction::TogglePlan {
            option_id,
            plan_id,
            material_key,
        } => {
            let material_key = non_blank(material_key);
            let row = cardmatrix_db::toggle_override(
                pool,
                plan_id,
                option_id,
                material_key.as_deref(),
            )
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            AdminActionResult::PlanOption {
                plan_option: row.into(),
            }
        }
        AdminAction::BatchToggle { plan_id, toggles } => {
            let outcome = cardmatrix_db::batch_upsert_overrides(pool, plan_id, &toggles)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            AdminActionResult::Batch(outcome)
        }
        AdminAction::UpdatePrice { option_id, price } => {
            let option = cardmatrix_db::update_option_price(pool, option_id, price)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            tracing::info!(option_id, %price, "catalog price updated");
            AdminActionResult::Option { option }
        }
        AdminAction::SetPlanPrice {
            plan_id,
            option_id,
            price,
        } => {
            let row = cardmatrix_db::set_price_override(pool, plan_id, option_id, price)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            AdminActionResult::PlanOption {
                plan_option: row.into(),
            }
        }
    };

    Ok(ApiResponse::new(result, req_id.0))
}

pub(super) async fn patch_card_option(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    payload: Result<Json<OptionPatch>, JsonRejection>,
) -> Result<Json<ApiResponse<AdminActionResult>>, ApiError> {
    let Json(patch) = payload.map_err(|e| reject_body(req_id.0.clone(), &e))?;

    let option = cardmatrix_db::update_option(&state.pool, id, &patch)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(
        AdminActionResult::Option { option },
        req_id.0,
    ))
}

pub(super) async fn list_admin_plans(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<Plan>>>, ApiError> {
    let plans = cardmatrix_db::list_customizable_plans(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(plans, req_id.0))
}
