use axum::{
    extract::{Query, State},
    Extension, Json,
};
use cardmatrix_core::{resolve_for_plan_type, PlanType, PublicCatalog};
use serde::Deserialize;

use super::{ApiError, ApiResponse, AppState};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub(super) struct PublicCatalogQuery {
    plan_type: Option<String>,
}

/// Customer-facing catalog. Store failures degrade to the built-in fallback
/// rather than an error.
pub(super) async fn get_card_options(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<PublicCatalogQuery>,
) -> Result<Json<ApiResponse<PublicCatalog>>, ApiError> {
    let plan_type = match query
        .plan_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(raw) => Some(
            raw.parse::<PlanType>()
                .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?,
        ),
        None => None,
    };

    let catalog = resolve_for_plan_type(&state.store(), plan_type).await;
    Ok(ApiResponse::new(catalog, req_id.0))
}
