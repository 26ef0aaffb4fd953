//! Override Store: database operations for `plan_option_overrides`.
//!
//! Every write to the table goes through this module. Each write checks that
//! the plan exists and offers card customization, that the option exists,
//! and that the material scope fits the option's category and applicability
//! list.

use std::collections::{HashMap, HashSet};

use cardmatrix_core::{
    ensure_non_empty_batch, validate_price_update, BatchOutcome, CardOption, FailedToggle,
    OptionCategory, OverrideKey, OverrideToggle, PlanOverride, ValidationError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::options::{get_option, list_options};
use crate::plans::get_plan;
use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `plan_option_overrides` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlanOptionOverrideRow {
    pub id: i64,
    pub plan_id: i64,
    pub option_id: i64,
    pub material_scope: Option<String>,
    pub enabled: bool,
    pub price_override_usd: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PlanOptionOverrideRow> for PlanOverride {
    fn from(row: PlanOptionOverrideRow) -> Self {
        PlanOverride {
            plan_id: row.plan_id,
            option_id: row.option_id,
            material_scope: row.material_scope,
            enabled: row.enabled,
            price_override: row.price_override_usd,
        }
    }
}

const COLUMNS: &str = "id, plan_id, option_id, material_scope, enabled, price_override_usd, \
                       created_at, updated_at";

// ---------------------------------------------------------------------------
// Write-target checks
// ---------------------------------------------------------------------------

async fn ensure_customizable_plan(pool: &PgPool, plan_id: i64) -> Result<(), DbError> {
    let plan = get_plan(pool, plan_id).await?;
    if !plan.has_card_customization {
        return Err(ValidationError::PlanNotCustomizable(plan_id).into());
    }
    Ok(())
}

fn key_for(
    option: &CardOption,
    material_scope: Option<&str>,
    materials: &HashSet<&str>,
) -> Result<OverrideKey, ValidationError> {
    let key = OverrideKey::checked(option.id, option.category, material_scope)?;
    if let Some(scope) = key.material_scope() {
        if !materials.contains(scope) {
            return Err(ValidationError::UnknownMaterial(scope.to_string()));
        }
        if !option.applies_to(scope) {
            return Err(ValidationError::ScopeNotApplicable {
                option_id: option.id,
                material: scope.to_string(),
            });
        }
    }
    Ok(key)
}

async fn write_target(
    pool: &PgPool,
    plan_id: i64,
    option_id: i64,
    material_scope: Option<&str>,
) -> Result<OverrideKey, DbError> {
    ensure_customizable_plan(pool, plan_id).await?;
    let option = get_option(pool, option_id).await?;

    let materials: Vec<String> = sqlx::query_scalar(
        "SELECT option_key FROM card_options WHERE category = 'material'",
    )
    .fetch_all(pool)
    .await?;
    let materials: HashSet<&str> = materials.iter().map(String::as_str).collect();

    Ok(key_for(&option, material_scope, &materials)?)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

async fn upsert_key(
    pool: &PgPool,
    plan_id: i64,
    key: &OverrideKey,
    enabled: bool,
) -> Result<PlanOptionOverrideRow, sqlx::Error> {
    sqlx::query_as::<_, PlanOptionOverrideRow>(&format!(
        "INSERT INTO plan_option_overrides (plan_id, option_id, material_scope, enabled) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT ON CONSTRAINT plan_option_overrides_cell DO UPDATE SET \
             enabled = EXCLUDED.enabled, \
             updated_at = NOW() \
         RETURNING {COLUMNS}"
    ))
    .bind(plan_id)
    .bind(key.option_id())
    .bind(key.material_scope())
    .bind(enabled)
    .fetch_one(pool)
    .await
}

/// Sets one cell of the matrix. Creates the row on first write and updates
/// it afterwards; repeating the call is a no-op.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown plan or option,
/// [`DbError::Validation`] when the plan has no card customization or the
/// scope does not fit the option, or [`DbError::Sqlx`] if the write fails.
pub async fn upsert_override(
    pool: &PgPool,
    plan_id: i64,
    option_id: i64,
    material_scope: Option<&str>,
    enabled: bool,
) -> Result<PlanOptionOverrideRow, DbError> {
    let key = write_target(pool, plan_id, option_id, material_scope).await?;
    let row = upsert_key(pool, plan_id, &key, enabled).await?;

    tracing::debug!(plan_id, option_id, material_scope, enabled, "override upserted");
    Ok(row)
}

/// Flips one cell of the matrix in a single statement. A cell with no row
/// becomes enabled.
///
/// # Errors
///
/// Same as [`upsert_override`].
pub async fn toggle_override(
    pool: &PgPool,
    plan_id: i64,
    option_id: i64,
    material_scope: Option<&str>,
) -> Result<PlanOptionOverrideRow, DbError> {
    let key = write_target(pool, plan_id, option_id, material_scope).await?;

    let row = sqlx::query_as::<_, PlanOptionOverrideRow>(&format!(
        "INSERT INTO plan_option_overrides (plan_id, option_id, material_scope, enabled) \
         VALUES ($1, $2, $3, true) \
         ON CONFLICT ON CONSTRAINT plan_option_overrides_cell DO UPDATE SET \
             enabled = NOT plan_option_overrides.enabled, \
             updated_at = NOW() \
         RETURNING {COLUMNS}"
    ))
    .bind(plan_id)
    .bind(key.option_id())
    .bind(key.material_scope())
    .fetch_one(pool)
    .await?;

    tracing::debug!(
        plan_id,
        option_id,
        material_scope,
        enabled = row.enabled,
        "override toggled"
    );
    Ok(row)
}

/// Sets or clears the plan-specific price of a material. Creates a disabled
/// row when the material has none, so pricing never enables it.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for a negative price or a non-material
/// option, plus the errors of [`upsert_override`].
pub async fn set_price_override(
    pool: &PgPool,
    plan_id: i64,
    option_id: i64,
    price: Option<Decimal>,
) -> Result<PlanOptionOverrideRow, DbError> {
    let option = get_option(pool, option_id).await?;
    if option.category != OptionCategory::Material {
        return Err(ValidationError::PriceOnNonMaterial(option.category).into());
    }
    if let Some(price) = price {
        validate_price_update(option.category, price)?;
    }
    let key = write_target(pool, plan_id, option_id, None).await?;

    let row = sqlx::query_as::<_, PlanOptionOverrideRow>(&format!(
        "INSERT INTO plan_option_overrides (plan_id, option_id, material_scope, enabled, price_override_usd) \
         VALUES ($1, $2, NULL, false, $3) \
         ON CONFLICT ON CONSTRAINT plan_option_overrides_cell DO UPDATE SET \
             price_override_usd = EXCLUDED.price_override_usd, \
             updated_at = NOW() \
         RETURNING {COLUMNS}"
    ))
    .bind(plan_id)
    .bind(key.option_id())
    .bind(price)
    .fetch_one(pool)
    .await?;

    tracing::info!(plan_id, option_id, price = ?price, "plan price override set");
    Ok(row)
}

/// Applies a batch of toggles for one plan.
///
/// Tuples are written independently: a tuple that names an unknown option
/// or a bad scope, or whose write fails, is reported in
/// [`BatchOutcome::failed`] and the rest still go through.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for an empty batch or a plan without card
/// customization, [`DbError::NotFound`] for an unknown plan, and
/// [`DbError::Sqlx`] when the store cannot be reached at all.
pub async fn batch_upsert_overrides(
    pool: &PgPool,
    plan_id: i64,
    toggles: &[OverrideToggle],
) -> Result<BatchOutcome, DbError> {
    ensure_non_empty_batch(toggles)?;
    ensure_customizable_plan(pool, plan_id).await?;

    let options = list_options(pool).await?;
    let by_id: HashMap<i64, &CardOption> = options.iter().map(|o| (o.id, o)).collect();
    let materials: HashSet<&str> = options
        .iter()
        .filter(|o| o.category == OptionCategory::Material)
        .map(|o| o.key.as_str())
        .collect();

    let mut outcome = BatchOutcome::default();
    for toggle in toggles {
        let fail = |reason: String| FailedToggle {
            option_id: toggle.option_id,
            material_key: toggle.material_scope.clone(),
            reason,
        };

        let Some(option) = by_id.get(&toggle.option_id) else {
            outcome
                .failed
                .push(fail(format!("option {} not found", toggle.option_id)));
            continue;
        };
        let key = match key_for(option, toggle.material_scope.as_deref(), &materials) {
            Ok(key) => key,
            Err(e) => {
                outcome.failed.push(fail(e.to_string()));
                continue;
            }
        };

        match upsert_key(pool, plan_id, &key, toggle.enabled).await {
            Ok(_) => outcome.updated_count += 1,
            Err(e) => {
                let error = DbError::from(e);
                if error.is_unavailable() {
                    return Err(error);
                }
                tracing::warn!(
                    plan_id,
                    option_id = toggle.option_id,
                    material_scope = toggle.material_scope.as_deref(),
                    error = %error,
                    "override write failed"
                );
                outcome.failed.push(fail(error.to_string()));
            }
        }
    }

    tracing::info!(
        plan_id,
        requested = toggles.len(),
        updated = outcome.updated_count,
        failed = outcome.failed.len(),
        "override batch applied"
    );
    Ok(outcome)
}

/// Returns every override row of a plan.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_overrides_for_plan(
    pool: &PgPool,
    plan_id: i64,
) -> Result<Vec<PlanOverride>, DbError> {
    let rows = sqlx::query_as::<_, PlanOptionOverrideRow>(&format!(
        "SELECT {COLUMNS} FROM plan_option_overrides \
         WHERE plan_id = $1 \
         ORDER BY option_id, material_scope NULLS FIRST"
    ))
    .bind(plan_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(PlanOverride::from).collect())
}
