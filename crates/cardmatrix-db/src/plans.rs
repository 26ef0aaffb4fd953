//! Database operations for the `plans` table.

use cardmatrix_core::{Plan, PlanType};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `plans` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlanRow {
    pub id: i64,
    pub plan_type: String,
    pub name: String,
    pub has_card_customization: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PlanRow> for Plan {
    type Error = DbError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let plan_type = row
            .plan_type
            .parse::<PlanType>()
            .map_err(|e| DbError::InvalidRow {
                table: "plans",
                reason: e.to_string(),
            })?;

        Ok(Plan {
            id: row.id,
            plan_type,
            name: row.name,
            has_card_customization: row.has_card_customization,
        })
    }
}

const COLUMNS: &str = "id, plan_type, name, has_card_customization, created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns every plan, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_plans(pool: &PgPool) -> Result<Vec<Plan>, DbError> {
    let rows = sqlx::query_as::<_, PlanRow>(&format!("SELECT {COLUMNS} FROM plans ORDER BY id"))
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(Plan::try_from).collect()
}

/// Returns the plans that take part in the option matrix.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_customizable_plans(pool: &PgPool) -> Result<Vec<Plan>, DbError> {
    let rows = sqlx::query_as::<_, PlanRow>(&format!(
        "SELECT {COLUMNS} FROM plans \
         WHERE has_card_customization = true \
         ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Plan::try_from).collect()
}

/// Returns a single plan by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no plan has this id, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_plan(pool: &PgPool, id: i64) -> Result<Plan, DbError> {
    let row = sqlx::query_as::<_, PlanRow>(&format!("SELECT {COLUMNS} FROM plans WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound { entity: "plan", id })?;

    Plan::try_from(row)
}

/// Returns the plan of a given type, or `None` if that tier is not set up.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_plan_by_type(
    pool: &PgPool,
    plan_type: PlanType,
) -> Result<Option<Plan>, DbError> {
    let row = sqlx::query_as::<_, PlanRow>(&format!(
        "SELECT {COLUMNS} FROM plans WHERE plan_type = $1"
    ))
    .bind(plan_type.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(Plan::try_from).transpose()
}
