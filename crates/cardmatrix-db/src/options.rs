//! Database operations for the `card_options` table (Option Catalog).

use cardmatrix_core::{validate_price_update, CardOption, OptionCategory, OptionPatch};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `card_options` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CardOptionRow {
    pub id: i64,
    pub category: String,
    pub option_key: String,
    pub label: String,
    pub description: Option<String>,
    pub price_usd: Option<Decimal>,
    pub applicable_material_keys: Vec<String>,
    pub globally_enabled: bool,
    pub founders_only: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CardOptionRow> for CardOption {
    type Error = DbError;

    fn try_from(row: CardOptionRow) -> Result<Self, Self::Error> {
        let category = row
            .category
            .parse::<OptionCategory>()
            .map_err(|e| DbError::InvalidRow {
                table: "card_options",
                reason: e.to_string(),
            })?;

        Ok(CardOption {
            id: row.id,
            category,
            key: row.option_key,
            label: row.label,
            description: row.description,
            price: row.price_usd,
            applicable_material_keys: row.applicable_material_keys,
            globally_enabled: row.globally_enabled,
            founders_only: row.founders_only,
            display_order: row.display_order,
        })
    }
}

const COLUMNS: &str = "id, category, option_key, label, description, price_usd, \
                       applicable_material_keys, globally_enabled, founders_only, \
                       display_order, created_at, updated_at";

fn into_options(rows: Vec<CardOptionRow>) -> Result<Vec<CardOption>, DbError> {
    rows.into_iter().map(CardOption::try_from).collect()
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns every option, ordered by category, display order and key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_options(pool: &PgPool) -> Result<Vec<CardOption>, DbError> {
    let rows = sqlx::query_as::<_, CardOptionRow>(&format!(
        "SELECT {COLUMNS} FROM card_options \
         ORDER BY CASE category \
                      WHEN 'material' THEN 0 WHEN 'texture' THEN 1 \
                      WHEN 'colour' THEN 2 ELSE 3 END, \
                  display_order, option_key"
    ))
    .fetch_all(pool)
    .await?;

    into_options(rows)
}

/// Returns the options of one category, ordered by display order and key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_options_by_category(
    pool: &PgPool,
    category: OptionCategory,
) -> Result<Vec<CardOption>, DbError> {
    let rows = sqlx::query_as::<_, CardOptionRow>(&format!(
        "SELECT {COLUMNS} FROM card_options \
         WHERE category = $1 \
         ORDER BY display_order, option_key"
    ))
    .bind(category.as_str())
    .fetch_all(pool)
    .await?;

    into_options(rows)
}

/// Returns a single option by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no option has this id, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_option(pool: &PgPool, id: i64) -> Result<CardOption, DbError> {
    let row = sqlx::query_as::<_, CardOptionRow>(&format!(
        "SELECT {COLUMNS} FROM card_options WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound {
        entity: "option",
        id,
    })?;

    CardOption::try_from(row)
}

/// Applies a sparse patch to an option. Absent fields keep their value;
/// `description: null` clears the description.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id, [`DbError::Validation`]
/// for an empty patch or a price the option cannot carry, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_option(
    pool: &PgPool,
    id: i64,
    patch: &OptionPatch,
) -> Result<CardOption, DbError> {
    let current = get_option(pool, id).await?;
    patch.validate(current.category)?;

    let (set_description, description) = match &patch.description {
        Some(value) => (true, value.clone()),
        None => (false, None),
    };

    let row = sqlx::query_as::<_, CardOptionRow>(&format!(
        "UPDATE card_options SET \
             globally_enabled = COALESCE($2, globally_enabled), \
             price_usd = COALESCE($3, price_usd), \
             description = CASE WHEN $4 THEN $5 ELSE description END, \
             display_order = COALESCE($6, display_order), \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(patch.enabled)
    .bind(patch.price)
    .bind(set_description)
    .bind(description)
    .bind(patch.display_order)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound {
        entity: "option",
        id,
    })?;

    tracing::info!(option_id = id, "catalog option updated");
    CardOption::try_from(row)
}

/// Sets the catalog price of a material option.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for a negative price or a non-material
/// option, [`DbError::NotFound`] for an unknown id, or [`DbError::Sqlx`] if
/// the update fails.
pub async fn update_option_price(
    pool: &PgPool,
    id: i64,
    price: Decimal,
) -> Result<CardOption, DbError> {
    let current = get_option(pool, id).await?;
    validate_price_update(current.category, price)?;

    let row = sqlx::query_as::<_, CardOptionRow>(&format!(
        "UPDATE card_options SET price_usd = $2, updated_at = NOW() \
         WHERE id = $1 AND category = 'material' \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(price)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound {
        entity: "option",
        id,
    })?;

    tracing::info!(option_id = id, %price, "material price updated");
    CardOption::try_from(row)
}
