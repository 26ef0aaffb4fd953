use std::collections::HashMap;

use cardmatrix_core::{CatalogSeed, OptionCategory};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub plans: usize,
    pub options: usize,
    /// Override rows created for `enable_materials`; existing rows are kept.
    pub overrides_created: u64,
}

/// Upsert plans and options from the catalog seed, then create the default
/// overrides each plan lists.
///
/// All writes run inside a single transaction; if any operation fails
/// the entire seed is rolled back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_catalog(pool: &PgPool, seed: &CatalogSeed) -> Result<SeedSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    let mut option_ids: HashMap<(OptionCategory, &str), i64> = HashMap::new();
    for option in &seed.options {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO card_options (category, option_key, label, description, price_usd, \
                                       applicable_material_keys, globally_enabled, founders_only, display_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT ON CONSTRAINT card_options_category_key DO UPDATE SET \
                 label = EXCLUDED.label, \
                 description = EXCLUDED.description, \
                 price_usd = EXCLUDED.price_usd, \
                 applicable_material_keys = EXCLUDED.applicable_material_keys, \
                 globally_enabled = EXCLUDED.globally_enabled, \
                 founders_only = EXCLUDED.founders_only, \
                 display_order = EXCLUDED.display_order, \
                 updated_at = NOW() \
             RETURNING id",
        )
        .bind(option.category.as_str())
        .bind(&option.key)
        .bind(&option.label)
        .bind(&option.description)
        .bind(option.price)
        .bind(&option.applicable_material_keys)
        .bind(option.globally_enabled)
        .bind(option.founders_only)
        .bind(option.display_order)
        .fetch_one(&mut *tx)
        .await?;

        option_ids.insert((option.category, option.key.as_str()), id);
        summary.options += 1;
    }

    for plan in &seed.plans {
        let plan_id: i64 = sqlx::query_scalar(
            "INSERT INTO plans (plan_type, name, has_card_customization) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (plan_type) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 has_card_customization = EXCLUDED.has_card_customization, \
                 updated_at = NOW() \
             RETURNING id",
        )
        .bind(plan.plan_type.as_str())
        .bind(&plan.name)
        .bind(plan.has_card_customization)
        .fetch_one(&mut *tx)
        .await?;
        summary.plans += 1;

        for material in &plan.enable_materials {
            let mut cells: Vec<(i64, Option<&str>)> = Vec::new();
            if let Some(id) = option_ids.get(&(OptionCategory::Material, material.as_str())) {
                cells.push((*id, None));
            }
            for child in seed
                .options
                .iter()
                .filter(|o| o.category.is_material_scoped() && o.applies_to(material))
            {
                if let Some(id) = option_ids.get(&(child.category, child.key.as_str())) {
                    cells.push((*id, Some(material.as_str())));
                }
            }

            for (option_id, scope) in cells {
                let result = sqlx::query(
                    "INSERT INTO plan_option_overrides (plan_id, option_id, material_scope, enabled) \
                     VALUES ($1, $2, $3, true) \
                     ON CONFLICT ON CONSTRAINT plan_option_overrides_cell DO NOTHING",
                )
                .bind(plan_id)
                .bind(option_id)
                .bind(scope)
                .execute(&mut *tx)
                .await?;
                summary.overrides_created += result.rows_affected();
            }
        }
    }

    tx.commit().await?;
    tracing::info!(
        plans = summary.plans,
        options = summary.options,
        overrides_created = summary.overrides_created,
        "catalog seeded"
    );
    Ok(summary)
}
