//! [`PgMatrixStore`]: the Postgres-backed implementation of the core store
//! traits.

use cardmatrix_core::{
    resolve_for_plan, resolve_unscoped, BatchOutcome, CardOption, CatalogSource, MatrixBackend,
    OptionCategory, OverrideToggle, Plan, PlanOverride, PlanType, Resolution, ValidationError,
};
use sqlx::PgPool;

use crate::{options, overrides, plans, DbError};

#[derive(Debug, Clone)]
pub struct PgMatrixStore {
    pool: PgPool,
}

impl PgMatrixStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Resolves the catalog for one plan, or the unscoped catalog when
    /// `plan_id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown plan,
    /// [`DbError::Validation`] for a material key that is not in the catalog,
    /// or [`DbError::Sqlx`] if a query fails.
    pub async fn resolve_matrix(
        &self,
        plan_id: Option<i64>,
        material_key: Option<&str>,
    ) -> Result<Resolution, DbError> {
        let options = options::list_options(&self.pool).await?;

        if let Some(material) = material_key {
            let known = options
                .iter()
                .any(|o| o.category == OptionCategory::Material && o.key == material);
            if !known {
                return Err(ValidationError::UnknownMaterial(material.to_string()).into());
            }
        }

        let Some(plan_id) = plan_id else {
            return Ok(resolve_unscoped(&options));
        };
        let plan = plans::get_plan(&self.pool, plan_id).await?;
        let overrides = overrides::list_overrides_for_plan(&self.pool, plan.id).await?;

        Ok(resolve_for_plan(&options, &overrides, plan.id, material_key))
    }
}

impl CatalogSource for PgMatrixStore {
    type Error = DbError;

    async fn list_options(&self) -> Result<Vec<CardOption>, DbError> {
        options::list_options(&self.pool).await
    }

    async fn find_plan_by_type(&self, plan_type: PlanType) -> Result<Option<Plan>, DbError> {
        plans::find_plan_by_type(&self.pool, plan_type).await
    }

    async fn list_overrides(&self, plan_id: i64) -> Result<Vec<PlanOverride>, DbError> {
        overrides::list_overrides_for_plan(&self.pool, plan_id).await
    }
}

impl MatrixBackend for PgMatrixStore {
    type Error = DbError;

    async fn resolve(
        &self,
        plan_id: i64,
        material_key: Option<&str>,
    ) -> Result<Resolution, DbError> {
        self.resolve_matrix(Some(plan_id), material_key).await
    }

    async fn batch_upsert(
        &self,
        plan_id: i64,
        toggles: &[OverrideToggle],
    ) -> Result<BatchOutcome, DbError> {
        overrides::batch_upsert_overrides(&self.pool, plan_id, toggles).await
    }
}
