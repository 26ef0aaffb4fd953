//! Plan-scoped overrides.
//!
//! Every override is identified by an [`OverrideKey`]: materials are enabled
//! per plan with no further scope, every other category is enabled per plan
//! *and* per base material. Textures, colours and patterns share the exact
//! same rule, so there is one key type for all of them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::OptionCategory;
use crate::ValidationError;

/// Identity of one cell in the plan × option × material matrix, within a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OverrideKey {
    /// A material option, enabled or disabled for the whole plan.
    Global(i64),
    /// A texture, colour or pattern under one base material.
    Scoped(i64, String),
}

impl OverrideKey {
    /// Builds the key an option occupies while `selected_material` is the
    /// active editing context.
    ///
    /// Materials ignore the context; scoped categories require one.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingMaterialScope`] for a scoped category
    /// without a selected material.
    pub fn for_option(
        option_id: i64,
        category: OptionCategory,
        selected_material: Option<&str>,
    ) -> Result<Self, ValidationError> {
        if !category.is_material_scoped() {
            return Ok(OverrideKey::Global(option_id));
        }
        match selected_material {
            Some(m) if !m.trim().is_empty() => Ok(OverrideKey::Scoped(option_id, m.to_string())),
            Some(_) => Err(ValidationError::EmptyMaterialScope),
            None => Err(ValidationError::MissingMaterialScope {
                option_id,
                category,
            }),
        }
    }

    /// Builds a key from an explicit `(option, scope)` pair, enforcing that
    /// only scoped categories carry a scope.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the scope does not match the category.
    pub fn checked(
        option_id: i64,
        category: OptionCategory,
        material_scope: Option<&str>,
    ) -> Result<Self, ValidationError> {
        match (category.is_material_scoped(), material_scope) {
            (false, None) => Ok(OverrideKey::Global(option_id)),
            (false, Some(_)) => Err(ValidationError::UnexpectedMaterialScope { option_id }),
            (true, scope) => Self::for_option(option_id, category, scope),
        }
    }

    /// Rebuilds a key from stored parts without validation.
    #[must_use]
    pub fn from_parts(option_id: i64, material_scope: Option<&str>) -> Self {
        match material_scope {
            Some(scope) => OverrideKey::Scoped(option_id, scope.to_string()),
            None => OverrideKey::Global(option_id),
        }
    }

    #[must_use]
    pub fn option_id(&self) -> i64 {
        match self {
            OverrideKey::Global(id) | OverrideKey::Scoped(id, _) => *id,
        }
    }

    #[must_use]
    pub fn material_scope(&self) -> Option<&str> {
        match self {
            OverrideKey::Global(_) => None,
            OverrideKey::Scoped(_, scope) => Some(scope),
        }
    }

    #[must_use]
    pub fn to_toggle(&self, enabled: bool) -> OverrideToggle {
        OverrideToggle {
            option_id: self.option_id(),
            material_scope: self.material_scope().map(str::to_owned),
            enabled,
        }
    }
}

/// A persisted override row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOverride {
    pub plan_id: i64,
    pub option_id: i64,
    pub material_scope: Option<String>,
    pub enabled: bool,
    /// Replaces the catalog price of a material for this plan.
    pub price_override: Option<Decimal>,
}

impl PlanOverride {
    #[must_use]
    pub fn key(&self) -> OverrideKey {
        OverrideKey::from_parts(self.option_id, self.material_scope.as_deref())
    }
}

/// One requested write in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideToggle {
    pub option_id: i64,
    #[serde(rename = "material_key", alias = "material_scope", default)]
    pub material_scope: Option<String>,
    pub enabled: bool,
}

impl OverrideToggle {
    #[must_use]
    pub fn key(&self) -> OverrideKey {
        OverrideKey::from_parts(self.option_id, self.material_scope.as_deref())
    }
}

/// A toggle the store could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedToggle {
    pub option_id: i64,
    pub material_key: Option<String>,
    pub reason: String,
}

impl FailedToggle {
    #[must_use]
    pub fn key(&self) -> OverrideKey {
        OverrideKey::from_parts(self.option_id, self.material_key.as_deref())
    }
}

/// Result of a batch upsert. Tuples are applied independently, so a batch can
/// partially succeed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub updated_count: usize,
    #[serde(default)]
    pub failed: Vec<FailedToggle>,
}

impl BatchOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Rejects an empty batch, which always indicates a caller bug.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyBatch`] when `toggles` is empty.
pub fn ensure_non_empty_batch(toggles: &[OverrideToggle]) -> Result<(), ValidationError> {
    if toggles.is_empty() {
        Err(ValidationError::EmptyBatch)
    } else {
        Ok(())
    }
}
