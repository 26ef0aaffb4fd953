use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{validate_price_update, OptionCategory};
use crate::plans::PlanType;
use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSeed {
    pub plan_type: PlanType,
    pub name: String,
    #[serde(default)]
    pub has_card_customization: bool,
    /// Materials switched on for a freshly seeded plan, together with every
    /// texture, colour and pattern that applies to them. Existing overrides
    /// are never touched.
    #[serde(default)]
    pub enable_materials: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSeed {
    pub category: OptionCategory,
    pub key: String,
    pub label: String,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[serde(default)]
    pub applicable_material_keys: Vec<String>,
    #[serde(default = "default_true")]
    pub globally_enabled: bool,
    #[serde(default)]
    pub founders_only: bool,
    #[serde(default)]
    pub display_order: i32,
}

impl OptionSeed {
    /// Empty applicability means every material.
    #[must_use]
    pub fn applies_to(&self, material_key: &str) -> bool {
        self.applicable_material_keys.is_empty()
            || self.applicable_material_keys.iter().any(|k| k == material_key)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub plans: Vec<PlanSeed>,
    pub options: Vec<OptionSeed>,
}

impl CatalogSeed {
    pub fn materials(&self) -> impl Iterator<Item = &OptionSeed> {
        self.options
            .iter()
            .filter(|o| o.category == OptionCategory::Material)
    }
}

/// Load and validate the catalog seed from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_catalog_seed(path: &Path) -> Result<CatalogSeed, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CatalogFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_catalog_seed(&content)
}

/// Parse and validate catalog seed YAML.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_catalog_seed(content: &str) -> Result<CatalogSeed, ConfigError> {
    let seed: CatalogSeed = serde_yaml::from_str(content)?;
    validate_catalog_seed(&seed)?;
    Ok(seed)
}

fn validate_catalog_seed(seed: &CatalogSeed) -> Result<(), ConfigError> {
    let mut seen_options = HashSet::new();
    for option in &seed.options {
        if option.key.trim().is_empty() || option.label.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} option key and label must be non-empty",
                option.category
            )));
        }

        if !seen_options.insert((option.category, option.key.as_str())) {
            return Err(ConfigError::Validation(format!(
                "duplicate {} option key: '{}'",
                option.category, option.key
            )));
        }

        if let Some(price) = option.price {
            validate_price_update(option.category, price).map_err(|e| {
                ConfigError::Validation(format!("option '{}': {e}", option.key))
            })?;
        }
    }

    let materials: HashSet<&str> = seed.materials().map(|m| m.key.as_str()).collect();

    for option in &seed.options {
        if option.category == OptionCategory::Material
            && !option.applicable_material_keys.is_empty()
        {
            return Err(ConfigError::Validation(format!(
                "material '{}' cannot list applicable materials",
                option.key
            )));
        }
        if let Some(unknown) = option
            .applicable_material_keys
            .iter()
            .find(|k| !materials.contains(k.as_str()))
        {
            return Err(ConfigError::Validation(format!(
                "{} '{}' references unknown material '{unknown}'",
                option.category, option.key
            )));
        }
    }

    let mut seen_plans = HashSet::new();
    for plan in &seed.plans {
        if !seen_plans.insert(plan.plan_type) {
            return Err(ConfigError::Validation(format!(
                "duplicate plan type: '{}'",
                plan.plan_type
            )));
        }
        if !plan.enable_materials.is_empty() && !plan.has_card_customization {
            return Err(ConfigError::Validation(format!(
                "plan '{}' enables materials but has no card customization",
                plan.plan_type
            )));
        }
        if let Some(unknown) = plan
            .enable_materials
            .iter()
            .find(|k| !materials.contains(k.as_str()))
        {
            return Err(ConfigError::Validation(format!(
                "plan '{}' enables unknown material '{unknown}'",
                plan.plan_type
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "catalog_seed_test.rs"]
mod tests;
