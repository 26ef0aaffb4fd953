//! Option Catalog: the canonical list of card customization options.
//!
//! Persistence lives in `cardmatrix-db`; this module owns the types and the
//! validation rules every catalog write must pass.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// The four kinds of customization a card can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionCategory {
    Material,
    Texture,
    Colour,
    Pattern,
}

impl OptionCategory {
    pub const ALL: [OptionCategory; 4] = [
        OptionCategory::Material,
        OptionCategory::Texture,
        OptionCategory::Colour,
        OptionCategory::Pattern,
    ];

    /// Returns the lowercase name used in the database and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OptionCategory::Material => "material",
            OptionCategory::Texture => "texture",
            OptionCategory::Colour => "colour",
            OptionCategory::Pattern => "pattern",
        }
    }

    /// Overrides for this category are keyed by a base material.
    ///
    /// Materials themselves are enabled per plan without a scope.
    #[must_use]
    pub fn is_material_scoped(self) -> bool {
        !matches!(self, OptionCategory::Material)
    }
}

impl std::fmt::Display for OptionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "material" => Ok(OptionCategory::Material),
            "texture" => Ok(OptionCategory::Texture),
            // Accept the US spelling from older clients.
            "colour" | "color" => Ok(OptionCategory::Colour),
            "pattern" => Ok(OptionCategory::Pattern),
            other => Err(ValidationError::UnknownCategory(other.to_string())),
        }
    }
}

/// A selectable catalog item with its global attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardOption {
    pub id: i64,
    pub category: OptionCategory,
    /// Unique within `category`, e.g. `"metal"` or `"rose-gold"`.
    pub key: String,
    pub label: String,
    pub description: Option<String>,
    /// USD price; only materials carry one.
    pub price: Option<Decimal>,
    /// Materials a texture or colour can be applied to. Empty means all.
    #[serde(default)]
    pub applicable_material_keys: Vec<String>,
    /// Soft-disable switch. Only gates the unscoped (no-plan) view.
    pub globally_enabled: bool,
    pub founders_only: bool,
    pub display_order: i32,
}

impl CardOption {
    /// Returns `true` if this option can be used on `material_key` according
    /// to the catalog alone (no plan context).
    #[must_use]
    pub fn applies_to(&self, material_key: &str) -> bool {
        self.applicable_material_keys.is_empty()
            || self
                .applicable_material_keys
                .iter()
                .any(|k| k == material_key)
    }
}

/// Sparse catalog edit. `None` leaves a field untouched.
// Option<Option<T>> on `description`: outer None = keep, Some(None) = clear.
#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OptionPatch {
    pub enabled: Option<bool>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    pub display_order: Option<i32>,
}

impl OptionPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.price.is_none()
            && self.description.is_none()
            && self.display_order.is_none()
    }

    /// Checks the patch against the category of the option it targets.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyPatch`] for a patch with no fields, or
    /// the price guard errors from [`validate_price_update`].
    pub fn validate(&self, category: OptionCategory) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPatch);
        }
        if let Some(price) = self.price {
            validate_price_update(category, price)?;
        }
        Ok(())
    }
}

/// Price edits are only legal on materials and never negative.
///
/// # Errors
///
/// Returns [`ValidationError::PriceOnNonMaterial`] or
/// [`ValidationError::NegativePrice`].
pub fn validate_price_update(
    category: OptionCategory,
    price: Decimal,
) -> Result<(), ValidationError> {
    if category != OptionCategory::Material {
        return Err(ValidationError::PriceOnNonMaterial(category));
    }
    if price < Decimal::ZERO {
        return Err(ValidationError::NegativePrice(price));
    }
    Ok(())
}

/// Distinguishes an explicit `null` from an absent field.
fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_str() {
        for category in OptionCategory::ALL {
            assert_eq!(category.as_str().parse::<OptionCategory>(), Ok(category));
        }
    }

    #[test]
    fn category_accepts_us_spelling() {
        assert_eq!("color".parse::<OptionCategory>(), Ok(OptionCategory::Colour));
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert_eq!(
            "finish".parse::<OptionCategory>(),
            Err(ValidationError::UnknownCategory("finish".to_string()))
        );
    }

    #[test]
    fn only_materials_are_unscoped() {
        assert!(!OptionCategory::Material.is_material_scoped());
        assert!(OptionCategory::Texture.is_material_scoped());
        assert!(OptionCategory::Colour.is_material_scoped());
        assert!(OptionCategory::Pattern.is_material_scoped());
    }

    #[test]
    fn price_update_rejects_every_non_material_category() {
        for category in [
            OptionCategory::Texture,
            OptionCategory::Colour,
            OptionCategory::Pattern,
        ] {
            assert_eq!(
                validate_price_update(category, Decimal::new(10, 0)),
                Err(ValidationError::PriceOnNonMaterial(category))
            );
        }
    }

    #[test]
    fn price_update_rejects_negative_material_price() {
        assert_eq!(
            validate_price_update(OptionCategory::Material, Decimal::new(-5, 0)),
            Err(ValidationError::NegativePrice(Decimal::new(-5, 0)))
        );
    }

    #[test]
    fn price_update_accepts_zero_and_positive() {
        assert!(validate_price_update(OptionCategory::Material, Decimal::ZERO).is_ok());
        assert!(validate_price_update(OptionCategory::Material, Decimal::new(10, 0)).is_ok());
    }

    #[test]
    fn empty_patch_is_rejected() {
        let patch = OptionPatch::default();
        assert_eq!(
            patch.validate(OptionCategory::Material),
            Err(ValidationError::EmptyPatch)
        );
    }

    #[test]
    fn patch_price_follows_price_guard() {
        let patch = OptionPatch {
            price: Some(Decimal::new(15, 0)),
            ..OptionPatch::default()
        };
        assert!(patch.validate(OptionCategory::Material).is_ok());
        assert_eq!(
            patch.validate(OptionCategory::Colour),
            Err(ValidationError::PriceOnNonMaterial(OptionCategory::Colour))
        );
    }

    #[test]
    fn patch_distinguishes_null_description_from_absent() {
        let cleared: OptionPatch =
            serde_json::from_str(r#"{"description": null}"#).expect("parse");
        assert_eq!(cleared.description, Some(None));

        let untouched: OptionPatch =
            serde_json::from_str(r#"{"display_order": 3}"#).expect("parse");
        assert_eq!(untouched.description, None);
        assert_eq!(untouched.display_order, Some(3));
    }

    #[test]
    fn applies_to_treats_empty_list_as_all_materials() {
        let mut option = CardOption {
            id: 1,
            category: OptionCategory::Texture,
            key: "brushed".to_string(),
            label: "Brushed".to_string(),
            description: None,
            price: None,
            applicable_material_keys: vec![],
            globally_enabled: true,
            founders_only: false,
            display_order: 0,
        };
        assert!(option.applies_to("wood"));

        option.applicable_material_keys = vec!["metal".to_string()];
        assert!(option.applies_to("metal"));
        assert!(!option.applies_to("wood"));
    }
}
