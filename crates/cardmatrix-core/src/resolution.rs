//! Resolution Engine: combines the catalog with a plan's overrides.
//!
//! Plans are opt-in. A cell with no override row resolves to disabled,
//! whatever the option's `globally_enabled` flag says; that flag only drives
//! the unscoped (no-plan) view and whether an enabled material is priced.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{CardOption, OptionCategory};
use crate::overrides::{OverrideKey, PlanOverride};

/// A catalog option annotated with its state for one plan (and material).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOption {
    #[serde(flatten)]
    pub option: CardOption,
    pub plan_enabled: bool,
    /// An override row exists for this cell, whether enabled or not.
    #[serde(default)]
    pub configured: bool,
    /// Material price after any plan price override.
    #[serde(default)]
    pub effective_price: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedOptions {
    pub materials: Vec<ResolvedOption>,
    pub textures: Vec<ResolvedOption>,
    pub colours: Vec<ResolvedOption>,
    pub patterns: Vec<ResolvedOption>,
}

impl GroupedOptions {
    #[must_use]
    pub fn from_options(options: &[ResolvedOption]) -> Self {
        let mut grouped = Self::default();
        for resolved in options {
            let bucket = match resolved.option.category {
                OptionCategory::Material => &mut grouped.materials,
                OptionCategory::Texture => &mut grouped.textures,
                OptionCategory::Colour => &mut grouped.colours,
                OptionCategory::Pattern => &mut grouped.patterns,
            };
            bucket.push(resolved.clone());
        }
        grouped
    }
}

/// Per-category enabled counts shown above the admin matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixSummary {
    pub materials_enabled: usize,
    pub textures_enabled: usize,
    pub colours_enabled: usize,
    pub patterns_enabled: usize,
}

impl MatrixSummary {
    #[must_use]
    pub fn from_options(options: &[ResolvedOption]) -> Self {
        let mut summary = Self::default();
        for resolved in options.iter().filter(|r| r.plan_enabled) {
            match resolved.option.category {
                OptionCategory::Material => summary.materials_enabled += 1,
                OptionCategory::Texture => summary.textures_enabled += 1,
                OptionCategory::Colour => summary.colours_enabled += 1,
                OptionCategory::Pattern => summary.patterns_enabled += 1,
            }
        }
        summary
    }
}

/// The outcome of resolving the catalog for one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// `None` for the unscoped catalog view.
    pub plan_id: Option<i64>,
    pub material_key: Option<String>,
    pub options: Vec<ResolvedOption>,
    /// Priced materials a customer can pick.
    pub material_price: BTreeMap<String, Decimal>,
    /// Every catalog material maps to the texture keys enabled under it.
    pub texture_keys_for: BTreeMap<String, Vec<String>>,
    pub colour_keys_for: BTreeMap<String, Vec<String>>,
    pub pattern_keys_for: BTreeMap<String, Vec<String>>,
}

impl Resolution {
    #[must_use]
    pub fn grouped(&self) -> GroupedOptions {
        GroupedOptions::from_options(&self.options)
    }

    #[must_use]
    pub fn summary(&self) -> MatrixSummary {
        MatrixSummary::from_options(&self.options)
    }

    #[must_use]
    pub fn option(&self, option_id: i64) -> Option<&ResolvedOption> {
        self.options.iter().find(|r| r.option.id == option_id)
    }

    #[must_use]
    pub fn is_enabled(&self, option_id: i64) -> bool {
        self.option(option_id).is_some_and(|r| r.plan_enabled)
    }
}

/// Resolves the catalog for `plan_id`.
///
/// With `selected_material`, scoped options report their state under that
/// material. Without it they report whether they are enabled under *any*
/// material, which is only meaningful for summary counts.
///
/// Overrides belonging to other plans are ignored.
#[must_use]
pub fn resolve_for_plan(
    options: &[CardOption],
    overrides: &[PlanOverride],
    plan_id: i64,
    selected_material: Option<&str>,
) -> Resolution {
    let index: HashMap<OverrideKey, &PlanOverride> = overrides
        .iter()
        .filter(|o| o.plan_id == plan_id)
        .map(|o| (o.key(), o))
        .collect();

    // (configured under any material, enabled under any material)
    let mut any_material: HashMap<i64, (bool, bool)> = HashMap::new();
    for ovr in index.values().filter(|o| o.material_scope.is_some()) {
        let entry = any_material.entry(ovr.option_id).or_default();
        entry.0 = true;
        entry.1 |= ovr.enabled;
    }

    let sorted = sorted_catalog(options);

    let resolved: Vec<ResolvedOption> = sorted
        .iter()
        .map(|option| {
            let (configured, plan_enabled) = if option.category.is_material_scoped() {
                match selected_material {
                    Some(material) => index
                        .get(&OverrideKey::Scoped(option.id, material.to_string()))
                        .map_or((false, false), |o| (true, o.enabled)),
                    None => any_material
                        .get(&option.id)
                        .copied()
                        .unwrap_or_default(),
                }
            } else {
                index
                    .get(&OverrideKey::Global(option.id))
                    .map_or((false, false), |o| (true, o.enabled))
            };

            let effective_price = if option.category == OptionCategory::Material {
                index
                    .get(&OverrideKey::Global(option.id))
                    .and_then(|o| o.price_override)
                    .or(option.price)
            } else {
                None
            };

            ResolvedOption {
                option: (*option).clone(),
                plan_enabled,
                configured,
                effective_price,
            }
        })
        .collect();

    let material_price = resolved
        .iter()
        .filter(|r| {
            r.option.category == OptionCategory::Material
                && r.plan_enabled
                && r.option.globally_enabled
        })
        .filter_map(|r| r.effective_price.map(|p| (r.option.key.clone(), p)))
        .collect();

    let scoped_enabled = |option: &CardOption, material: &str| {
        index
            .get(&OverrideKey::Scoped(option.id, material.to_string()))
            .is_some_and(|o| o.enabled)
    };

    Resolution {
        plan_id: Some(plan_id),
        material_key: selected_material.map(str::to_owned),
        material_price,
        texture_keys_for: keys_by_material(&sorted, OptionCategory::Texture, scoped_enabled),
        colour_keys_for: keys_by_material(&sorted, OptionCategory::Colour, scoped_enabled),
        pattern_keys_for: keys_by_material(&sorted, OptionCategory::Pattern, scoped_enabled),
        options: resolved,
    }
}

/// Resolves the catalog with no plan: each option is enabled iff it is
/// globally enabled, and children attach to materials through their
/// applicability lists.
#[must_use]
pub fn resolve_unscoped(options: &[CardOption]) -> Resolution {
    let sorted = sorted_catalog(options);

    let resolved: Vec<ResolvedOption> = sorted
        .iter()
        .map(|option| ResolvedOption {
            option: (*option).clone(),
            plan_enabled: option.globally_enabled,
            configured: false,
            effective_price: if option.category == OptionCategory::Material {
                option.price
            } else {
                None
            },
        })
        .collect();

    let material_price = resolved
        .iter()
        .filter(|r| r.option.category == OptionCategory::Material && r.plan_enabled)
        .filter_map(|r| r.effective_price.map(|p| (r.option.key.clone(), p)))
        .collect();

    let applicable =
        |option: &CardOption, material: &str| option.globally_enabled && option.applies_to(material);

    Resolution {
        plan_id: None,
        material_key: None,
        material_price,
        texture_keys_for: keys_by_material(&sorted, OptionCategory::Texture, applicable),
        colour_keys_for: keys_by_material(&sorted, OptionCategory::Colour, applicable),
        pattern_keys_for: keys_by_material(&sorted, OptionCategory::Pattern, applicable),
        options: resolved,
    }
}

fn sorted_catalog(options: &[CardOption]) -> Vec<&CardOption> {
    let mut sorted: Vec<&CardOption> = options.iter().collect();
    sorted.sort_by(|a, b| {
        (a.category, a.display_order, &a.key).cmp(&(b.category, b.display_order, &b.key))
    });
    sorted
}

fn keys_by_material<F>(
    sorted: &[&CardOption],
    category: OptionCategory,
    enabled_under: F,
) -> BTreeMap<String, Vec<String>>
where
    F: Fn(&CardOption, &str) -> bool,
{
    sorted
        .iter()
        .filter(|o| o.category == OptionCategory::Material)
        .map(|material| {
            let keys = sorted
                .iter()
                .filter(|o| o.category == category && enabled_under(o, material.key.as_str()))
                .map(|o| o.key.clone())
                .collect();
            (material.key.clone(), keys)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRO: i64 = 3;
    const STARTER: i64 = 1;

    fn option(id: i64, category: OptionCategory, key: &str) -> CardOption {
        CardOption {
            id,
            category,
            key: key.to_string(),
            label: key.to_string(),
            description: None,
            price: None,
            applicable_material_keys: vec![],
            globally_enabled: true,
            founders_only: false,
            display_order: 0,
        }
    }

    fn material(id: i64, key: &str, price: i64) -> CardOption {
        CardOption {
            price: Some(Decimal::new(price, 0)),
            ..option(id, OptionCategory::Material, key)
        }
    }

    fn ovr(plan_id: i64, option_id: i64, scope: Option<&str>, enabled: bool) -> PlanOverride {
        PlanOverride {
            plan_id,
            option_id,
            material_scope: scope.map(str::to_owned),
            enabled,
            price_override: None,
        }
    }

    fn catalog() -> Vec<CardOption> {
        vec![
            material(1, "metal", 99),
            material(2, "wood", 79),
            CardOption {
                applicable_material_keys: vec!["metal".to_string()],
                ..option(10, OptionCategory::Colour, "rose-gold")
            },
            option(11, OptionCategory::Colour, "black"),
            option(20, OptionCategory::Texture, "brushed"),
            option(30, OptionCategory::Pattern, "waves"),
        ]
    }

    #[test]
    fn no_override_means_disabled_even_when_globally_enabled() {
        let resolution = resolve_for_plan(&catalog(), &[], PRO, Some("metal"));
        assert!(resolution.options.iter().all(|r| !r.plan_enabled));
        assert!(resolution.options.iter().all(|r| !r.configured));
    }

    #[test]
    fn concrete_scenario_metal_and_rose_gold() {
        let options = vec![
            material(1, "metal", 99),
            CardOption {
                applicable_material_keys: vec!["metal".to_string()],
                ..option(10, OptionCategory::Colour, "rose-gold")
            },
        ];

        let before = resolve_for_plan(&options, &[], PRO, Some("metal"));
        assert!(before.material_price.is_empty());
        assert_eq!(before.colour_keys_for.get("metal"), Some(&vec![]));

        let overrides = vec![
            ovr(PRO, 1, None, true),
            ovr(PRO, 10, Some("metal"), true),
        ];
        let after = resolve_for_plan(&options, &overrides, PRO, Some("metal"));
        assert_eq!(
            after.material_price.get("metal"),
            Some(&Decimal::new(99, 0))
        );
        assert_eq!(after.material_price.len(), 1);
        assert_eq!(
            after.colour_keys_for.get("metal"),
            Some(&vec!["rose-gold".to_string()])
        );
    }

    #[test]
    fn scoped_override_does_not_leak_across_materials_or_plans() {
        let overrides = vec![ovr(PRO, 20, Some("metal"), true)];

        let metal = resolve_for_plan(&catalog(), &overrides, PRO, Some("metal"));
        assert!(metal.is_enabled(20));

        let wood = resolve_for_plan(&catalog(), &overrides, PRO, Some("wood"));
        assert!(!wood.is_enabled(20));

        let other_plan = resolve_for_plan(&catalog(), &overrides, STARTER, Some("metal"));
        assert!(!other_plan.is_enabled(20));

        assert_eq!(metal.texture_keys_for["metal"], vec!["brushed".to_string()]);
        assert!(metal.texture_keys_for["wood"].is_empty());
    }

    #[test]
    fn explicit_disable_and_missing_row_both_resolve_disabled() {
        let overrides = vec![ovr(PRO, 1, None, false)];
        let resolution = resolve_for_plan(&catalog(), &overrides, PRO, None);

        let metal = resolution.option(1).expect("metal");
        let wood = resolution.option(2).expect("wood");
        assert!(!metal.plan_enabled && metal.configured);
        assert!(!wood.plan_enabled && !wood.configured);
    }

    #[test]
    fn globally_disabled_material_is_unpriced_but_still_listed() {
        let mut options = catalog();
        options[0].globally_enabled = false;
        let overrides = vec![ovr(PRO, 1, None, true), ovr(PRO, 2, None, true)];

        let resolution = resolve_for_plan(&options, &overrides, PRO, Some("metal"));
        assert!(resolution.is_enabled(1), "metal still shows as plan-enabled");
        assert!(!resolution.material_price.contains_key("metal"));
        assert!(resolution.material_price.contains_key("wood"));
    }

    #[test]
    fn material_without_enabled_children_is_still_priced() {
        let overrides = vec![ovr(PRO, 2, None, true)];
        let resolution = resolve_for_plan(&catalog(), &overrides, PRO, Some("wood"));
        assert_eq!(
            resolution.material_price.get("wood"),
            Some(&Decimal::new(79, 0))
        );
        assert!(resolution.colour_keys_for["wood"].is_empty());
    }

    #[test]
    fn children_of_disabled_material_are_kept_in_maps() {
        let overrides = vec![ovr(PRO, 11, Some("wood"), true)];
        let resolution = resolve_for_plan(&catalog(), &overrides, PRO, Some("wood"));
        assert!(!resolution.material_price.contains_key("wood"));
        assert_eq!(resolution.colour_keys_for["wood"], vec!["black".to_string()]);
    }

    #[test]
    fn price_override_replaces_catalog_price() {
        let overrides = vec![PlanOverride {
            price_override: Some(Decimal::new(89, 0)),
            ..ovr(PRO, 1, None, true)
        }];
        let resolution = resolve_for_plan(&catalog(), &overrides, PRO, None);
        assert_eq!(
            resolution.material_price.get("metal"),
            Some(&Decimal::new(89, 0))
        );
    }

    #[test]
    fn without_material_children_resolve_to_union() {
        let overrides = vec![
            ovr(PRO, 11, Some("metal"), false),
            ovr(PRO, 11, Some("wood"), true),
            ovr(PRO, 30, Some("metal"), false),
        ];
        let resolution = resolve_for_plan(&catalog(), &overrides, PRO, None);
        assert!(resolution.is_enabled(11));
        assert!(!resolution.is_enabled(30));
        assert!(resolution.option(30).expect("pattern").configured);

        let summary = resolution.summary();
        assert_eq!(summary.colours_enabled, 1);
        assert_eq!(summary.patterns_enabled, 0);
        assert_eq!(summary.materials_enabled, 0);
    }

    #[test]
    fn options_are_ordered_by_category_then_display_order() {
        let mut options = catalog();
        options[1].display_order = -1;
        let resolution = resolve_for_plan(&options, &[], PRO, None);
        let keys: Vec<&str> = resolution
            .options
            .iter()
            .map(|r| r.option.key.as_str())
            .collect();
        assert_eq!(
            keys,
            vec!["wood", "metal", "brushed", "black", "rose-gold", "waves"]
        );
    }

    #[test]
    fn grouped_splits_by_category() {
        let resolution = resolve_for_plan(&catalog(), &[], PRO, Some("metal"));
        let grouped = resolution.grouped();
        assert_eq!(grouped.materials.len(), 2);
        assert_eq!(grouped.textures.len(), 1);
        assert_eq!(grouped.colours.len(), 2);
        assert_eq!(grouped.patterns.len(), 1);
    }

    #[test]
    fn unscoped_view_follows_global_flags_and_applicability() {
        let mut options = catalog();
        options[1].globally_enabled = false;
        let resolution = resolve_unscoped(&options);

        assert_eq!(resolution.plan_id, None);
        assert!(resolution.is_enabled(1));
        assert!(!resolution.is_enabled(2));
        assert!(!resolution.material_price.contains_key("wood"));
        assert_eq!(
            resolution.colour_keys_for["metal"],
            vec!["black".to_string(), "rose-gold".to_string()]
        );
        assert_eq!(resolution.colour_keys_for["wood"], vec!["black".to_string()]);
    }

    #[test]
    fn resolved_option_serializes_flat() {
        let resolution = resolve_for_plan(&catalog(), &[], PRO, Some("metal"));
        let json = serde_json::to_value(&resolution.options[0]).expect("serialize");
        assert_eq!(json["key"], "metal");
        assert_eq!(json["category"], "material");
        assert_eq!(json["plan_enabled"], false);
    }
}
