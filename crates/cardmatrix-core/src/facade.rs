//! Public Resolution Façade consumed by the checkout flow.
//!
//! Checkout only ever sees the projected [`PublicCatalog`], never raw option
//! or override rows. If the store cannot be read the façade serves
//! [`fallback_catalog`] instead of failing the checkout.

use std::collections::BTreeMap;
use std::future::Future;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{CardOption, OptionCategory};
use crate::fallback::fallback_catalog;
use crate::overrides::PlanOverride;
use crate::plans::{Plan, PlanType};
use crate::resolution::{resolve_for_plan, resolve_unscoped, Resolution};

/// Read access to the catalog, plans and overrides.
pub trait CatalogSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn list_options(&self) -> impl Future<Output = Result<Vec<CardOption>, Self::Error>> + Send;

    fn find_plan_by_type(
        &self,
        plan_type: PlanType,
    ) -> impl Future<Output = Result<Option<Plan>, Self::Error>> + Send;

    fn list_overrides(
        &self,
        plan_id: i64,
    ) -> impl Future<Output = Result<Vec<PlanOverride>, Self::Error>> + Send;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicOption {
    pub key: String,
    pub label: String,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

impl From<&CardOption> for PublicOption {
    fn from(option: &CardOption) -> Self {
        Self {
            key: option.key.clone(),
            label: option.label.clone(),
            description: option.description.clone(),
            price: option.price,
        }
    }
}

/// What a customer may choose from at checkout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicCatalog {
    pub materials: Vec<PublicOption>,
    pub textures: Vec<PublicOption>,
    pub colours: Vec<PublicOption>,
    pub patterns: Vec<PublicOption>,
    pub material_price: BTreeMap<String, Decimal>,
    pub texture_options: BTreeMap<String, Vec<String>>,
    pub colour_options: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl PublicCatalog {
    /// Projects a resolution onto the customer-facing shape.
    ///
    /// Founders-only options are dropped unless `show_founders` is set.
    #[must_use]
    pub fn from_resolution(resolution: &Resolution, show_founders: bool) -> Self {
        let visible = |o: &CardOption| show_founders || !o.founders_only;

        let hidden: Vec<(OptionCategory, &str)> = resolution
            .options
            .iter()
            .filter(|r| !visible(&r.option))
            .map(|r| (r.option.category, r.option.key.as_str()))
            .collect();
        let is_hidden = |category: OptionCategory, key: &str| {
            hidden.iter().any(|(c, k)| *c == category && *k == key)
        };

        let pick = |category: OptionCategory| -> Vec<PublicOption> {
            resolution
                .options
                .iter()
                .filter(|r| r.option.category == category && r.plan_enabled && visible(&r.option))
                .map(|r| PublicOption {
                    price: r.effective_price.or(r.option.price),
                    ..PublicOption::from(&r.option)
                })
                .collect()
        };

        let material_price: BTreeMap<String, Decimal> = resolution
            .material_price
            .iter()
            .filter(|(key, _)| !is_hidden(OptionCategory::Material, key.as_str()))
            .map(|(key, price)| (key.clone(), *price))
            .collect();

        // Only priced materials are purchasable.
        let materials = pick(OptionCategory::Material)
            .into_iter()
            .filter(|m| material_price.contains_key(&m.key))
            .collect();

        // Child keys are only unique within their own category.
        let visible_keys = |map: &BTreeMap<String, Vec<String>>, category: OptionCategory| {
            map.iter()
                .filter(|(material, _)| !is_hidden(OptionCategory::Material, material.as_str()))
                .map(|(material, keys)| {
                    let keys = keys
                        .iter()
                        .filter(|k| !is_hidden(category, k.as_str()))
                        .cloned()
                        .collect();
                    (material.clone(), keys)
                })
                .collect::<BTreeMap<String, Vec<String>>>()
        };

        Self {
            materials,
            textures: pick(OptionCategory::Texture),
            colours: pick(OptionCategory::Colour),
            patterns: pick(OptionCategory::Pattern),
            texture_options: visible_keys(&resolution.texture_keys_for, OptionCategory::Texture),
            colour_options: visible_keys(&resolution.colour_keys_for, OptionCategory::Colour),
            material_price,
            fallback: false,
        }
    }
}

/// Resolves the checkout catalog for a plan type, or the unscoped catalog
/// when `plan_type` is `None`.
///
/// A plan type with no plan row, or a plan without card customization,
/// yields an empty catalog. Store errors never propagate: they are logged
/// and the fallback catalog is returned with `fallback: true`.
pub async fn resolve_for_plan_type<S>(source: &S, plan_type: Option<PlanType>) -> PublicCatalog
where
    S: CatalogSource + Sync,
{
    match load_public_catalog(source, plan_type).await {
        Ok(catalog) => catalog,
        Err(error) => {
            tracing::warn!(
                error = %error,
                plan_type = plan_type.map(PlanType::as_str),
                "catalog store unavailable, serving fallback catalog"
            );
            fallback_catalog()
        }
    }
}

async fn load_public_catalog<S>(
    source: &S,
    plan_type: Option<PlanType>,
) -> Result<PublicCatalog, S::Error>
where
    S: CatalogSource + Sync,
{
    let Some(plan_type) = plan_type else {
        let options = source.list_options().await?;
        return Ok(PublicCatalog::from_resolution(
            &resolve_unscoped(&options),
            false,
        ));
    };

    let plan = match source.find_plan_by_type(plan_type).await? {
        Some(plan) if plan.has_card_customization => plan,
        Some(_) | None => {
            tracing::debug!(%plan_type, "plan has no card customization");
            return Ok(PublicCatalog::default());
        }
    };

    let options = source.list_options().await?;
    let overrides = source.list_overrides(plan.id).await?;
    let resolution = resolve_for_plan(&options, &overrides, plan.id, None);

    Ok(PublicCatalog::from_resolution(
        &resolution,
        plan_type.sees_founders_options(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct Unreachable;

    struct FailingSource;

    impl CatalogSource for FailingSource {
        type Error = Unreachable;

        async fn list_options(&self) -> Result<Vec<CardOption>, Unreachable> {
            Err(Unreachable)
        }

        async fn find_plan_by_type(&self, _: PlanType) -> Result<Option<Plan>, Unreachable> {
            Err(Unreachable)
        }

        async fn list_overrides(&self, _: i64) -> Result<Vec<PlanOverride>, Unreachable> {
            Err(Unreachable)
        }
    }

    struct FixedSource {
        options: Vec<CardOption>,
        plans: Vec<Plan>,
        overrides: Vec<PlanOverride>,
    }

    impl CatalogSource for FixedSource {
        type Error = Unreachable;

        async fn list_options(&self) -> Result<Vec<CardOption>, Unreachable> {
            Ok(self.options.clone())
        }

        async fn find_plan_by_type(&self, plan_type: PlanType) -> Result<Option<Plan>, Unreachable> {
            Ok(self.plans.iter().find(|p| p.plan_type == plan_type).cloned())
        }

        async fn list_overrides(&self, plan_id: i64) -> Result<Vec<PlanOverride>, Unreachable> {
            Ok(self
                .overrides
                .iter()
                .filter(|o| o.plan_id == plan_id)
                .cloned()
                .collect())
        }
    }

    fn option(id: i64, category: OptionCategory, key: &str, price: Option<i64>) -> CardOption {
        CardOption {
            id,
            category,
            key: key.to_string(),
            label: key.to_uppercase(),
            description: None,
            price: price.map(|p| Decimal::new(p, 0)),
            applicable_material_keys: vec![],
            globally_enabled: true,
            founders_only: false,
            display_order: 0,
        }
    }

    fn plan(id: i64, plan_type: PlanType, has_card_customization: bool) -> Plan {
        Plan {
            id,
            plan_type,
            name: plan_type.to_string(),
            has_card_customization,
        }
    }

    fn enabled(plan_id: i64, option_id: i64, scope: Option<&str>) -> PlanOverride {
        PlanOverride {
            plan_id,
            option_id,
            material_scope: scope.map(str::to_owned),
            enabled: true,
            price_override: None,
        }
    }

    fn source() -> FixedSource {
        FixedSource {
            options: vec![
                option(1, OptionCategory::Material, "metal", Some(99)),
                option(2, OptionCategory::Material, "wood", Some(69)),
                CardOption {
                    founders_only: true,
                    ..option(3, OptionCategory::Material, "gold-leaf", Some(499))
                },
                option(10, OptionCategory::Colour, "rose-gold", None),
                option(20, OptionCategory::Texture, "brushed", None),
                option(30, OptionCategory::Pattern, "waves", None),
            ],
            plans: vec![
                plan(1, PlanType::Starter, false),
                plan(3, PlanType::Pro, true),
                plan(5, PlanType::FoundersCircle, true),
            ],
            overrides: vec![
                enabled(3, 1, None),
                enabled(3, 10, Some("metal")),
                enabled(3, 30, Some("wood")),
                enabled(5, 3, None),
                enabled(5, 1, None),
            ],
        }
    }

    #[tokio::test]
    async fn store_failure_serves_fallback() {
        let catalog = resolve_for_plan_type(&FailingSource, Some(PlanType::Pro)).await;
        assert!(catalog.fallback);
        assert_eq!(catalog, fallback_catalog());
    }

    #[tokio::test]
    async fn plan_scoped_catalog_only_exposes_enabled_cells() {
        let catalog = resolve_for_plan_type(&source(), Some(PlanType::Pro)).await;
        assert!(!catalog.fallback);

        let materials: Vec<&str> = catalog.materials.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(materials, vec!["metal"]);
        assert_eq!(catalog.material_price.len(), 1);
        assert_eq!(catalog.colour_options["metal"], vec!["rose-gold".to_string()]);
        assert!(catalog.colour_options["wood"].is_empty());
        assert!(catalog.textures.is_empty());
        assert_eq!(catalog.patterns.len(), 1);
    }

    #[tokio::test]
    async fn founders_only_options_are_hidden_from_other_plans() {
        let pro = resolve_for_plan_type(&source(), Some(PlanType::Pro)).await;
        assert!(!pro.colour_options.contains_key("gold-leaf"));

        let founders = resolve_for_plan_type(&source(), Some(PlanType::FoundersCircle)).await;
        assert_eq!(
            founders.material_price.get("gold-leaf"),
            Some(&Decimal::new(499, 0))
        );
        assert!(founders.colour_options.contains_key("gold-leaf"));
    }

    #[test]
    fn founders_filter_matches_category_and_key() {
        let metal = option(1, OptionCategory::Material, "metal", Some(99));
        let colour = CardOption {
            applicable_material_keys: vec!["metal".to_owned()],
            ..option(10, OptionCategory::Colour, "gold", None)
        };
        let texture = CardOption {
            applicable_material_keys: vec!["metal".to_owned()],
            founders_only: true,
            ..option(20, OptionCategory::Texture, "gold", None)
        };
        let founders_material_named_like_colour = CardOption {
            founders_only: true,
            ..option(2, OptionCategory::Material, "gold", Some(499))
        };
        let options = vec![metal, founders_material_named_like_colour, colour, texture];
        let overrides = vec![
            enabled(3, 1, None),
            enabled(3, 10, Some("metal")),
            enabled(3, 20, Some("metal")),
        ];

        let resolution = resolve_for_plan(&options, &overrides, 3, None);
        let catalog = PublicCatalog::from_resolution(&resolution, false);

        let colours: Vec<&str> = catalog.colours.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(colours, vec!["gold"]);
        assert_eq!(catalog.colour_options["metal"], vec!["gold".to_string()]);
        assert!(catalog.textures.is_empty());
        assert!(catalog.texture_options["metal"].is_empty());
        assert!(!catalog.material_price.contains_key("gold"));
        assert!(catalog.material_price.contains_key("metal"));
    }

    #[tokio::test]
    async fn plan_without_customization_gets_empty_catalog() {
        let catalog = resolve_for_plan_type(&source(), Some(PlanType::Starter)).await;
        assert_eq!(catalog, PublicCatalog::default());

        let missing = resolve_for_plan_type(&source(), Some(PlanType::Signature)).await;
        assert!(missing.materials.is_empty());
        assert!(!missing.fallback);
    }

    #[tokio::test]
    async fn no_plan_type_serves_unscoped_catalog() {
        let catalog = resolve_for_plan_type(&source(), None).await;
        let materials: Vec<&str> = catalog.materials.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(materials, vec!["metal", "wood"]);
        assert_eq!(catalog.colours.len(), 1);
        assert_eq!(catalog.texture_options["wood"], vec!["brushed".to_string()]);
    }

    #[test]
    fn fallback_flag_is_omitted_when_false() {
        let json = serde_json::to_value(PublicCatalog::default()).expect("serialize");
        assert!(json.get("fallback").is_none());
    }
}
