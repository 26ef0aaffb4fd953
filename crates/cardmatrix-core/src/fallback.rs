//! Fixed catalog served to checkout when the store cannot be read.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::facade::{PublicCatalog, PublicOption};

/// `(key, label, price in whole USD)`
const MATERIALS: [(&str, &str, i64); 3] = [
    ("metal", "Metal", 99),
    ("wood", "Wood", 69),
    ("pvc", "PVC", 29),
];

const TEXTURES: [(&str, &str); 4] = [
    ("brushed", "Brushed"),
    ("matte", "Matte"),
    ("glossy", "Glossy"),
    ("natural-grain", "Natural Grain"),
];

const COLOURS: [(&str, &str); 7] = [
    ("black", "Black"),
    ("silver", "Silver"),
    ("gold", "Gold"),
    ("rose-gold", "Rose Gold"),
    ("natural", "Natural"),
    ("walnut", "Walnut"),
    ("white", "White"),
];

const PATTERNS: [(&str, &str); 3] = [
    ("solid", "Solid"),
    ("carbon-fibre", "Carbon Fibre"),
    ("geometric", "Geometric"),
];

const TEXTURES_FOR: [(&str, &[&str]); 3] = [
    ("metal", &["brushed", "matte", "glossy"]),
    ("wood", &["natural-grain"]),
    ("pvc", &["matte", "glossy"]),
];

const COLOURS_FOR: [(&str, &[&str]); 3] = [
    ("metal", &["black", "silver", "gold", "rose-gold"]),
    ("wood", &["natural", "walnut"]),
    ("pvc", &["black", "white"]),
];

/// Returns the hard-coded catalog with `fallback` set.
#[must_use]
pub fn fallback_catalog() -> PublicCatalog {
    let materials = MATERIALS
        .iter()
        .map(|(key, label, price)| PublicOption {
            key: (*key).to_string(),
            label: (*label).to_string(),
            description: None,
            price: Some(Decimal::new(*price, 0)),
        })
        .collect::<Vec<_>>();

    let material_price = materials
        .iter()
        .filter_map(|m| m.price.map(|p| (m.key.clone(), p)))
        .collect();

    PublicCatalog {
        material_price,
        materials,
        textures: simple_options(&TEXTURES),
        colours: simple_options(&COLOURS),
        patterns: simple_options(&PATTERNS),
        texture_options: key_map(&TEXTURES_FOR),
        colour_options: key_map(&COLOURS_FOR),
        fallback: true,
    }
}

fn simple_options(entries: &[(&str, &str)]) -> Vec<PublicOption> {
    entries
        .iter()
        .map(|(key, label)| PublicOption {
            key: (*key).to_string(),
            label: (*label).to_string(),
            description: None,
            price: None,
        })
        .collect()
}

fn key_map(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(material, keys)| {
            (
                (*material).to_string(),
                keys.iter().map(|k| (*k).to_string()).collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_has_three_priced_materials() {
        let catalog = fallback_catalog();
        assert!(catalog.fallback);
        assert_eq!(catalog.materials.len(), 3);
        assert_eq!(catalog.material_price.len(), 3);
        assert_eq!(catalog.material_price["metal"], Decimal::new(99, 0));
    }

    #[test]
    fn every_material_has_texture_and_colour_lists() {
        let catalog = fallback_catalog();
        for material in catalog.materials.iter().map(|m| m.key.as_str()) {
            assert!(!catalog.texture_options[material].is_empty(), "{material}");
            assert!(!catalog.colour_options[material].is_empty(), "{material}");
        }
    }

    #[test]
    fn mapped_keys_exist_in_option_lists() {
        let catalog = fallback_catalog();
        let textures: Vec<&str> = catalog.textures.iter().map(|t| t.key.as_str()).collect();
        let colours: Vec<&str> = catalog.colours.iter().map(|c| c.key.as_str()).collect();
        for keys in catalog.texture_options.values() {
            assert!(keys.iter().all(|k| textures.contains(&k.as_str())));
        }
        for keys in catalog.colour_options.values() {
            assert!(keys.iter().all(|k| colours.contains(&k.as_str())));
        }
    }

    #[test]
    fn serializes_fallback_flag() {
        let json = serde_json::to_value(fallback_catalog()).expect("serialize");
        assert_eq!(json["fallback"], true);
        assert_eq!(json["material_price"]["wood"], "69");
    }
}
