//! Offline unit tests for cardmatrix-db pool configuration and row types.
//! These tests do not require a live database connection.

use cardmatrix_core::{AppConfig, CardOption, Environment, OptionCategory, Plan, PlanOverride, PlanType};
use cardmatrix_db::{CardOptionRow, DbError, PlanOptionOverrideRow, PlanRow, PoolConfig};
use chrono::Utc;
use rust_decimal::Decimal;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        catalog_path: PathBuf::from("./config/catalog.yaml"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        rate_limit_per_minute: 120,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

fn option_row(category: &str) -> CardOptionRow {
    CardOptionRow {
        id: 4,
        category: category.to_string(),
        option_key: "rose-gold".to_string(),
        label: "Rose Gold".to_string(),
        description: None,
        price_usd: None,
        applicable_material_keys: vec!["metal".to_string()],
        globally_enabled: true,
        founders_only: false,
        display_order: 2,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn option_row_converts_to_domain() {
    let option = CardOption::try_from(option_row("colour")).expect("valid row");
    assert_eq!(option.category, OptionCategory::Colour);
    assert_eq!(option.key, "rose-gold");
    assert!(option.applies_to("metal"));
    assert!(!option.applies_to("wood"));
}

#[test]
fn option_row_with_unknown_category_is_invalid() {
    let err = CardOption::try_from(option_row("finish")).unwrap_err();
    assert!(matches!(err, DbError::InvalidRow { table: "card_options", .. }));
}

#[test]
fn plan_row_converts_to_domain() {
    let plan = Plan::try_from(PlanRow {
        id: 5,
        plan_type: "founders-circle".to_string(),
        name: "Founders Circle".to_string(),
        has_card_customization: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    })
    .expect("valid row");
    assert_eq!(plan.plan_type, PlanType::FoundersCircle);
}

#[test]
fn override_row_converts_to_scoped_key() {
    let row = PlanOptionOverrideRow {
        id: 1,
        plan_id: 3,
        option_id: 4,
        material_scope: Some("metal".to_string()),
        enabled: true,
        price_override_usd: Some(Decimal::new(10, 0)),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let ovr = PlanOverride::from(row);
    assert_eq!(
        ovr.key(),
        cardmatrix_core::OverrideKey::Scoped(4, "metal".to_string())
    );
    assert_eq!(ovr.price_override, Some(Decimal::new(10, 0)));
}
