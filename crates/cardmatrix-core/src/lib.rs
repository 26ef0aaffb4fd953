pub mod app_config;
pub mod catalog;
pub mod catalog_seed;
pub mod config;
pub mod facade;
pub mod fallback;
pub mod overrides;
pub mod plans;
pub mod resolution;
pub mod staging;

pub use app_config::{AppConfig, Environment};
pub use catalog::{validate_price_update, CardOption, OptionCategory, OptionPatch};
pub use catalog_seed::{load_catalog_seed, parse_catalog_seed, CatalogSeed, OptionSeed, PlanSeed};
pub use config::{load_app_config, load_app_config_from_env};
pub use facade::{resolve_for_plan_type, CatalogSource, PublicCatalog, PublicOption};
pub use fallback::fallback_catalog;
pub use overrides::{
    ensure_non_empty_batch, BatchOutcome, FailedToggle, OverrideKey, OverrideToggle, PlanOverride,
};
pub use plans::{Plan, PlanType};
pub use resolution::{
    resolve_for_plan, resolve_unscoped, GroupedOptions, MatrixSummary, Resolution, ResolvedOption,
};
pub use staging::{
    MatrixBackend, SaveReport, SaveRequest, SessionError, SessionState, StagingSession,
};

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read catalog file {path}: {source}")]
    CatalogFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog file: {0}")]
    CatalogFileParse(#[from] serde_yaml::Error),

    #[error("catalog validation failed: {0}")]
    Validation(String),
}

/// Rule violations that callers must not retry without changing the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("price must be non-negative, got {0}")]
    NegativePrice(Decimal),

    #[error("price can only be set on material options, not {0}")]
    PriceOnNonMaterial(OptionCategory),

    #[error("option {option_id} is a {category} and requires a material scope")]
    MissingMaterialScope {
        option_id: i64,
        category: OptionCategory,
    },

    #[error("option {option_id} is a material and cannot carry a material scope")]
    UnexpectedMaterialScope { option_id: i64 },

    #[error("material scope must be non-empty")]
    EmptyMaterialScope,

    #[error("unknown material: {0}")]
    UnknownMaterial(String),

    #[error("option {option_id} does not apply to material {material}")]
    ScopeNotApplicable { option_id: i64, material: String },

    #[error("batch must contain at least one toggle")]
    EmptyBatch,

    #[error("patch must change at least one field")]
    EmptyPatch,

    #[error("plan {0} does not offer card customization")]
    PlanNotCustomizable(i64),

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("unknown plan type: {0}")]
    UnknownPlanType(String),
}
