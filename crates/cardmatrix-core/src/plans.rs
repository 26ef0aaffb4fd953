use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Subscription tiers. Only plans with card customization take part in the
/// option matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanType {
    Starter,
    Next,
    Pro,
    Signature,
    FoundersCircle,
}

impl PlanType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Starter => "starter",
            PlanType::Next => "next",
            PlanType::Pro => "pro",
            PlanType::Signature => "signature",
            PlanType::FoundersCircle => "founders-circle",
        }
    }

    /// Founders-only options are visible to customers on this tier alone.
    #[must_use]
    pub fn sees_founders_options(self) -> bool {
        matches!(self, PlanType::FoundersCircle)
    }
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starter" => Ok(PlanType::Starter),
            "next" => Ok(PlanType::Next),
            "pro" => Ok(PlanType::Pro),
            "signature" => Ok(PlanType::Signature),
            "founders-circle" | "founders_circle" => Ok(PlanType::FoundersCircle),
            _ => Err(ValidationError::UnknownPlanType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub plan_type: PlanType,
    pub name: String,
    pub has_card_customization: bool,
}
