//! Model tiers and the fallback ladder.
//!
//! The ladder is data: an ordered list of rules, each pairing a predicate over the current
//! model's family with the tier to try next. Rules are evaluated top to bottom against the
//! model that first hit a capacity error; the resulting list of models is tried in order.

use crate::config::ModelsConfig;
use serde::{Deserialize, Serialize};

/// Position of a configured model in the cost/availability order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelTier {
    Primary,
    Standard,
    Economy,
}

/// Capability family a model identifier belongs to, cheapest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelFamily {
    Economy,
    Standard,
    HighCapability,
}

/// Concrete model identifiers for each tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTiers {
    pub primary: String,
    pub standard: String,
    pub economy: String,
    high_capability_marker: String,
    economy_marker: String,
}

impl ModelTiers {
    pub fn new(
        primary: impl Into<String>,
        standard: impl Into<String>,
        economy: impl Into<String>,
    ) -> Self {
        Self {
            primary: primary.into(),
            standard: standard.into(),
            economy: economy.into(),
            high_capability_marker: "pro".to_string(),
            economy_marker: "lite".to_string(),
        }
    }

    pub fn with_markers(
        mut self,
        high_capability: impl Into<String>,
        economy: impl Into<String>,
    ) -> Self {
        self.high_capability_marker = high_capability.into().to_lowercase();
        self.economy_marker = economy.into().to_lowercase();
        self
    }

    pub fn model(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Primary => &self.primary,
            ModelTier::Standard => &self.standard,
            ModelTier::Economy => &self.economy,
        }
    }

    /// Family of a model identifier. The economy marker is checked first since cheap
    /// variants are usually named after the model they derive from.
    pub fn family(&self, model: &str) -> ModelFamily {
        let model = model.to_lowercase();
        if !self.economy_marker.is_empty() && model.contains(&self.economy_marker) {
            ModelFamily::Economy
        } else if !self.high_capability_marker.is_empty()
            && model.contains(&self.high_capability_marker)
        {
            ModelFamily::HighCapability
        } else {
            ModelFamily::Standard
        }
    }
}

impl From<&ModelsConfig> for ModelTiers {
    fn from(config: &ModelsConfig) -> Self {
        ModelTiers::new(&config.primary, &config.standard, &config.economy)
            .with_markers(&config.high_capability_marker, &config.economy_marker)
    }
}

/// One step of the ladder
#[derive(Debug, Clone, Copy)]
pub struct FallbackRule {
    pub name: &'static str,
    pub applies: fn(ModelFamily) -> bool,
    pub next: ModelTier,
}

impl FallbackRule {
    /// High-capability models step down to the standard tier
    pub const HIGH_TO_STANDARD: FallbackRule = FallbackRule {
        name: "high-capability-to-standard",
        applies: |family| family == ModelFamily::HighCapability,
        next: ModelTier::Standard,
    };

    /// Anything not already cheapest steps down to the economy tier
    pub const ANY_TO_ECONOMY: FallbackRule = FallbackRule {
        name: "any-to-economy",
        applies: |family| family != ModelFamily::Economy,
        next: ModelTier::Economy,
    };
}

#[derive(Debug, Clone)]
pub struct ModelLadder {
    tiers: ModelTiers,
    rules: Vec<FallbackRule>,
}

impl ModelLadder {
    pub fn new(tiers: ModelTiers) -> Self {
        Self::with_rules(
            tiers,
            vec![FallbackRule::HIGH_TO_STANDARD, FallbackRule::ANY_TO_ECONOMY],
        )
    }

    pub fn with_rules(tiers: ModelTiers, rules: Vec<FallbackRule>) -> Self {
        Self { tiers, rules }
    }

    pub fn tiers(&self) -> &ModelTiers {
        &self.tiers
    }

    /// Models to try, in order, after `model` fails with a capacity error.
    ///
    /// A candidate is skipped when it equals `model`, repeats an earlier candidate, or
    /// belongs to a more capable family than `model`.
    pub fn fallbacks(&self, model: &str) -> Vec<String> {
        let family = self.tiers.family(model);
        let mut plan: Vec<String> = Vec::new();
        for rule in &self.rules {
            if !(rule.applies)(family) {
                continue;
            }
            let candidate = self.tiers.model(rule.next);
            if candidate == model
                || plan.iter().any(|m| m == candidate)
                || self.tiers.family(candidate) > family
            {
                continue;
            }
            plan.push(candidate.to_string());
        }
        plan
    }
}
