//! Fallback plans only ever move to cheaper, distinct models

use proptest::prelude::*;
use rulekeeper::tiers::{ModelFamily, ModelLadder, ModelTiers};

fn model_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("gemini-2.5-pro".to_string()),
        Just("gemini-2.5-flash".to_string()),
        Just("gemini-2.5-flash-lite".to_string()),
        "[a-z]{1,6}-(pro|lite|flash)?",
    ]
}

#[test]
fn test_fallbacks_never_climb_or_repeat() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(model_name(), model_name(), model_name(), model_name()),
            |(primary, standard, economy, failed)| {
                let ladder = ModelLadder::new(ModelTiers::new(primary, standard, economy));
                let plan = ladder.fallbacks(&failed);

                prop_assert!(!plan.contains(&failed));
                let mut seen = plan.clone();
                seen.sort();
                seen.dedup();
                prop_assert_eq!(seen.len(), plan.len());

                let tiers = ladder.tiers();
                let failed_family = tiers.family(&failed);
                for next in &plan {
                    prop_assert!(tiers.family(next) <= failed_family);
                }
                if failed_family == ModelFamily::Economy {
                    prop_assert!(plan.is_empty());
                }
                Ok(())
            },
        )
        .unwrap();
}
