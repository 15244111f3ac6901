//! Property-based tests for configuration validation

use super::error::ValidationError;
use super::validator::validate_config;
use crate::config::schema::*;
use proptest::prelude::*;

fn arb_valid_spec() -> impl Strategy<Value = RunSpec> {
    (
        1usize..100,                                    // max_epoch
        prop::collection::vec(-10.0f64..10.0, 1..16),   // batches
        0.01f64..2.0,                                   // decay
        proptest::option::of(1u64..512),                // batch_size
        proptest::option::of(1usize..10),               // patience
    )
        .prop_map(|(max_epoch, batches, decay, batch_size, patience)| RunSpec {
            max_epoch,
            batches,
            decay,
            floor: 0.0,
            batch_size,
            reducers: vec![ReducerSpec {
                name: "loss".to_string(),
                kind: "mean".to_string(),
                value: "output".to_string(),
            }],
            early_stopping: patience
                .map(|patience| EarlyStoppingSpec { patience, ..Default::default() }),
            checkpoint: None,
            progress: false,
            log_epoch_time: false,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_valid_spec_passes(spec in arb_valid_spec()) {
        prop_assert!(validate_config(&spec).is_ok());
    }

    #[test]
    fn prop_zero_epochs_fails(spec in arb_valid_spec()) {
        let mut spec = spec;
        spec.max_epoch = 0;
        prop_assert_eq!(validate_config(&spec), Err(ValidationError::InvalidEpochs(0)));
    }

    #[test]
    fn prop_non_positive_decay_fails(spec in arb_valid_spec(), decay in -5.0f64..=0.0) {
        let mut spec = spec;
        spec.decay = decay;
        prop_assert!(matches!(validate_config(&spec), Err(ValidationError::InvalidDecay(_))));
    }

    #[test]
    fn prop_yaml_round_trip_stays_valid(spec in arb_valid_spec()) {
        let yaml = serde_yaml::to_string(&spec).unwrap();
        let back: RunSpec = serde_yaml::from_str(&yaml).unwrap();
        prop_assert!(validate_config(&back).is_ok());
    }
}
