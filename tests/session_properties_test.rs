// Session version properties over arbitrary keypress sequences

mod fixtures;

use fixtures::harness::*;
use proptest::prelude::*;

const KEYPRESSES: &[&str] = &[
    "", "0", "1", "2", "3", "4", "5", "9", "11", "22", "00", BOB_LOCAL, "10", "500", PIN, WRONG_PIN,
];

/// (version before, version after, outcome) for every turn of a dialogue.
type Step = (u64, u64, Option<(bool, u64)>);

fn run_dialogue(phone: &'static str, inputs: Vec<&'static str>) -> Vec<Step> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime");

    runtime.block_on(async move {
        let harness = Harness::new();
        let mut steps = Vec::with_capacity(inputs.len());

        for input in inputs {
            let before = harness.stored("P1").await.map_or(0, |session| session.version);
            let outcome = harness
                .orchestrator
                .process(&Harness::turn_for("P1", phone, input))
                .await
                .ok()
                .map(|outcome| (outcome.no_op, outcome.version));
            let after = harness.stored("P1").await.map_or(0, |session| session.version);
            steps.push((before, after, outcome));
        }
        steps
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn version_grows_by_one_per_effective_turn(
        caller in prop::sample::select(vec![ALICE, NEWCOMER]),
        inputs in prop::collection::vec(prop::sample::select(KEYPRESSES.to_vec()), 1..12)
    ) {
        let steps = run_dialogue(caller, inputs);

        for (before, after, outcome) in steps {
            match outcome {
                Some((true, version)) => {
                    prop_assert_eq!(after, before);
                    prop_assert_eq!(version, before);
                }
                Some((false, version)) => {
                    prop_assert_eq!(after, before + 1);
                    prop_assert_eq!(version, after);
                }
                None => prop_assert_eq!(after, before),
            }
        }
    }

    #[test]
    fn history_length_tracks_the_version(
        inputs in prop::collection::vec(prop::sample::select(KEYPRESSES.to_vec()), 1..10)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("test runtime");

        let stored = runtime.block_on(async move {
            let harness = Harness::new();
            for input in inputs {
                let _ = harness.orchestrator.process(&Harness::turn_for("P2", ALICE, input)).await;
            }
            harness.stored("P2").await
        });

        if let Some(session) = stored {
            prop_assert_eq!(session.history.len() as u64, session.version);
        }
    }
}
