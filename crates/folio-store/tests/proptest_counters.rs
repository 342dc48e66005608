use chrono::{TimeZone, Utc};
use folio_model::{ExperimentName, ExperimentPatch, NewExperiment, SessionId, VariantLabel};
use folio_store::{SqliteStore, ViewCounting};
use proptest::prelude::*;
use proptest::test_runner::Config;
use std::collections::BTreeSet;

fn run(calls: &[(u8, bool)], counting: ViewCounting) -> (u64, u64, u64) {
    let now = Utc.timestamp_millis_opt(1_700_000_000_000).single().expect("now");
    let store = SqliteStore::open_in_memory().expect("open");
    let name = ExperimentName::parse("prop").expect("name");
    let exp = store
        .create_experiment(&NewExperiment::named(name.clone()), now)
        .expect("create");
    store
        .update_experiment(
            &exp.id,
            &ExperimentPatch {
                is_active: Some(true),
                ..ExperimentPatch::default()
            },
            now,
        )
        .expect("activate");
    for (session, control) in calls {
        let session = SessionId::parse(&format!("session_{session}")).expect("sid");
        let variant = VariantLabel::parse(if *control { "control" } else { "variant" })
            .expect("label");
        store
            .assign(&session, &name, &variant, counting, now)
            .expect("assign");
    }
    let exp = store.get_experiment(&exp.id).expect("get").expect("exists");
    (
        exp.control_views,
        exp.variant_views,
        store.assignment_count(&exp.id).expect("count"),
    )
}

proptest! {
    #![proptest_config(Config::with_cases(32))]
    #[test]
    fn every_assignment_counts_each_call(calls in prop::collection::vec((0u8..8, any::<bool>()), 0..40)) {
        let (control, variant, rows) = run(&calls, ViewCounting::EveryAssignment);
        let sessions: BTreeSet<u8> = calls.iter().map(|(s, _)| *s).collect();
        prop_assert_eq!(control + variant, calls.len() as u64);
        prop_assert_eq!(control, calls.iter().filter(|(_, c)| *c).count() as u64);
        prop_assert_eq!(rows, sessions.len() as u64);
    }

    #[test]
    fn first_assignment_counts_each_session_once(calls in prop::collection::vec((0u8..8, any::<bool>()), 0..40)) {
        let (control, variant, rows) = run(&calls, ViewCounting::FirstAssignment);
        let sessions: BTreeSet<u8> = calls.iter().map(|(s, _)| *s).collect();
        prop_assert_eq!(control + variant, sessions.len() as u64);
        prop_assert_eq!(rows, sessions.len() as u64);
    }
}
