use folio_model::{Arm, SessionId, VariantLabel};
use proptest::prelude::*;
use proptest::test_runner::Config;

proptest! {
    #![proptest_config(Config::with_cases(128))]
    #[test]
    fn beacon_session_ids_always_parse(ms in 0u64..=9_999_999_999_999, suffix in "[a-z0-9]{9}") {
        let raw = format!("session_{ms}_{suffix}");
        let id = SessionId::parse(&raw).expect("session id");
        prop_assert_eq!(id.as_str(), raw.as_str());
    }

    #[test]
    fn any_label_other_than_control_is_the_variant_arm(label in "[A-Za-z0-9_]{1,32}") {
        prop_assume!(label != "control");
        let parsed = VariantLabel::parse(&label).expect("label");
        prop_assert_eq!(parsed.arm(), Arm::Variant);
    }
}
