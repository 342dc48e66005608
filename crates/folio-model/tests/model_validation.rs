use folio_model::{
    Arm, Assignment, ExperimentId, ExperimentName, NewExperiment, ParseError, SessionId,
    TrafficSplit, VariantLabel, EXPERIMENT_NAME_MAX_LEN,
};

#[test]
fn experiment_name_rejects_control_chars_and_overlong_input() {
    assert!(ExperimentName::parse("hero-cta").is_ok());
    assert!(ExperimentName::parse("Hero CTA copy").is_ok());
    assert_eq!(
        ExperimentName::parse("hero\ncta").expect_err("control char"),
        ParseError::InvalidFormat("experimentName")
    );
    let long = "x".repeat(EXPERIMENT_NAME_MAX_LEN + 1);
    assert_eq!(
        ExperimentName::parse(&long).expect_err("too long"),
        ParseError::TooLong("experimentName", EXPERIMENT_NAME_MAX_LEN)
    );
}

#[test]
fn parse_errors_name_the_offending_field() {
    let err = SessionId::parse("  ").expect_err("blank");
    assert_eq!(err.field(), "sessionId");
    assert_eq!(
        err.to_string(),
        "sessionId must not contain leading/trailing whitespace"
    );
    assert_eq!(VariantLabel::parse("").expect_err("empty").field(), "variant");
    assert_eq!(ExperimentId::parse("a/b").expect_err("slash").field(), "id");
}

#[test]
fn new_experiment_defaults_to_even_split() {
    let exp = NewExperiment::named(ExperimentName::parse("hero").expect("name"));
    assert_eq!(exp.traffic_split, TrafficSplit::default());
    assert_eq!(exp.traffic_split.percent(), 50);
    assert!(exp.target_pages.is_empty());
}

#[test]
fn assignment_serializes_camel_case_and_maps_arm() {
    let raw = r#"{
      "id":"a1",
      "experimentId":"e1",
      "sessionId":"session_1",
      "variant":"control",
      "hasConverted":false,
      "convertedAt":null,
      "createdAt":"2024-01-01T00:00:00Z",
      "updatedAt":"2024-01-01T00:00:00Z"
    }"#;
    let assignment: Assignment = serde_json::from_str(raw).expect("decode assignment");
    assert_eq!(assignment.arm(), Arm::Control);
    let encoded = serde_json::to_value(&assignment).expect("encode");
    assert_eq!(encoded["hasConverted"], false);
    assert_eq!(encoded["experimentId"], "e1");
}

#[test]
fn arm_serializes_lowercase() {
    assert_eq!(
        serde_json::to_string(&Arm::Variant).expect("encode"),
        "\"variant\""
    );
    assert_eq!(Arm::parse("control").expect("arm"), Arm::Control);
    assert!(Arm::parse("treatment").is_err());
}
