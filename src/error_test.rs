use super::*;

#[test]
fn engine_errors_map_to_stable_codes() {
    let cases = [
        (EngineError::InvalidTimestamp { input: "x".into(), reason: "bad".into() }, "E_INVALID_TIMESTAMP"),
        (EngineError::TargetMissing("current-time".into()), "E_TARGET_MISSING"),
        (EngineError::CapabilityUnavailable { waited_ms: 10_000 }, "E_CAPABILITY_UNAVAILABLE"),
        (EngineError::Render(RenderError::new("detached")), "E_RENDER"),
    ];
    for (err, code) in cases {
        assert_eq!(err.error_code(), code);
    }
}

#[test]
fn target_missing_names_the_element() {
    let err = EngineError::TargetMissing("start-countdown".into());
    assert_eq!(err.to_string(), "display target #start-countdown is not present on this page");
}

#[test]
fn render_error_converts_into_engine_error() {
    let err: EngineError = RenderError::new("boom").into();
    assert!(matches!(err, EngineError::Render(ref inner) if inner.0 == "boom"));
}
