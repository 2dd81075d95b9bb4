use super::*;

#[test]
fn defaults_enable_change_detection() {
    let cfg = SessionConfig::default();
    assert!(cfg.change_detection);
    assert!(cfg.flip_y);
    assert_eq!(cfg.default_generator.to_string(), "synth/noise");
    assert_eq!(cfg.generator_namespaces, vec!["synth".to_string()]);
}

#[test]
fn partial_json_keeps_defaults() {
    let cfg = SessionConfig::from_json_str(r#"{ "change_detection": false }"#).unwrap();
    assert!(!cfg.change_detection);
    assert!(cfg.flip_y);

    let cfg = SessionConfig::from_json_str(r#"{ "default_generator": "synth/osc" }"#).unwrap();
    assert_eq!(cfg.default_generator.to_string(), "synth/osc");
}

#[test]
fn rejects_unknown_keys_and_bad_ids() {
    assert!(SessionConfig::from_json_str(r#"{ "nope": 1 }"#).is_err());
    assert!(SessionConfig::from_json_str(r#"{ "default_generator": "noise" }"#).is_err());
}
