use crate::{FlattenConfig, InvalidPointerPolicy};

#[test]
fn defaults() {
    let config = FlattenConfig::default();

    assert_eq!(config.max_size, 256 * 1024 * 1024);
    assert_eq!(config.max_string_len, 1024 * 1024);
    assert_eq!(config.max_container_len, 1 << 20);
    assert_eq!(config.invalid_pointers, InvalidPointerPolicy::Abort);
}

#[test]
fn partial_json_keeps_defaults() {
    let config: FlattenConfig =
        serde_json::from_str(r#"{"max_size": 4096, "invalid_pointers": "treat_as_null"}"#).unwrap();

    assert_eq!(
        config,
        FlattenConfig::default()
            .max_size(4096)
            .invalid_pointers(InvalidPointerPolicy::TreatAsNull)
    );
}

#[test]
fn unknown_keys_rejected() {
    let err = serde_json::from_str::<FlattenConfig>(r#"{"max_sise": 1}"#).unwrap_err();
    assert!(err.to_string().contains("unknown field `max_sise`"));
}
