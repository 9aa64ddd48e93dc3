use crucible_di::ContainerError;
use std::error::Error;

#[test]
fn test_not_found_display() {
    let err = ContainerError::NotFound {
        name: "ghost".to_string(),
    };
    assert_eq!(err.to_string(), "no component descriptor found for 'ghost'");
}

#[test]
fn test_configuration_display_with_and_without_origin() {
    let bare = ContainerError::Configuration {
        name: "svc".to_string(),
        reason: "unknown scope".to_string(),
        origin: None,
    };
    assert_eq!(
        bare.to_string(),
        "invalid configuration for component 'svc': unknown scope"
    );

    let located = ContainerError::Configuration {
        name: "svc".to_string(),
        reason: "unknown scope".to_string(),
        origin: Some("app-context.toml".to_string()),
    };
    assert_eq!(
        located.to_string(),
        "invalid configuration for component 'svc' (defined in app-context.toml): unknown scope"
    );
}

#[test]
fn test_ambiguous_lists_candidates() {
    let err = ContainerError::Ambiguous {
        name: "pair".to_string(),
        candidates: vec!["Pair(Left, Right)".to_string(), "Pair(Right, Left)".to_string()],
    };
    assert_eq!(
        err.to_string(),
        "ambiguous executable match for component 'pair': Pair(Left, Right) | Pair(Right, Left)"
    );
}

#[test]
fn test_unsatisfied_appends_suppressed_causes() {
    let bare = ContainerError::Unsatisfied {
        name: "svc".to_string(),
        reason: "parameter 0: no value".to_string(),
        suppressed: Vec::new(),
    };
    assert_eq!(
        bare.to_string(),
        "could not resolve an executable for component 'svc': parameter 0: no value"
    );

    let with_suppressed = ContainerError::Unsatisfied {
        name: "svc".to_string(),
        reason: "parameter 0: no value".to_string(),
        suppressed: vec!["Svc(i64): parameter 0: cannot convert".to_string()],
    };
    assert_eq!(
        with_suppressed.to_string(),
        "could not resolve an executable for component 'svc': parameter 0: no value; \
         also tried: Svc(i64): parameter 0: cannot convert"
    );
}

#[test]
fn test_circular_path_rendering() {
    let err = ContainerError::CircularCreation {
        name: "a".to_string(),
        path: vec!["a".to_string(), "b".to_string(), "a".to_string()],
    };
    assert_eq!(err.to_string(), "circular creation of component 'a': a -> b -> a");
}

#[test]
fn test_creation_preserves_source() {
    let err = ContainerError::Creation {
        name: "db".to_string(),
        source: "connection refused".into(),
    };
    assert_eq!(
        err.to_string(),
        "error creating component 'db': connection refused"
    );
    assert!(err.source().is_some());
}

#[test]
fn test_producer_errors_distinguish_retryable() {
    let retryable = ContainerError::ProducerNotReady {
        name: "conn".to_string(),
    };
    assert_eq!(
        retryable.to_string(),
        "producer for component 'conn' has not produced its object yet"
    );

    let fatal = ContainerError::Producer {
        name: "conn".to_string(),
        source: "pool exhausted".into(),
    };
    assert_eq!(
        fatal.to_string(),
        "producer for component 'conn' failed: pool exhausted"
    );
    assert!(fatal.source().is_some());
}

#[test]
fn test_type_mismatch_display() {
    let err = ContainerError::TypeMismatch {
        expected: "i64".to_string(),
        actual: "String".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "cannot convert value of type 'String' to required type 'i64'"
    );
}
