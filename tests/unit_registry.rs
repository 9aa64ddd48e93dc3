use crucible_di::{ContainerError, Instance, InstanceRegistry};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn test_get_or_create_commits_once() {
    let registry = InstanceRegistry::new();

    let created = registry
        .get_or_create_singleton("conn", || Ok(Arc::new(42u32) as Instance))
        .unwrap();
    let cached = registry
        .get_or_create_singleton("conn", || panic!("supplier must not run again"))
        .unwrap();

    assert!(Arc::ptr_eq(&created, &cached));
    assert!(registry.contains_singleton("conn"));
    assert_eq!(registry.singleton_names(), vec!["conn".to_string()]);
}

#[test]
fn test_early_reference_visible_during_creation() {
    let registry = InstanceRegistry::new();

    let committed = registry
        .get_or_create_singleton("conn", || {
            let raw: Instance = Arc::new("half-built".to_string());

            // The layer above registers an early reference mid-creation so a
            // dependent component can observe the in-progress singleton.
            let early = raw.clone();
            registry.register_early_supplier("conn", Box::new(move || early.clone()));

            assert!(registry.is_singleton_in_creation("conn"));
            let seen = registry
                .get_singleton("conn", true)
                .expect("early reference must be exposed");
            assert!(Arc::ptr_eq(&seen, &raw));

            // Without the early flag the reference stays hidden; the early
            // map already holds it after the first exposure.
            assert!(registry.get_singleton("conn", false).is_some());

            Ok(raw)
        })
        .unwrap();

    assert!(!registry.is_singleton_in_creation("conn"));
    let after = registry.get_singleton("conn", false).unwrap();
    assert!(Arc::ptr_eq(&after, &committed));
}

#[test]
fn test_reentrant_same_name_creation_is_circular() {
    let registry = InstanceRegistry::new();

    let result = registry.get_or_create_singleton("loop", || {
        registry.get_or_create_singleton("loop", || Ok(Arc::new(0u8) as Instance))
    });

    assert!(matches!(
        result,
        Err(ContainerError::CircularCreation { .. })
    ));
    // Cleanup ran: the name is no longer marked in-creation and may retry.
    assert!(!registry.is_singleton_in_creation("loop"));
    registry
        .get_or_create_singleton("loop", || Ok(Arc::new(0u8) as Instance))
        .unwrap();
}

#[test]
fn test_failure_purges_early_state() {
    let registry = InstanceRegistry::new();

    let result = registry.get_or_create_singleton("conn", || {
        let raw: Instance = Arc::new(1u8);
        registry.register_early_supplier("conn", Box::new(move || raw.clone()));
        Err(ContainerError::Creation {
            name: "conn".to_string(),
            source: "boom".into(),
        })
    });

    assert!(result.is_err());
    assert!(!registry.contains_singleton("conn"));
    assert!(registry.get_singleton("conn", true).is_none());
}

#[test]
fn test_registered_singleton_rejects_duplicates() {
    let registry = InstanceRegistry::new();

    registry
        .register_singleton("config", Arc::new("prod".to_string()) as Instance)
        .unwrap();
    assert!(registry
        .register_singleton("config", Arc::new("dev".to_string()) as Instance)
        .is_err());
}

#[test]
fn test_dependent_tracking_is_transitive() {
    let registry = InstanceRegistry::new();

    registry.register_dependent("a", "b"); // b depends on a
    registry.register_dependent("b", "c"); // c depends on b

    assert!(registry.is_dependent("a", "b"));
    assert!(registry.is_dependent("a", "c"));
    assert!(!registry.is_dependent("c", "a"));
}

#[test]
fn test_destruction_callbacks_run_in_reverse_order() {
    let registry = InstanceRegistry::new();
    let order = Arc::new(Mutex::new(Vec::<&'static str>::new()));

    registry
        .get_or_create_singleton("first", || Ok(Arc::new(1u8) as Instance))
        .unwrap();
    registry
        .get_or_create_singleton("second", || Ok(Arc::new(2u8) as Instance))
        .unwrap();

    let log = order.clone();
    registry.register_destruction_callback("first", Box::new(move || log.lock().unwrap().push("first")));
    let log = order.clone();
    registry.register_destruction_callback("second", Box::new(move || log.lock().unwrap().push("second")));

    registry.destroy_singletons();
    assert_eq!(*order.lock().unwrap(), vec!["second", "first"]);
    assert!(!registry.contains_singleton("first"));
    assert!(!registry.contains_singleton("second"));
}

#[test]
fn test_in_creation_flag_cleared_after_success_and_failure() {
    let registry = InstanceRegistry::new();
    let observed = Arc::new(AtomicU32::new(0));

    let seen = observed.clone();
    registry
        .get_or_create_singleton("x", || {
            if registry.is_singleton_in_creation("x") {
                seen.fetch_add(1, Ordering::SeqCst);
            }
            Ok(Arc::new(0u8) as Instance)
        })
        .unwrap();
    assert_eq!(observed.load(Ordering::SeqCst), 1);
    assert!(!registry.is_singleton_in_creation("x"));

    let _ = registry.get_or_create_singleton("y", || {
        Err(ContainerError::Creation {
            name: "y".to_string(),
            source: "nope".into(),
        })
    });
    assert!(!registry.is_singleton_in_creation("y"));
}
