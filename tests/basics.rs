use crucible_di::{
    ArgumentDef, ComponentDescriptor, Container, ContainerError, MemoryDescriptorStore, ScopeKind,
    TypeSpace,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct Database {
    url: String,
}

struct AuditLog {
    id: u32,
}

fn build_container() -> Container {
    let mut space = TypeSpace::new();
    let t_string = space.register_rust::<String>("String");
    let t_db = space.register_rust::<Database>("Database");
    let t_log = space.register_rust::<AuditLog>("AuditLog");

    space.add_constructor(t_db, &[t_string], true, |args| {
        Ok(Arc::new(Database {
            url: args[0].downcast_ref::<String>().cloned().unwrap(),
        }))
    });
    let next_id = Arc::new(AtomicU32::new(0));
    space.add_constructor(t_log, &[], true, move |_| {
        Ok(Arc::new(AuditLog {
            id: next_id.fetch_add(1, Ordering::SeqCst),
        }))
    });

    let store = MemoryDescriptorStore::new();
    store.register(
        ComponentDescriptor::new("db")
            .with_type_name("Database")
            .with_indexed_arg(0, ArgumentDef::value(Arc::new("postgres://localhost".to_string()))),
    );
    store.register(
        ComponentDescriptor::new("audit")
            .with_type_name("AuditLog")
            .with_scope(ScopeKind::Prototype),
    );
    store.register(
        ComponentDescriptor::new("template")
            .with_type_name("AuditLog")
            .abstract_template(),
    );

    let space = Arc::new(space);
    Container::builder()
        .store(Arc::new(store))
        .introspector(space.clone())
        .strategy(space)
        .build()
}

#[test]
fn test_singleton_identity() {
    let container = build_container();

    let a = container.get("db").unwrap();
    let b = container.get("db").unwrap();

    assert!(Arc::ptr_eq(&a, &b)); // Same instance
    assert_eq!(a.downcast_ref::<Database>().unwrap().url, "postgres://localhost");
}

#[test]
fn test_prototype_creates_new_instances() {
    let container = build_container();

    let a = container.get("audit").unwrap();
    let b = container.get("audit").unwrap();
    let c = container.get("audit").unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&b, &c));

    let ids: Vec<u32> = [&a, &b, &c]
        .iter()
        .map(|i| i.downcast_ref::<AuditLog>().unwrap().id)
        .collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn test_unknown_name_not_found() {
    let container = build_container();

    match container.get("missing") {
        Err(ContainerError::NotFound { name }) => assert_eq!(name, "missing"),
        other => panic!("expected NotFound, got {:?}", other.map(|_| "instance")),
    }
}

#[test]
fn test_abstract_descriptor_cannot_be_requested() {
    let container = build_container();

    match container.get("template") {
        Err(ContainerError::Configuration { name, .. }) => assert_eq!(name, "template"),
        other => panic!("expected Configuration, got {:?}", other.map(|_| "instance")),
    }
}

#[test]
fn test_contains_and_scope_queries() {
    let container = build_container();

    assert!(container.contains("db"));
    assert!(!container.contains("missing"));
    assert!(container.is_singleton("db").unwrap());
    assert!(!container.is_prototype("db").unwrap());
    assert!(container.is_prototype("audit").unwrap());
    assert!(!container.is_singleton("audit").unwrap());
}

#[test]
fn test_explicit_args_used_only_for_first_creation() {
    let container = build_container();

    let args: Vec<crucible_di::Instance> = vec![Arc::new("mysql://remote".to_string())];
    let first = container.get_with_args("db", &args).unwrap();
    assert_eq!(first.downcast_ref::<Database>().unwrap().url, "mysql://remote");

    // The committed singleton wins over later explicit arguments.
    let again = container
        .get_with_args("db", &[Arc::new("ignored".to_string()) as crucible_di::Instance])
        .unwrap();
    assert!(Arc::ptr_eq(&first, &again));
}

#[test]
fn test_parent_container_delegation() {
    let parent = Arc::new(build_container());
    let empty_store = MemoryDescriptorStore::new();

    let mut space = TypeSpace::new();
    space.register_rust::<String>("String");
    let space = Arc::new(space);

    let child = Container::builder()
        .store(Arc::new(empty_store))
        .introspector(space.clone())
        .strategy(space)
        .parent(parent.clone())
        .build();

    let from_child = child.get("db").unwrap();
    let from_parent = parent.get("db").unwrap();
    assert!(Arc::ptr_eq(&from_child, &from_parent));
    assert!(child.contains("db"));
}

#[test]
fn test_prewarm_materializes_non_lazy_singletons() {
    let mut space = TypeSpace::new();
    let t_db = space.register_rust::<Database>("Database");
    let warmed = Arc::new(AtomicU32::new(0));
    let counter = warmed.clone();
    space.add_constructor(t_db, &[], true, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Database {
            url: "eager".to_string(),
        }))
    });

    let store = MemoryDescriptorStore::new();
    store.register(ComponentDescriptor::new("eager").with_type_name("Database"));
    store.register(ComponentDescriptor::new("later").with_type_name("Database").lazy());

    let space = Arc::new(space);
    let container = Container::builder()
        .store(Arc::new(store))
        .introspector(space.clone())
        .strategy(space)
        .build();

    container.prewarm().unwrap();
    assert_eq!(warmed.load(Ordering::SeqCst), 1);
    assert!(container.registry().contains_singleton("eager"));
    assert!(!container.registry().contains_singleton("later"));
}
