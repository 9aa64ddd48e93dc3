use crucible_di::{
    as_producer, is_null_placeholder, BoxError, ComponentDescriptor, Container, ContainerError,
    Instance, MemoryDescriptorStore, ProducerHandle, Producer, ProductPostProcessor, TypeRef,
    TypeSpace,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct Connection {
    id: u32,
}

struct ConnectionFactory {
    produced: Arc<AtomicU32>,
    shared: bool,
    yields_nothing: bool,
    fails: bool,
    output: Option<TypeRef>,
}

impl Producer for ConnectionFactory {
    fn produce(&self) -> Result<Option<Instance>, BoxError> {
        if self.fails {
            return Err("connection pool exhausted".into());
        }
        let id = self.produced.fetch_add(1, Ordering::SeqCst);
        if self.yields_nothing {
            return Ok(None);
        }
        Ok(Some(Arc::new(Connection { id })))
    }

    fn output_type(&self) -> Option<TypeRef> {
        self.output
    }

    fn is_singleton(&self) -> bool {
        self.shared
    }
}

struct Fixture {
    produced: Arc<AtomicU32>,
    container: Container,
    t_connection: TypeRef,
}

fn fixture(configure: impl Fn(ComponentDescriptor) -> ComponentDescriptor, shared: bool, yields_nothing: bool, fails: bool, declare_output: bool) -> Fixture {
    let mut space = TypeSpace::new();
    let t_connection = space.register_rust::<Connection>("Connection");
    let t_factory = space.register_rust::<ProducerHandle>("ConnectionFactory");
    space.mark_producer(t_factory);

    let produced = Arc::new(AtomicU32::new(0));
    let counter = produced.clone();
    let output = if declare_output { Some(t_connection) } else { None };
    space.add_constructor(t_factory, &[], true, move |_| {
        Ok(ProducerHandle::instance(ConnectionFactory {
            produced: counter.clone(),
            shared,
            yields_nothing,
            fails,
            output,
        }))
    });

    struct Plain;
    let t_plain = space.register_rust::<Plain>("Plain");
    space.add_constructor(t_plain, &[], true, |_| Ok(Arc::new(Plain)));

    let store = MemoryDescriptorStore::new();
    store.register(configure(
        ComponentDescriptor::new("conn").with_type_name("ConnectionFactory"),
    ));
    store.register(ComponentDescriptor::new("plain").with_type_name("Plain"));

    let space = Arc::new(space);
    let container = Container::builder()
        .store(Arc::new(store))
        .introspector(space.clone())
        .strategy(space)
        .build();
    Fixture {
        produced,
        container,
        t_connection,
    }
}

#[test]
fn test_singleton_producer_output_is_cached() {
    let f = fixture(|d| d, true, false, false, false);

    let a = f.container.get("conn").unwrap();
    let b = f.container.get("conn").unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.downcast_ref::<Connection>().unwrap().id, 0);
    assert_eq!(f.produced.load(Ordering::SeqCst), 1);
}

#[test]
fn test_prefix_requests_the_producer_itself() {
    let f = fixture(|d| d, true, false, false, false);

    let handle = f.container.get("&conn").unwrap();
    assert!(as_producer(&handle).is_some());

    // Repeated markers collapse to the same producer.
    let again = f.container.get("&&conn").unwrap();
    assert!(Arc::ptr_eq(&handle, &again));

    // The producer was never asked to produce.
    assert_eq!(f.produced.load(Ordering::SeqCst), 0);
}

#[test]
fn test_non_singleton_producer_invoked_per_request() {
    let f = fixture(|d| d, false, false, false, false);

    let a = f.container.get("conn").unwrap();
    let b = f.container.get("conn").unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a.downcast_ref::<Connection>().unwrap().id, 0);
    assert_eq!(b.downcast_ref::<Connection>().unwrap().id, 1);
    assert_eq!(f.produced.load(Ordering::SeqCst), 2);
}

#[test]
fn test_empty_production_yields_null_placeholder() {
    let f = fixture(|d| d, true, true, false, false);

    let value = f.container.get("conn").unwrap();
    assert!(is_null_placeholder(&value));
}

#[test]
fn test_producer_failure_is_wrapped() {
    let f = fixture(|d| d, true, false, true, false);

    match f.container.get("conn") {
        Err(ContainerError::Producer { name, .. }) => assert_eq!(name, "conn"),
        other => panic!("expected Producer, got {:?}", other.map(|_| "instance")),
    }
}

#[test]
fn test_prefix_on_plain_component_is_a_configuration_error() {
    let f = fixture(|d| d, true, false, false, false);

    assert!(matches!(
        f.container.get("&plain"),
        Err(ContainerError::Configuration { .. })
    ));
}

#[test]
fn test_output_type_prefers_descriptor_metadata() {
    let f = fixture(
        |d| d.with_produced_type("Connection"),
        true,
        false,
        false,
        false,
    );

    let resolved = f.container.resolve_type("conn", false).unwrap();
    assert_eq!(resolved, Some(f.t_connection));
    // Metadata answered the query; the producer was never instantiated.
    assert!(!f.container.registry().contains_singleton("conn"));
}

#[test]
fn test_output_type_instantiates_producer_only_when_permitted() {
    let f = fixture(|d| d, true, false, false, true);

    assert_eq!(f.container.resolve_type("conn", false).unwrap(), None);
    assert!(!f.container.registry().contains_singleton("conn"));

    let resolved = f.container.resolve_type("conn", true).unwrap();
    assert_eq!(resolved, Some(f.t_connection));
    // Instantiated as a producer, but never asked to produce.
    assert_eq!(f.produced.load(Ordering::SeqCst), 0);
}

#[test]
fn test_prefixed_type_query_returns_producer_type() {
    let f = fixture(|d| d, true, false, false, false);

    let space_type = f.container.resolve_type("&conn", false).unwrap();
    assert!(space_type.is_some());
    assert_eq!(f.container.resolve_type("&plain", false).unwrap(), None);
}

#[test]
fn test_scope_queries_ask_the_producer() {
    let shared = fixture(|d| d, true, false, false, false);
    assert!(shared.container.is_singleton("conn").unwrap());
    assert!(shared.container.is_singleton("&conn").unwrap());
    assert!(!shared.container.is_prototype("conn").unwrap());

    let fresh = fixture(|d| d, false, false, false, false);
    assert!(!fresh.container.is_singleton("conn").unwrap());
    assert!(fresh.container.is_prototype("conn").unwrap());
    assert!(fresh.container.is_singleton("&conn").unwrap());
}

struct Tagging;

impl ProductPostProcessor for Tagging {
    fn post_process(&self, _name: &str, product: Instance) -> Result<Instance, BoxError> {
        let id = product.downcast_ref::<Connection>().unwrap().id;
        Ok(Arc::new(Connection { id: id + 100 }))
    }
}

#[test]
fn test_post_processing_applies_to_products() {
    let mut space = TypeSpace::new();
    space.register_rust::<Connection>("Connection");
    let t_factory = space.register_rust::<ProducerHandle>("ConnectionFactory");
    space.mark_producer(t_factory);

    let produced = Arc::new(AtomicU32::new(0));
    let counter = produced.clone();
    space.add_constructor(t_factory, &[], true, move |_| {
        Ok(ProducerHandle::instance(ConnectionFactory {
            produced: counter.clone(),
            shared: true,
            yields_nothing: false,
            fails: false,
            output: None,
        }))
    });

    let store = MemoryDescriptorStore::new();
    store.register(ComponentDescriptor::new("conn").with_type_name("ConnectionFactory"));
    // Synthetic components skip post-processing.
    store.register(
        ComponentDescriptor::new("raw-conn")
            .with_type_name("ConnectionFactory")
            .synthetic(),
    );

    let space = Arc::new(space);
    let container = Container::builder()
        .store(Arc::new(store))
        .introspector(space.clone())
        .strategy(space)
        .product_post_processor(Arc::new(Tagging))
        .build();

    let processed = container.get("conn").unwrap();
    assert_eq!(processed.downcast_ref::<Connection>().unwrap().id, 100);

    let unprocessed = container.get("raw-conn").unwrap();
    assert_eq!(unprocessed.downcast_ref::<Connection>().unwrap().id, 1);
}
