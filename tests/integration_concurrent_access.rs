/// Concurrent access integration tests.
///
/// These verify the container's behavior under concurrent resolution:
/// singleton uniqueness across racing threads, merge-cache consistency, and
/// producer-output caching under contention.
use crucible_di::{
    BoxError, ComponentDescriptor, Container, Instance, MemoryDescriptorStore, Producer,
    ProducerHandle, ScopeKind, TypeSpace,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

struct SharedResource {
    creator: String,
}

struct WorkItem;

struct PoolFactory {
    produced: Arc<AtomicU32>,
}

impl Producer for PoolFactory {
    fn produce(&self) -> Result<Option<Instance>, BoxError> {
        self.produced.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Arc::new(WorkItem)))
    }
}

fn build_container(constructions: Arc<AtomicU32>, produced: Arc<AtomicU32>) -> Container {
    let mut space = TypeSpace::new();
    let t_shared = space.register_rust::<SharedResource>("SharedResource");
    let t_work = space.register_rust::<WorkItem>("WorkItem");
    let t_pool = space.register_rust::<ProducerHandle>("PoolFactory");
    space.mark_producer(t_pool);

    space.add_constructor(t_shared, &[], true, move |_| {
        constructions.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(SharedResource {
            creator: format!("{:?}", thread::current().id()),
        }))
    });
    space.add_constructor(t_work, &[], true, |_| Ok(Arc::new(WorkItem)));
    space.add_constructor(t_pool, &[], true, move |_| {
        Ok(ProducerHandle::instance(PoolFactory {
            produced: produced.clone(),
        }))
    });

    let store = MemoryDescriptorStore::new();
    store.register(ComponentDescriptor::new("shared").with_type_name("SharedResource"));
    store.register(
        ComponentDescriptor::new("work")
            .with_type_name("WorkItem")
            .with_scope(ScopeKind::Prototype),
    );
    store.register(ComponentDescriptor::new("pool").with_type_name("PoolFactory"));

    let space = Arc::new(space);
    Container::builder()
        .store(Arc::new(store))
        .introspector(space.clone())
        .strategy(space)
        .build()
}

#[test]
fn test_concurrent_singleton_resolution_constructs_once() {
    let _ = tracing_subscriber::fmt::try_init();
    let constructions = Arc::new(AtomicU32::new(0));
    let container = Arc::new(build_container(constructions.clone(), Arc::new(AtomicU32::new(0))));

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.get("shared").unwrap()
            })
        })
        .collect();

    let instances: Vec<Instance> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    for instance in &instances[1..] {
        assert!(Arc::ptr_eq(&instances[0], instance));
    }
    // Exactly one thread's construction won; its identity is coherent.
    assert!(!instances[0]
        .downcast_ref::<SharedResource>()
        .unwrap()
        .creator
        .is_empty());
}

#[test]
fn test_concurrent_prototypes_stay_independent() {
    let container = build_container(Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0)));

    let mut all: Vec<Instance> = Vec::new();
    crossbeam_utils::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let container = &container;
                scope.spawn(move |_| {
                    (0..8)
                        .map(|_| container.get("work").unwrap())
                        .collect::<Vec<Instance>>()
                })
            })
            .collect();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
    })
    .unwrap();

    assert_eq!(all.len(), 32);
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            assert!(!Arc::ptr_eq(a, b));
        }
    }
}

#[test]
fn test_concurrent_merge_recompute_converges() {
    let container = Arc::new(build_container(
        Arc::new(AtomicU32::new(0)),
        Arc::new(AtomicU32::new(0)),
    ));

    container.merged_descriptor("shared").unwrap();
    container.mark_stale("shared");

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.merged_descriptor("shared").unwrap().generation()
            })
        })
        .collect();

    let generations: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // One recompute wins; every thread observes the same generation.
    for generation in &generations[1..] {
        assert_eq!(generations[0], *generation);
    }
}

#[test]
fn test_concurrent_producer_unwrap_caches_single_product() {
    let produced = Arc::new(AtomicU32::new(0));
    let container = Arc::new(build_container(Arc::new(AtomicU32::new(0)), produced.clone()));

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.get("pool").unwrap()
            })
        })
        .collect();

    let products: Vec<Instance> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(produced.load(Ordering::SeqCst), 1);
    for product in &products[1..] {
        assert!(Arc::ptr_eq(&products[0], product));
    }
}
