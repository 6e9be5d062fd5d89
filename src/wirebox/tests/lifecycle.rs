use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use wirebox::prelude::*;

#[derive(Debug, PartialEq)]
struct Config {
    url: &'static str,
}

#[derive(Debug)]
struct Session {
    context: u64,
}

/// The construction loop a resolver runs on top of the record contract:
/// resolve once per `(wrapper, context)` pair, wait instead of racing.
fn resolve<F>(wrapper: &InstanceWrapper, context: ContextId, factory: F) -> Instance
where
    F: Fn() -> Instance,
{
    loop {
        let record = wrapper.get_instance_by_context_id(context);
        match record.acquire() {
            Acquisition::Resolved(instance) => return instance,
            Acquisition::Pending(signal) => {
                signal.wait().expect("construction should complete");
            }
            Acquisition::Construct(_) => {
                let instance = factory();
                record.complete(instance.clone());
                return instance;
            }
        }
    }
}

#[test]
fn singleton_tree_is_resolved_once_and_shared_across_contexts() {
    let config = InstanceWrapper::new(WrapperSettings {
        name: "Config".into(),
        metatype: Some(Metatype::of::<Config>()),
        ..WrapperSettings::default()
    });
    let constructions = AtomicUsize::new(0);

    let first = resolve(&config, ContextId::new(2), || {
        constructions.fetch_add(1, Ordering::SeqCst);
        Arc::new(Config { url: "localhost" })
    });
    let second = resolve(&config, ContextId::new(3), || {
        constructions.fetch_add(1, Ordering::SeqCst);
        Arc::new(Config { url: "localhost" })
    });

    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));

    let value = first.downcast_arc::<Config>().expect("should be a Config");
    assert_eq!(value.url, "localhost");
}

#[test]
fn request_scoped_wrapper_materializes_per_context_instances() {
    let session = InstanceWrapper::new(WrapperSettings {
        name: "Session".into(),
        metatype: Some(Metatype::of::<Session>()),
        scope: Scope::Request,
        ..WrapperSettings::default()
    });

    let in_first = resolve(&session, ContextId::new(2), || {
        Arc::new(Session { context: 2 })
    });
    let in_second = resolve(&session, ContextId::new(3), || {
        Arc::new(Session { context: 3 })
    });

    assert!(!Arc::ptr_eq(&in_first, &in_second));
    let in_first = in_first.downcast_arc::<Session>().expect("should be a Session");
    let in_second = in_second
        .downcast_arc::<Session>()
        .expect("should be a Session");
    assert_eq!(in_first.context, 2);
    assert_eq!(in_second.context, 3);
}

#[test]
fn dependent_of_request_scoped_component_becomes_context_bound() {
    let config = Arc::new(InstanceWrapper::new(WrapperSettings {
        name: "Config".into(),
        metatype: Some(Metatype::of::<Config>()),
        ..WrapperSettings::default()
    }));
    let session = Arc::new(InstanceWrapper::new(WrapperSettings {
        name: "Session".into(),
        metatype: Some(Metatype::of::<Session>()),
        scope: Scope::Request,
        ..WrapperSettings::default()
    }));
    let controller = InstanceWrapper::new(WrapperSettings {
        name: "Controller".into(),
        inject: Some(vec![
            Box::new(token::of::<Config>()),
            Box::new(token::of::<Session>()),
        ]),
        ..WrapperSettings::default()
    });

    controller.add_ctor_metadata(0, config);
    assert!(controller.is_dependency_tree_static());

    controller.add_ctor_metadata(1, session);
    assert!(!controller.is_dependency_tree_static());

    let in_first = resolve(&controller, ContextId::new(2), || Arc::new("first"));
    let in_second = resolve(&controller, ContextId::new(3), || Arc::new("second"));
    assert!(!Arc::ptr_eq(&in_first, &in_second));

    // The static slot stays untouched by per-context resolution.
    assert!(controller.instance().is_none());
}

#[test]
fn context_teardown_discards_materialized_state() {
    let session = InstanceWrapper::new(WrapperSettings {
        name: "Session".into(),
        scope: Scope::Request,
        ..WrapperSettings::default()
    });
    let context = ContextId::new(2);

    let _ = resolve(&session, context, || Arc::new(Session { context: 2 }));
    assert!(session.resolved_instance(context).is_ok());

    let _ = session.remove_instance_by_context_id(context);
    assert!(matches!(
        session.resolved_instance(context),
        Err(ResolutionError::NotResolved { .. })
    ));
}

#[test]
fn concurrent_resolvers_construct_each_context_once() {
    const THREADS: usize = 4;

    let session = Arc::new(InstanceWrapper::new(WrapperSettings {
        name: "Session".into(),
        scope: Scope::Request,
        ..WrapperSettings::default()
    }));
    let constructions = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();

    for context_id in [2u64, 3u64] {
        for _ in 0..THREADS {
            let session = Arc::clone(&session);
            let constructions = Arc::clone(&constructions);
            handles.push(thread::spawn(move || {
                let instance = resolve(&session, ContextId::new(context_id), || {
                    constructions.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    Arc::new(Session {
                        context: context_id,
                    })
                });
                let session = instance.downcast_arc::<Session>().expect("should be a Session");
                assert_eq!(session.context, context_id);
            }));
        }
    }

    handles
        .into_iter()
        .for_each(|handle| handle.join().expect("each thread should not panic"));
    assert_eq!(constructions.load(Ordering::SeqCst), 2);
}
