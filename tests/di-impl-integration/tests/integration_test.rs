//! 服务注册端到端集成测试：插件加载、覆盖、卸载与并发解析

use di_abstractions::{ConstructionContext, LambdaConstructor, ServiceConstructor, ServiceResolverExt};
use di_impl::{ImplementationCatalog, SlotState};
use infrastructure_common::{
    DependencyError, HeavyProcessLatch, PluginId, Service, ServiceDescriptor, ServiceInstance,
};
use infrastructure_composition::ServiceHost;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

/// 测试服务
#[derive(Debug)]
struct Greeter {
    greeting: &'static str,
}

impl Service for Greeter {}

fn greeter(greeting: &'static str, counter: &Arc<AtomicUsize>) -> Arc<dyn ServiceConstructor> {
    let counter = Arc::clone(counter);
    Arc::new(LambdaConstructor::new(move |_: &ConstructionContext<'_>| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Greeter { greeting }) as ServiceInstance)
    }))
}

struct Plugins {
    catalog: Arc<ImplementationCatalog>,
    constructions: Arc<AtomicUsize>,
}

fn plugins() -> Plugins {
    let constructions = Arc::new(AtomicUsize::new(0));
    let catalog = Arc::new(ImplementationCatalog::new());
    catalog.register("CoreGreeter", greeter("hello", &constructions));
    catalog.register_for_plugin("polite", "PoliteGreeter", greeter("good day", &constructions));
    Plugins {
        catalog,
        constructions,
    }
}

fn build_host(plugins: &Plugins) -> anyhow::Result<ServiceHost> {
    let host = ServiceHost::builder()
        .with_factory(plugins.catalog.clone())
        .with_latch(Arc::new(HeavyProcessLatch::new()))
        .build()?;
    Ok(host)
}

#[test]
fn test_plugin_override_lifecycle() -> anyhow::Result<()> {
    let plugins = plugins();
    let host = build_host(&plugins)?;
    let points = host.application_services();

    points.register_extension(ServiceDescriptor::new("Greeter", "CoreGreeter"))?;
    assert_eq!(host.application().resolve_as::<Greeter>("Greeter")?.greeting, "hello");

    // 插件加载：覆盖核心实现，实现在插件自己的加载上下文中查找
    points.register_extension(
        ServiceDescriptor::new("Greeter", "PoliteGreeter")
            .overriding()
            .with_origin("polite"),
    )?;
    assert_eq!(
        host.application().registry().slot_state("Greeter"),
        Some(SlotState::Unbuilt)
    );
    assert_eq!(host.application().resolve_as::<Greeter>("Greeter")?.greeting, "good day");

    // 插件卸载
    let polite = PluginId::new("polite");
    assert_eq!(points.unregister_plugin(&polite), 1);
    assert_eq!(plugins.catalog.unregister_plugin(&polite), 1);
    assert!(matches!(
        host.resolve("Greeter"),
        Err(DependencyError::UnregisteredService { .. })
    ));
    assert_eq!(plugins.constructions.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_plugin_implementation_invisible_to_core_descriptor() -> anyhow::Result<()> {
    let plugins = plugins();
    let host = build_host(&plugins)?;
    host.application_services()
        .register_extension(ServiceDescriptor::new("Greeter", "PoliteGreeter"))?;

    for _ in 0..2 {
        assert!(matches!(
            host.resolve("Greeter"),
            Err(DependencyError::ImplementationNotFound { .. })
        ));
    }
    assert_eq!(plugins.constructions.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn test_concurrent_resolution_during_plugin_churn() -> anyhow::Result<()> {
    let plugins = plugins();
    let host = Arc::new(build_host(&plugins)?);
    host.application_services()
        .register_extension(ServiceDescriptor::new("Greeter", "CoreGreeter"))?;

    let barrier = Arc::new(Barrier::new(9));
    let resolvers: Vec<_> = (0..8)
        .map(|_| {
            let host = Arc::clone(&host);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                (0..50)
                    .map(|_| match host.application().resolve_as::<Greeter>("Greeter") {
                        Ok(greeter) => Ok(greeter.greeting),
                        Err(DependencyError::UnregisteredService { .. }) => Ok("unbound"),
                        Err(e) => Err(e),
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
        })
        .collect();

    let loader = {
        let host = Arc::clone(&host);
        let barrier = Arc::clone(&barrier);
        std::thread::spawn(move || -> Result<(), DependencyError> {
            barrier.wait();
            let polite = PluginId::new("polite");
            let core = ServiceDescriptor::new("Greeter", "CoreGreeter");
            for _ in 0..10 {
                host.application_services().register_extension(
                    ServiceDescriptor::new("Greeter", "PoliteGreeter")
                        .overriding()
                        .with_origin("polite"),
                )?;
                host.application_services().unregister_plugin(&polite);
                host.application_services().unregister_extension(&core);
                host.application_services().register_extension(core.clone())?;
            }
            Ok(())
        })
    };

    loader
        .join()
        .map_err(|_| anyhow::anyhow!("加载线程 panic"))??;
    for resolver in resolvers {
        let observed = resolver
            .join()
            .map_err(|_| anyhow::anyhow!("解析线程 panic"))??;
        // 解析只会看到完整的旧绑定、新绑定或没有绑定
        assert!(observed
            .iter()
            .all(|greeting| ["hello", "good day", "unbound"].contains(greeting)));
    }

    assert_eq!(host.application().list_descriptors().len(), 1);
    assert_eq!(host.application().resolve_as::<Greeter>("Greeter")?.greeting, "hello");
    Ok(())
}

#[tokio::test]
async fn test_resolve_async_from_runtime() -> anyhow::Result<()> {
    let plugins = plugins();
    let host = build_host(&plugins)?;
    host.application_services()
        .register_extension(ServiceDescriptor::new("Greeter", "CoreGreeter"))?;

    let registry = Arc::clone(host.application().registry());
    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.resolve_async("Greeter").await })
        })
        .collect();

    let mut instances = Vec::new();
    for task in tasks {
        instances.push(task.await??);
    }
    assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    assert_eq!(plugins.constructions.load(Ordering::SeqCst), 1);
    Ok(())
}
