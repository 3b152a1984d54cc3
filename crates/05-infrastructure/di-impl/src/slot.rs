//! 单例槽位
//!
//! 每个接口键一个槽位，首次解析时构造并缓存唯一实例。
//! 状态只沿 未构造 → 构造中 → 已构造 前进一次；绑定变更时创建新槽位，状态从不复用。

use crate::environment::ServiceEnvironment;
use chrono::{DateTime, Utc};
use di_abstractions::{ConstructionContext, ResolutionChain, ServiceConstructor, ServiceResolver};
use infrastructure_common::{
    DependencyError, DependencyResult, NodeId, ServiceDescriptor, ServiceInstance,
};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// 槽位构造状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// 未构造
    Unbuilt,
    /// 构造中
    Building,
    /// 已构造
    Built,
}

impl SlotState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Unbuilt => 0,
            Self::Building => 1,
            Self::Built => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Building,
            2 => Self::Built,
            _ => Self::Unbuilt,
        }
    }
}

/// 实现查找失败，缓存在槽位上不再重试
#[derive(Debug, Clone)]
struct LookupFailure {
    origin: String,
    message: String,
}

/// 单例槽位
pub struct SingletonSlot {
    descriptor: ServiceDescriptor,
    environment: Arc<ServiceEnvironment>,
    /// 已发布的实例，读取无需加锁
    instance: OnceCell<ServiceInstance>,
    /// 槽位级构造互斥，不同槽位互不阻塞
    construction: Mutex<()>,
    state: AtomicU8,
    delegate: OnceCell<Result<Arc<dyn ServiceConstructor>, LookupFailure>>,
    attempts: AtomicUsize,
    built_at: OnceCell<DateTime<Utc>>,
}

impl SingletonSlot {
    /// 为描述符创建未构造的槽位
    pub fn new(descriptor: ServiceDescriptor, environment: Arc<ServiceEnvironment>) -> Self {
        Self {
            descriptor,
            environment,
            instance: OnceCell::new(),
            construction: Mutex::new(()),
            state: AtomicU8::new(SlotState::Unbuilt.as_u8()),
            delegate: OnceCell::new(),
            attempts: AtomicUsize::new(0),
            built_at: OnceCell::new(),
        }
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> SlotState {
        SlotState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// 构造尝试次数（含失败）
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at.get().copied()
    }

    /// 已构造的实例，不触发构造
    pub fn instance(&self) -> Option<ServiceInstance> {
        self.instance.get().cloned()
    }

    /// 获取实例，首次调用时构造
    ///
    /// 同一槽位的并发调用者阻塞到构造结束并观察到同一结果；
    /// 构造失败后槽位回到未构造状态，下一次调用从头重试。
    pub fn get_or_build(&self, resolver: &dyn ServiceResolver) -> DependencyResult<ServiceInstance> {
        if let Some(instance) = self.instance.get() {
            return Ok(Arc::clone(instance));
        }

        let key = self.descriptor.interface_key();
        let _frame = if self.environment.config().detect_cycles {
            Some(ResolutionChain::enter(self as *const Self as usize, key)?)
        } else {
            None
        };

        let _construction = self.construction.lock();
        if let Some(instance) = self.instance.get() {
            return Ok(Arc::clone(instance));
        }

        let constructor = self.constructor()?;

        let state = BuildingState::enter(&self.state);
        let _heavy = self.environment.latch().process_started(key);
        self.attempts.fetch_add(1, Ordering::Relaxed);
        debug!("开始构造服务: {}", self.descriptor);
        let started = Instant::now();

        let instance = match self.build(constructor.as_ref(), resolver) {
            Ok(instance) => instance,
            Err(e) => {
                error!("服务构造失败: {}, 原因: {}", key, e);
                return Err(e);
            }
        };

        // 持有构造锁，set 不会失败
        let _ = self.instance.set(Arc::clone(&instance));
        let _ = self.built_at.set(Utc::now());
        state.commit();

        let elapsed = started.elapsed();
        if elapsed >= self.environment.config().slow_construction_threshold() {
            warn!("服务构造耗时过长: {} ({:?})", key, elapsed);
        }
        info!("服务已构造: {} -> {}", key, self.descriptor.implementation_key());
        Ok(instance)
    }

    /// 检查实现可查找，且声明的依赖都已绑定，不触发构造
    pub fn verify(&self, resolver: &dyn ServiceResolver) -> DependencyResult<()> {
        let constructor = self.constructor()?;
        for dependency in constructor.dependencies() {
            if !resolver.is_registered(&dependency) {
                return Err(DependencyError::unregistered(dependency));
            }
        }
        Ok(())
    }

    fn constructor(&self) -> DependencyResult<Arc<dyn ServiceConstructor>> {
        let delegate = self.delegate.get_or_init(|| {
            self.environment
                .factory()
                .lookup(self.descriptor.implementation_key(), self.descriptor.origin())
                .map_err(|e| {
                    warn!("实现查找失败: {}", e);
                    let message = match e {
                        DependencyError::ImplementationNotFound { message, .. } => message,
                        other => other.to_string(),
                    };
                    LookupFailure {
                        origin: self.descriptor.origin_label().to_string(),
                        message,
                    }
                })
        });

        delegate
            .as_ref()
            .map(Arc::clone)
            .map_err(|failure| DependencyError::ImplementationNotFound {
                implementation_key: self.descriptor.implementation_key().to_string(),
                origin: failure.origin.clone(),
                message: failure.message.clone(),
            })
    }

    fn build(
        &self,
        constructor: &dyn ServiceConstructor,
        resolver: &dyn ServiceResolver,
    ) -> DependencyResult<ServiceInstance> {
        let key = self.descriptor.interface_key();
        let implementation = self.descriptor.implementation_key();

        let context = ConstructionContext::new(&self.descriptor, resolver);
        let instance = constructor
            .construct(&context)
            .map_err(|source| DependencyError::construction_failed(key, implementation, source))?;

        // 先挂到销毁树，再发布
        let node = self.track_disposable(&instance)?;

        if let Err(source) = instance.initialize() {
            if let Some(node) = node {
                self.environment.disposer().dispose(node);
            }
            return Err(DependencyError::construction_failed(key, implementation, source));
        }

        Ok(instance)
    }

    fn track_disposable(&self, instance: &ServiceInstance) -> DependencyResult<Option<NodeId>> {
        let Some(disposable) = Arc::clone(instance).disposable() else {
            return Ok(None);
        };

        let key = self.descriptor.interface_key();
        match self
            .environment
            .disposer()
            .register(self.environment.scope_node(), &disposable, key)
        {
            Ok(node) => Ok(Some(node)),
            Err(source) => {
                // 未被跟踪的实例立即销毁
                disposable.dispose();
                Err(DependencyError::ScopeDisposed {
                    interface_key: key.to_string(),
                    source,
                })
            }
        }
    }
}

impl fmt::Debug for SingletonSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonSlot")
            .field("descriptor", &self.descriptor)
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .finish()
    }
}

/// 构造中状态守卫，未提交时（失败或 panic）回到未构造
struct BuildingState<'a> {
    state: &'a AtomicU8,
    committed: bool,
}

impl<'a> BuildingState<'a> {
    fn enter(state: &'a AtomicU8) -> Self {
        state.store(SlotState::Building.as_u8(), Ordering::Release);
        Self {
            state,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.state.store(SlotState::Built.as_u8(), Ordering::Release);
        self.committed = true;
    }
}

impl Drop for BuildingState<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.state.store(SlotState::Unbuilt.as_u8(), Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ImplementationCatalog;
    use infrastructure_common::{
        BoxError, DisposalTree, Disposable, HeavyProcessLatch, Service, ServiceDescriptor,
    };
    use std::sync::atomic::AtomicBool;

    /// 不提供依赖的解析器
    struct NoDependencies;

    impl ServiceResolver for NoDependencies {
        fn resolve(&self, interface_key: &str) -> DependencyResult<ServiceInstance> {
            Err(DependencyError::unregistered(interface_key))
        }

        fn is_registered(&self, _interface_key: &str) -> bool {
            false
        }

        fn list_descriptors(&self) -> Vec<ServiceDescriptor> {
            Vec::new()
        }
    }

    #[derive(Debug, Default)]
    struct Handle {
        closed: AtomicBool,
    }

    impl Service for Handle {
        fn disposable(self: Arc<Self>) -> Option<Arc<dyn Disposable>> {
            Some(self)
        }
    }

    impl Disposable for Handle {
        fn dispose(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Debug)]
    struct RejectsInit;

    impl Service for RejectsInit {
        fn initialize(&self) -> Result<(), BoxError> {
            Err("初始化失败".into())
        }

        fn disposable(self: Arc<Self>) -> Option<Arc<dyn Disposable>> {
            Some(self)
        }
    }

    impl Disposable for RejectsInit {
        fn dispose(&self) {}
    }

    fn environment(catalog: ImplementationCatalog) -> (Arc<ServiceEnvironment>, Arc<DisposalTree>) {
        let tree = Arc::new(DisposalTree::new());
        let scope = tree.create_scope(tree.root(), "test").unwrap();
        let environment = ServiceEnvironment::new(Arc::new(catalog), Arc::clone(&tree), scope);
        (Arc::new(environment), tree)
    }

    #[test]
    fn test_build_once_and_publish() {
        let catalog = ImplementationCatalog::new();
        catalog.register_fn("HandleImpl", |_| Ok(Arc::new(Handle::default()) as ServiceInstance));
        let (environment, _tree) = environment(catalog);

        let slot = SingletonSlot::new(ServiceDescriptor::new("Handle", "HandleImpl"), environment);
        assert_eq!(slot.state(), SlotState::Unbuilt);
        assert!(slot.instance().is_none());

        let first = slot.get_or_build(&NoDependencies).unwrap();
        let second = slot.get_or_build(&NoDependencies).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(slot.state(), SlotState::Built);
        assert_eq!(slot.attempts(), 1);
        assert!(slot.built_at().is_some());
    }

    #[test]
    fn test_lookup_failure_is_cached() {
        let (environment, _tree) = environment(ImplementationCatalog::new());
        let slot = SingletonSlot::new(ServiceDescriptor::new("Missing", "NoSuchImpl"), environment);

        for _ in 0..2 {
            assert!(matches!(
                slot.get_or_build(&NoDependencies),
                Err(DependencyError::ImplementationNotFound { .. })
            ));
        }
        assert_eq!(slot.attempts(), 0);
        assert_eq!(slot.state(), SlotState::Unbuilt);
    }

    #[test]
    fn test_disposable_registered_with_scope() {
        let catalog = ImplementationCatalog::new();
        catalog.register_fn("HandleImpl", |_| Ok(Arc::new(Handle::default()) as ServiceInstance));
        let (environment, tree) = environment(catalog);
        let scope = environment.scope_node();

        let slot = SingletonSlot::new(ServiceDescriptor::new("Handle", "HandleImpl"), environment);
        let instance = slot.get_or_build(&NoDependencies).unwrap();
        assert_eq!(tree.children(scope).len(), 1);

        assert_eq!(tree.dispose(scope), 1);
        let handle = infrastructure_common::downcast_service::<Handle>(&instance).unwrap();
        assert!(handle.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_disposed_scope_rejects_and_disposes_instance() {
        let created = Arc::new(Handle::default());
        let catalog = ImplementationCatalog::new();
        {
            let created = Arc::clone(&created);
            catalog.register_fn("HandleImpl", move |_| Ok(Arc::clone(&created) as ServiceInstance));
        }
        let (environment, tree) = environment(catalog);
        tree.dispose(environment.scope_node());

        let slot = SingletonSlot::new(ServiceDescriptor::new("Handle", "HandleImpl"), environment);
        assert!(matches!(
            slot.get_or_build(&NoDependencies),
            Err(DependencyError::ScopeDisposed { .. })
        ));
        assert!(created.closed.load(Ordering::SeqCst));
        assert_eq!(slot.state(), SlotState::Unbuilt);
    }

    #[test]
    fn test_initialize_failure_detaches_from_tree() {
        let catalog = ImplementationCatalog::new();
        catalog.register_fn("RejectsInitImpl", |_| Ok(Arc::new(RejectsInit) as ServiceInstance));
        let (environment, tree) = environment(catalog);
        let scope = environment.scope_node();

        let slot = SingletonSlot::new(ServiceDescriptor::new("Svc", "RejectsInitImpl"), environment);
        assert!(matches!(
            slot.get_or_build(&NoDependencies),
            Err(DependencyError::ConstructionFailed { .. })
        ));
        assert!(tree.children(scope).is_empty());
        assert_eq!(slot.state(), SlotState::Unbuilt);
    }

    #[test]
    fn test_latch_held_during_construction() {
        let latch = Arc::new(HeavyProcessLatch::new());
        let observed = Arc::new(AtomicBool::new(false));
        let catalog = ImplementationCatalog::new();
        {
            let latch = Arc::clone(&latch);
            let observed = Arc::clone(&observed);
            catalog.register_fn("HandleImpl", move |_| {
                observed.store(latch.is_running(), Ordering::SeqCst);
                Ok(Arc::new(Handle::default()) as ServiceInstance)
            });
        }
        let tree = Arc::new(DisposalTree::new());
        let environment = ServiceEnvironment::new(Arc::new(catalog), Arc::clone(&tree), tree.root())
            .with_latch(Arc::clone(&latch));

        let slot = SingletonSlot::new(
            ServiceDescriptor::new("Handle", "HandleImpl"),
            Arc::new(environment),
        );
        slot.get_or_build(&NoDependencies).unwrap();
        assert!(observed.load(Ordering::SeqCst));
        assert!(!latch.is_running());
    }
}
