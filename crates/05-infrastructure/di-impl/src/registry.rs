//! 服务注册表
//!
//! 接口键 → 当前槽位 的映射。所有变更在同一把写锁下串行化，
//! 解析只在读锁下取出槽位，随后在槽位自己的互斥域内构造。

use crate::environment::ServiceEnvironment;
use crate::slot::{SingletonSlot, SlotState};
use di_abstractions::ServiceResolver;
use infrastructure_common::{
    DependencyError, DependencyResult, ServiceDescriptor, ServiceInstance, ServiceScope,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 服务注册表
pub struct ServiceRegistry {
    scope: ServiceScope,
    slots: RwLock<HashMap<String, Arc<SingletonSlot>>>,
    environment: Arc<ServiceEnvironment>,
    /// 构造期依赖查找的回退注册表
    parent: Option<Arc<ServiceRegistry>>,
}

impl ServiceRegistry {
    /// 创建空注册表
    pub fn new(scope: ServiceScope, environment: ServiceEnvironment) -> Self {
        Self {
            scope,
            slots: RwLock::new(HashMap::new()),
            environment: Arc::new(environment),
            parent: None,
        }
    }

    /// 设置父注册表
    ///
    /// 只影响构造期依赖查找，公开的 [`resolve`](Self::resolve) 不回退。
    pub fn with_parent(mut self, parent: Arc<ServiceRegistry>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn scope(&self) -> &ServiceScope {
        &self.scope
    }

    pub fn environment(&self) -> &ServiceEnvironment {
        &self.environment
    }

    pub fn parent(&self) -> Option<&Arc<ServiceRegistry>> {
        self.parent.as_ref()
    }

    /// 安装描述符
    ///
    /// 非覆盖描述符遇到已有绑定时返回 [`DependencyError::DuplicateBinding`]；
    /// 覆盖描述符没有目标时返回 [`DependencyError::NothingToOverride`]。
    /// 失败时注册表保持不变。覆盖总是安装新的未构造槽位。
    pub fn install(&self, descriptor: ServiceDescriptor) -> DependencyResult<()> {
        let key = descriptor.interface_key().to_string();
        let mut slots = self.slots.write();

        if descriptor.overrides() {
            let Some(previous) = slots.remove(&key) else {
                warn!("[{}] 覆盖目标不存在: {}", self.scope, descriptor);
                return Err(DependencyError::NothingToOverride { interface_key: key });
            };
            info!(
                "[{}] 覆盖服务 {}: {} -> {} (plugin={})",
                self.scope,
                key,
                previous.descriptor().implementation_key(),
                descriptor.implementation_key(),
                descriptor.origin_label()
            );
        } else if let Some(existing) = slots.get(&key) {
            warn!("[{}] 服务重复绑定: {}", self.scope, descriptor);
            return Err(DependencyError::DuplicateBinding {
                interface_key: key,
                existing_implementation: existing.descriptor().implementation_key().to_string(),
            });
        } else {
            info!("[{}] 注册服务: {}", self.scope, descriptor);
        }

        let slot = SingletonSlot::new(descriptor, Arc::clone(&self.environment));
        slots.insert(key, Arc::new(slot));
        Ok(())
    }

    /// 移除接口键的绑定，不存在时为空操作
    ///
    /// 已构造的实例不会被销毁，它仍由作用域销毁树跟踪。
    pub fn remove(&self, interface_key: &str) -> Option<ServiceDescriptor> {
        let removed = self.slots.write().remove(interface_key);
        match &removed {
            Some(slot) => info!("[{}] 移除服务: {}", self.scope, slot.descriptor()),
            None => debug!("[{}] 移除不存在的服务: {}", self.scope, interface_key),
        }
        removed.map(|slot| slot.descriptor().clone())
    }

    /// 解析服务实例，必要时构造
    pub fn resolve(&self, interface_key: &str) -> DependencyResult<ServiceInstance> {
        let slot = self.slot(interface_key)?;
        slot.get_or_build(&DependencyLookup { registry: self })
    }

    /// 在阻塞线程池上解析，避免构造阻塞异步运行时的工作线程
    pub async fn resolve_async(
        self: &Arc<Self>,
        interface_key: &str,
    ) -> DependencyResult<ServiceInstance> {
        let registry = Arc::clone(self);
        let key = interface_key.to_string();
        let implementation = self
            .descriptor(interface_key)
            .map(|descriptor| descriptor.implementation_key().to_string())
            .unwrap_or_default();

        tokio::task::spawn_blocking(move || registry.resolve(&key))
            .await
            .map_err(|e| DependencyError::construction_failed(interface_key, implementation, e))?
    }

    /// 当前绑定的描述符快照
    pub fn list_descriptors(&self) -> Vec<ServiceDescriptor> {
        self.slots
            .read()
            .values()
            .map(|slot| slot.descriptor().clone())
            .collect()
    }

    /// 接口键当前绑定的描述符
    pub fn descriptor(&self, interface_key: &str) -> Option<ServiceDescriptor> {
        self.slots
            .read()
            .get(interface_key)
            .map(|slot| slot.descriptor().clone())
    }

    /// 接口键当前槽位的构造状态
    pub fn slot_state(&self, interface_key: &str) -> Option<SlotState> {
        self.slots.read().get(interface_key).map(|slot| slot.state())
    }

    pub fn is_registered(&self, interface_key: &str) -> bool {
        self.slots.read().contains_key(interface_key)
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// 绑定的可读摘要
    pub fn describe(&self, interface_key: &str) -> Option<String> {
        let slot = self.slots.read().get(interface_key).cloned()?;
        let mut summary = format!("{} [{:?}", slot.descriptor(), slot.state());
        if let Some(built_at) = slot.built_at() {
            summary.push_str(&format!(", built_at={}", built_at.to_rfc3339()));
        }
        summary.push(']');
        Some(summary)
    }

    /// 检查绑定的实现可查找且依赖已绑定，不触发构造
    pub fn verify(&self, interface_key: &str) -> DependencyResult<()> {
        let slot = self.slot(interface_key)?;
        slot.verify(&DependencyLookup { registry: self })
    }

    /// 检查所有绑定，返回发现的问题
    pub fn verify_all(&self) -> Vec<DependencyError> {
        let slots: Vec<_> = self.slots.read().values().cloned().collect();
        let lookup = DependencyLookup { registry: self };
        slots
            .iter()
            .filter_map(|slot| slot.verify(&lookup).err())
            .collect()
    }

    fn slot(&self, interface_key: &str) -> DependencyResult<Arc<SingletonSlot>> {
        self.slots
            .read()
            .get(interface_key)
            .cloned()
            .ok_or_else(|| DependencyError::unregistered(interface_key))
    }
}

impl ServiceResolver for ServiceRegistry {
    fn resolve(&self, interface_key: &str) -> DependencyResult<ServiceInstance> {
        ServiceRegistry::resolve(self, interface_key)
    }

    fn is_registered(&self, interface_key: &str) -> bool {
        ServiceRegistry::is_registered(self, interface_key)
    }

    fn list_descriptors(&self) -> Vec<ServiceDescriptor> {
        ServiceRegistry::list_descriptors(self)
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("scope", &self.scope)
            .field("services", &self.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// 构造期依赖查找：先查本注册表，未绑定时回退到父注册表
struct DependencyLookup<'a> {
    registry: &'a ServiceRegistry,
}

impl ServiceResolver for DependencyLookup<'_> {
    fn resolve(&self, interface_key: &str) -> DependencyResult<ServiceInstance> {
        match (self.registry.is_registered(interface_key), &self.registry.parent) {
            (false, Some(parent)) => parent.resolve(interface_key),
            _ => self.registry.resolve(interface_key),
        }
    }

    fn is_registered(&self, interface_key: &str) -> bool {
        self.registry.is_registered(interface_key)
            || self
                .registry
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_registered(interface_key))
    }

    fn list_descriptors(&self) -> Vec<ServiceDescriptor> {
        let mut descriptors = self.registry.list_descriptors();
        if let Some(parent) = &self.registry.parent {
            descriptors.extend(
                parent
                    .list_descriptors()
                    .into_iter()
                    .filter(|descriptor| !self.registry.is_registered(descriptor.interface_key())),
            );
        }
        descriptors
    }
}
