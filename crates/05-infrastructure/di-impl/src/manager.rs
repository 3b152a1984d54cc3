//! 服务管理器
//!
//! 将一个作用域的注册表绑定到一个描述符来源：新增通知安装绑定，移除通知删除绑定。

use crate::registry::ServiceRegistry;
use di_abstractions::{DescriptorFeed, DescriptorListener, ServiceResolver, SubscriptionId};
use infrastructure_common::{
    DependencyResult, ServiceDescriptor, ServiceInstance, ServiceScope,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// 服务管理器
pub struct ServiceManager {
    registry: Arc<ServiceRegistry>,
    feed: Arc<dyn DescriptorFeed>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl ServiceManager {
    /// 创建管理器并订阅描述符来源
    ///
    /// 来源中已有的描述符会立即安装；任一描述符安装失败时返回错误，不建立订阅。
    pub fn new(
        registry: Arc<ServiceRegistry>,
        feed: Arc<dyn DescriptorFeed>,
    ) -> DependencyResult<Self> {
        let binding = Arc::new(RegistryBinding {
            name: format!("ServiceManager[{}]", registry.scope()),
            registry: Arc::clone(&registry),
        });
        let subscription = feed.subscribe(binding)?;
        info!(
            "服务管理器已绑定: {} <- {} ({} 个服务)",
            registry.scope(),
            feed.name(),
            registry.len()
        );

        Ok(Self {
            registry,
            feed,
            subscription: Mutex::new(Some(subscription)),
        })
    }

    pub fn scope(&self) -> &ServiceScope {
        self.registry.scope()
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// 解析服务实例
    pub fn resolve(&self, interface_key: &str) -> DependencyResult<ServiceInstance> {
        self.registry.resolve(interface_key)
    }

    /// 当前绑定的描述符
    pub fn list_descriptors(&self) -> Vec<ServiceDescriptor> {
        self.registry.list_descriptors()
    }

    /// 取消订阅
    ///
    /// 只停止接收通知，已构造的实例归作用域销毁树所有。重复调用为空操作。
    pub fn dispose(&self) {
        let Some(subscription) = self.subscription.lock().take() else {
            return;
        };
        self.feed.unsubscribe(subscription);
        info!("服务管理器已释放: {}", self.registry.scope());
    }

    pub fn is_disposed(&self) -> bool {
        self.subscription.lock().is_none()
    }

    pub fn component_name(&self) -> String {
        format!("ServiceManager[{}]", self.registry.scope())
    }
}

impl ServiceResolver for ServiceManager {
    fn resolve(&self, interface_key: &str) -> DependencyResult<ServiceInstance> {
        ServiceManager::resolve(self, interface_key)
    }

    fn is_registered(&self, interface_key: &str) -> bool {
        self.registry.is_registered(interface_key)
    }

    fn list_descriptors(&self) -> Vec<ServiceDescriptor> {
        ServiceManager::list_descriptors(self)
    }
}

impl Drop for ServiceManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceManager")
            .field("scope", self.registry.scope())
            .field("feed", &self.feed.name())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// 把来源通知转成注册表变更
struct RegistryBinding {
    name: String,
    registry: Arc<ServiceRegistry>,
}

impl DescriptorListener for RegistryBinding {
    fn name(&self) -> &str {
        &self.name
    }

    fn descriptor_added(&self, descriptor: &ServiceDescriptor) -> DependencyResult<()> {
        self.registry.install(descriptor.clone())
    }

    fn descriptor_removed(&self, descriptor: &ServiceDescriptor) {
        debug!("{} 收到移除通知: {}", self.name, descriptor);
        self.registry.remove(descriptor.interface_key());
    }
}
