//! 扩展点
//!
//! 内存中的描述符来源。插件加载器向扩展点登记描述符，扩展点按订阅顺序通知监听器。

use di_abstractions::{DescriptorFeed, DescriptorListener, SubscriptionId};
use infrastructure_common::{DependencyResult, PluginId, ServiceDescriptor};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

type Subscriber = (SubscriptionId, Arc<dyn DescriptorListener>);

/// 扩展点
///
/// 所有通知在同一把分发锁下发出，监听器看到的增删顺序与登记顺序一致。
/// 监听器回调中不能再次修改同一个扩展点。
pub struct ExtensionPoint {
    name: String,
    extensions: RwLock<Vec<ServiceDescriptor>>,
    listeners: RwLock<Vec<Subscriber>>,
    dispatch: Mutex<()>,
    next_subscription: AtomicU64,
}

impl ExtensionPoint {
    /// 创建新的扩展点
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extensions: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            dispatch: Mutex::new(()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// 登记描述符并通知监听器
    ///
    /// 任一监听器拒绝时立即停止分发，描述符不会被记录，错误返回给加载方。
    /// 已经接受的监听器按逆序收到移除通知；被拒绝的是覆盖描述符时，
    /// 它们还会重新收到被覆盖的已登记描述符。
    pub fn register_extension(&self, descriptor: ServiceDescriptor) -> DependencyResult<()> {
        let _dispatch = self.dispatch.lock();
        debug!("[{}] 登记扩展: {}", self.name, descriptor);

        let subscribers = self.subscribers();
        for (accepted, (id, listener)) in subscribers.iter().enumerate() {
            if let Err(e) = listener.descriptor_added(&descriptor) {
                error!(
                    "[{}] 监听器 {} ({}) 拒绝扩展 {}: {}",
                    self.name,
                    listener.name(),
                    id,
                    descriptor,
                    e
                );
                self.roll_back(&subscribers[..accepted], &descriptor);
                return Err(e);
            }
        }

        self.extensions.write().push(descriptor);
        Ok(())
    }

    /// 撤销已接受监听器上的未记录描述符，调用方须持有分发锁
    fn roll_back(&self, accepted: &[Subscriber], descriptor: &ServiceDescriptor) {
        if accepted.is_empty() {
            return;
        }

        let replaced = if descriptor.overrides() {
            self.extensions
                .read()
                .iter()
                .rev()
                .find(|recorded| recorded.interface_key() == descriptor.interface_key())
                .cloned()
        } else {
            None
        };

        for (id, listener) in accepted.iter().rev() {
            listener.descriptor_removed(descriptor);
            if let Some(replaced) = &replaced {
                if let Err(e) = listener.descriptor_added(replaced) {
                    warn!(
                        "[{}] 监听器 {} ({}) 恢复扩展 {} 失败: {}",
                        self.name,
                        listener.name(),
                        id,
                        replaced,
                        e
                    );
                }
            }
        }
        info!(
            "[{}] 扩展 {} 被拒绝, 已回滚 {} 个监听器",
            self.name,
            descriptor,
            accepted.len()
        );
    }

    /// 移除描述符并通知监听器，未登记的描述符返回 `false`
    pub fn unregister_extension(&self, descriptor: &ServiceDescriptor) -> bool {
        let _dispatch = self.dispatch.lock();
        self.remove_recorded(descriptor)
    }

    /// 卸载插件贡献的全部描述符，按登记的逆序移除
    pub fn unregister_plugin(&self, plugin: &PluginId) -> usize {
        let _dispatch = self.dispatch.lock();
        let contributed: Vec<_> = self
            .extensions
            .read()
            .iter()
            .filter(|descriptor| descriptor.origin() == Some(plugin))
            .cloned()
            .collect();

        let removed = contributed
            .iter()
            .rev()
            .filter(|descriptor| self.remove_recorded(descriptor))
            .count();
        info!("[{}] 插件 {} 已卸载 {} 个扩展", self.name, plugin, removed);
        removed
    }

    pub fn len(&self) -> usize {
        self.extensions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.read().is_empty()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// 调用方须持有分发锁
    fn remove_recorded(&self, descriptor: &ServiceDescriptor) -> bool {
        let removed = {
            let mut extensions = self.extensions.write();
            extensions
                .iter()
                .position(|recorded| recorded == descriptor)
                .map(|index| extensions.remove(index))
        };

        let Some(removed) = removed else {
            debug!("[{}] 移除未登记的扩展: {}", self.name, descriptor);
            return false;
        };

        debug!("[{}] 移除扩展: {}", self.name, removed);
        for (_, listener) in self.subscribers() {
            listener.descriptor_removed(&removed);
        }
        true
    }

    fn subscribers(&self) -> Vec<Subscriber> {
        self.listeners.read().clone()
    }
}

impl DescriptorFeed for ExtensionPoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe(&self, listener: Arc<dyn DescriptorListener>) -> DependencyResult<SubscriptionId> {
        let _dispatch = self.dispatch.lock();

        let recorded = self.extensions.read().clone();
        for descriptor in &recorded {
            listener.descriptor_added(descriptor)?;
        }

        let id = SubscriptionId::new(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        info!(
            "[{}] 监听器 {} 已订阅 ({}), 重放 {} 个扩展",
            self.name,
            listener.name(),
            id,
            recorded.len()
        );
        self.listeners.write().push((id, listener));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let _dispatch = self.dispatch.lock();
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(subscription, _)| *subscription != id);
        let removed = listeners.len() != before;
        if removed {
            info!("[{}] 取消订阅: {}", self.name, id);
        }
        removed
    }

    fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.extensions.read().clone()
    }
}

impl fmt::Debug for ExtensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionPoint")
            .field("name", &self.name)
            .field("extensions", &self.len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
