//! 描述符来源抽象接口
//!
//! 描述符来源（扩展点）以推送方式发出有序的"新增/移除"通知，
//! 插件加载和卸载时会在启动后继续发出通知。

use infrastructure_common::{DependencyResult, ServiceDescriptor};
use std::fmt;
use std::sync::Arc;

/// 订阅句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// 创建新的订阅句柄
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription#{}", self.0)
    }
}

/// 描述符监听器 trait
pub trait DescriptorListener: Send + Sync {
    /// 获取监听器名称
    fn name(&self) -> &str;

    /// 处理描述符新增
    ///
    /// 返回错误表示该贡献配置有误，来源应拒绝这次贡献。
    fn descriptor_added(&self, descriptor: &ServiceDescriptor) -> DependencyResult<()>;

    /// 处理描述符移除
    fn descriptor_removed(&self, descriptor: &ServiceDescriptor);
}

/// 描述符来源 trait
pub trait DescriptorFeed: Send + Sync {
    /// 来源名称
    fn name(&self) -> &str;

    /// 订阅增删通知
    ///
    /// 已记录的描述符会按顺序作为新增通知重放给新监听器。
    fn subscribe(&self, listener: Arc<dyn DescriptorListener>) -> DependencyResult<SubscriptionId>;

    /// 取消订阅，句柄不存在时返回 `false`
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// 当前记录的描述符
    fn descriptors(&self) -> Vec<ServiceDescriptor>;
}
