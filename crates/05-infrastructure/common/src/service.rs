//! 服务实例能力定义
//!
//! 注册表构造出的每个实例都实现 [`Service`]

use crate::errors::BoxError;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// 将共享实例转换为 `Any`，用于类型化解析
pub trait AsAny: Any + Send + Sync {
    /// 转换为 `Arc<dyn Any>`
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// 服务基础 trait
pub trait Service: AsAny + Debug {
    /// 一次性的构造后初始化钩子
    ///
    /// 返回错误时该次构造视为失败，实例不会被发布。
    fn initialize(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// 暴露可销毁能力
    ///
    /// 实现了 [`Disposable`] 的服务返回 `Some(self)`。
    fn disposable(self: Arc<Self>) -> Option<Arc<dyn Disposable>> {
        None
    }
}

/// 可销毁 trait
///
/// 由销毁树在所属作用域拆除时调用
pub trait Disposable: Send + Sync {
    /// 释放持有的资源
    fn dispose(&self);
}

/// 已构造的共享服务实例
pub type ServiceInstance = Arc<dyn Service>;

/// 将服务实例下转型为具体类型
pub fn downcast_service<T: Service>(instance: &ServiceInstance) -> Option<Arc<T>> {
    Arc::clone(instance).as_any_arc().downcast::<T>().ok()
}
