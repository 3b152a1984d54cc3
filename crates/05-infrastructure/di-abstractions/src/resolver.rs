//! 服务解析抽象接口
//!
//! 提供按接口键解析服务实例的能力

use infrastructure_common::{
    downcast_service, DependencyError, DependencyResult, Service, ServiceDescriptor,
    ServiceInstance,
};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

/// 服务解析器 trait
pub trait ServiceResolver: Send + Sync {
    /// 解析服务实例，必要时触发构造
    fn resolve(&self, interface_key: &str) -> DependencyResult<ServiceInstance>;

    /// 检查接口键是否已绑定
    fn is_registered(&self, interface_key: &str) -> bool;

    /// 当前绑定的描述符，顺序不保证
    fn list_descriptors(&self) -> Vec<ServiceDescriptor>;
}

/// 类型化解析扩展
pub trait ServiceResolverExt: ServiceResolver {
    /// 解析服务并下转型为具体类型
    fn resolve_as<T: Service>(&self, interface_key: &str) -> DependencyResult<Arc<T>> {
        let instance = self.resolve(interface_key)?;
        downcast_service::<T>(&instance).ok_or_else(|| DependencyError::TypeMismatch {
            interface_key: interface_key.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }
}

impl<R: ServiceResolver + ?Sized> ServiceResolverExt for R {}

thread_local! {
    static RESOLUTION_CHAIN: RefCell<Vec<ChainEntry>> = const { RefCell::new(Vec::new()) };
}

struct ChainEntry {
    owner: usize,
    interface_key: String,
}

/// 当前线程正在构造的槽位链
///
/// 同一线程在构造某个槽位期间再次请求构造同一槽位，说明存在循环依赖。
/// 链按构造者身份（通常是槽位地址）判定，同一接口键在父子注册表中是不同的槽位。
pub struct ResolutionChain;

impl ResolutionChain {
    /// 将构造者压入解析链
    ///
    /// `owner` 在构造期间必须保持唯一且稳定，`interface_key` 只用于错误信息。
    pub fn enter(owner: usize, interface_key: &str) -> DependencyResult<ResolutionFrame> {
        RESOLUTION_CHAIN.with(|chain| {
            let mut chain = chain.borrow_mut();
            if let Some(start) = chain.iter().position(|entry| entry.owner == owner) {
                let mut cycle: Vec<&str> = chain[start..]
                    .iter()
                    .map(|entry| entry.interface_key.as_str())
                    .collect();
                cycle.push(interface_key);
                let dependency_chain = cycle.join(" -> ");
                warn!("检测到循环依赖: {}", dependency_chain);
                return Err(DependencyError::CircularDependency { dependency_chain });
            }
            chain.push(ChainEntry {
                owner,
                interface_key: interface_key.to_string(),
            });
            Ok(ResolutionFrame {
                _thread_bound: PhantomData,
            })
        })
    }

    /// 当前线程解析链上的接口键快照
    pub fn current() -> Vec<String> {
        RESOLUTION_CHAIN.with(|chain| {
            chain
                .borrow()
                .iter()
                .map(|entry| entry.interface_key.clone())
                .collect()
        })
    }
}

/// 解析链栈帧，释放时弹出
#[must_use]
pub struct ResolutionFrame {
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for ResolutionFrame {
    fn drop(&mut self) {
        RESOLUTION_CHAIN.with(|chain| {
            chain.borrow_mut().pop();
        });
    }
}
