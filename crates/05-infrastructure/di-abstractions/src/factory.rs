//! 构造机制抽象接口
//!
//! 给定实现键和贡献来源的加载上下文，构造出依赖已解析的服务实例

use crate::resolver::ServiceResolver;
use infrastructure_common::{
    downcast_service, BoxError, DependencyError, DependencyResult, PluginId, Service,
    ServiceDescriptor, ServiceInstance,
};
use std::sync::Arc;

/// 服务工厂 trait
///
/// 负责在贡献来源的加载上下文中查找实现
pub trait ServiceFactory: Send + Sync {
    /// 查找实现的构造器
    ///
    /// 找不到时返回 [`DependencyError::ImplementationNotFound`]。
    fn lookup(
        &self,
        implementation_key: &str,
        origin: Option<&PluginId>,
    ) -> DependencyResult<Arc<dyn ServiceConstructor>>;
}

/// 服务构造器 trait
pub trait ServiceConstructor: Send + Sync {
    /// 构造服务实例
    fn construct(&self, context: &ConstructionContext<'_>) -> Result<ServiceInstance, BoxError>;

    /// 声明的依赖接口键
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }
}

/// 构造上下文
///
/// 暴露正在构造的描述符以及解析依赖的入口
pub struct ConstructionContext<'a> {
    descriptor: &'a ServiceDescriptor,
    resolver: &'a dyn ServiceResolver,
}

impl<'a> ConstructionContext<'a> {
    /// 创建新的构造上下文
    pub fn new(descriptor: &'a ServiceDescriptor, resolver: &'a dyn ServiceResolver) -> Self {
        Self {
            descriptor,
            resolver,
        }
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        self.descriptor
    }

    pub fn origin(&self) -> Option<&PluginId> {
        self.descriptor.origin()
    }

    /// 解析依赖
    pub fn resolve(&self, interface_key: &str) -> DependencyResult<ServiceInstance> {
        self.resolver.resolve(interface_key)
    }

    /// 解析依赖并下转型
    pub fn resolve_as<T: Service>(&self, interface_key: &str) -> DependencyResult<Arc<T>> {
        let instance = self.resolve(interface_key)?;
        downcast_service::<T>(&instance).ok_or_else(|| DependencyError::TypeMismatch {
            interface_key: interface_key.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }
}

/// Lambda 构造器包装器
pub struct LambdaConstructor<F>
where
    F: Fn(&ConstructionContext<'_>) -> Result<ServiceInstance, BoxError> + Send + Sync + 'static,
{
    construct_fn: F,
    dependencies: Vec<String>,
}

impl<F> LambdaConstructor<F>
where
    F: Fn(&ConstructionContext<'_>) -> Result<ServiceInstance, BoxError> + Send + Sync + 'static,
{
    pub fn new(construct_fn: F) -> Self {
        Self {
            construct_fn,
            dependencies: Vec::new(),
        }
    }

    /// 声明依赖
    pub fn with_dependency(mut self, interface_key: impl Into<String>) -> Self {
        self.dependencies.push(interface_key.into());
        self
    }
}

impl<F> ServiceConstructor for LambdaConstructor<F>
where
    F: Fn(&ConstructionContext<'_>) -> Result<ServiceInstance, BoxError> + Send + Sync + 'static,
{
    fn construct(&self, context: &ConstructionContext<'_>) -> Result<ServiceInstance, BoxError> {
        (self.construct_fn)(context)
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }
}
