//! 实现目录
//!
//! 内存中的构造机制：按命名空间登记构造器。插件命名空间对应插件的加载上下文，
//! 查找时先查贡献插件自己的命名空间，再回退到核心命名空间。

use dashmap::DashMap;
use di_abstractions::{ConstructionContext, LambdaConstructor, ServiceConstructor, ServiceFactory};
use infrastructure_common::{BoxError, DependencyError, DependencyResult, PluginId, ServiceInstance};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CatalogKey {
    namespace: Option<PluginId>,
    implementation_key: String,
}

/// 实现目录
#[derive(Default)]
pub struct ImplementationCatalog {
    constructors: DashMap<CatalogKey, Arc<dyn ServiceConstructor>>,
}

impl ImplementationCatalog {
    /// 创建空目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 在核心命名空间登记构造器
    pub fn register(
        &self,
        implementation_key: impl Into<String>,
        constructor: Arc<dyn ServiceConstructor>,
    ) {
        self.insert(None, implementation_key.into(), constructor);
    }

    /// 在插件命名空间登记构造器
    pub fn register_for_plugin(
        &self,
        plugin: impl Into<PluginId>,
        implementation_key: impl Into<String>,
        constructor: Arc<dyn ServiceConstructor>,
    ) {
        self.insert(Some(plugin.into()), implementation_key.into(), constructor);
    }

    /// 以闭包在核心命名空间登记构造器
    pub fn register_fn<F>(&self, implementation_key: impl Into<String>, construct_fn: F)
    where
        F: Fn(&ConstructionContext<'_>) -> Result<ServiceInstance, BoxError> + Send + Sync + 'static,
    {
        self.register(implementation_key, Arc::new(LambdaConstructor::new(construct_fn)));
    }

    /// 卸载插件命名空间，返回移除的构造器数量
    pub fn unregister_plugin(&self, plugin: &PluginId) -> usize {
        let before = self.constructors.len();
        self.constructors
            .retain(|key, _| key.namespace.as_ref() != Some(plugin));
        let removed = before - self.constructors.len();
        info!("卸载插件 {} 的 {} 个实现", plugin, removed);
        removed
    }

    /// 实现是否可在给定加载上下文中找到
    pub fn contains(&self, implementation_key: &str, origin: Option<&PluginId>) -> bool {
        self.find(implementation_key, origin).is_some()
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    fn insert(
        &self,
        namespace: Option<PluginId>,
        implementation_key: String,
        constructor: Arc<dyn ServiceConstructor>,
    ) {
        debug!(
            "登记实现: {} (命名空间: {})",
            implementation_key,
            namespace.as_ref().map_or("core", PluginId::as_str)
        );
        self.constructors.insert(
            CatalogKey {
                namespace,
                implementation_key,
            },
            constructor,
        );
    }

    fn find(
        &self,
        implementation_key: &str,
        origin: Option<&PluginId>,
    ) -> Option<Arc<dyn ServiceConstructor>> {
        let lookup = |namespace: Option<PluginId>| {
            self.constructors
                .get(&CatalogKey {
                    namespace,
                    implementation_key: implementation_key.to_string(),
                })
                .map(|entry| Arc::clone(entry.value()))
        };

        origin
            .and_then(|plugin| lookup(Some(plugin.clone())))
            .or_else(|| lookup(None))
    }
}

impl ServiceFactory for ImplementationCatalog {
    fn lookup(
        &self,
        implementation_key: &str,
        origin: Option<&PluginId>,
    ) -> DependencyResult<Arc<dyn ServiceConstructor>> {
        self.find(implementation_key, origin)
            .ok_or_else(|| DependencyError::ImplementationNotFound {
                implementation_key: implementation_key.to_string(),
                origin: origin.map_or_else(|| "core".to_string(), ToString::to_string),
                message: "实现未在加载上下文中登记".to_string(),
            })
    }
}

impl fmt::Debug for ImplementationCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplementationCatalog")
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infrastructure_common::Service;

    #[derive(Debug)]
    struct Marker(&'static str);

    impl Service for Marker {}

    fn marker(name: &'static str) -> Arc<dyn ServiceConstructor> {
        Arc::new(LambdaConstructor::new(move |_: &ConstructionContext<'_>| {
            Ok(Arc::new(Marker(name)) as ServiceInstance)
        }))
    }

    #[test]
    fn test_plugin_namespace_shadows_core() {
        let catalog = ImplementationCatalog::new();
        catalog.register("Impl", marker("core"));
        catalog.register_for_plugin("plugin.a", "Impl", marker("plugin"));

        let plugin = PluginId::new("plugin.a");
        let other = PluginId::new("plugin.b");
        assert!(catalog.lookup("Impl", Some(&plugin)).is_ok());
        assert!(catalog.contains("Impl", Some(&other)));
        assert!(catalog.contains("Impl", None));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_plugin_only_implementation_invisible_elsewhere() {
        let catalog = ImplementationCatalog::new();
        catalog.register_for_plugin("plugin.a", "PluginOnly", marker("plugin"));

        let plugin = PluginId::new("plugin.a");
        assert!(catalog.contains("PluginOnly", Some(&plugin)));
        assert!(!catalog.contains("PluginOnly", None));

        match catalog.lookup("PluginOnly", None) {
            Err(DependencyError::ImplementationNotFound { origin, .. }) => assert_eq!(origin, "core"),
            _ => panic!("核心命名空间不应看到插件实现"),
        }

        assert_eq!(catalog.unregister_plugin(&plugin), 1);
        assert!(catalog.is_empty());
    }
}
