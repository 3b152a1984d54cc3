//! 服务宿主
//!
//! 组装销毁树、扩展点和各作用域的服务管理器。应用作用域随宿主创建，
//! 项目作用域按需打开，其注册表在构造依赖时回退到应用注册表。

use crate::logging::init_logging;
use di_abstractions::ServiceFactory;
use di_impl::{ExtensionPoint, ServiceEnvironment, ServiceManager, ServiceRegistry};
use infrastructure_common::{
    DependencyResult, DisposalTree, HeavyProcessLatch, InfrastructureError, InfrastructureResult,
    LifecycleError, NodeId, ServiceHostConfig, ServiceInstance, ServiceScope,
    APPLICATION_SERVICES, PROJECT_SERVICES,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// 服务宿主构建器
pub struct ServiceHostBuilder {
    config: ServiceHostConfig,
    factory: Option<Arc<dyn ServiceFactory>>,
    logging_enabled: bool,
    latch: Option<Arc<HeavyProcessLatch>>,
}

impl ServiceHostBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: ServiceHostConfig::default(),
            factory: None,
            logging_enabled: false, // 默认不初始化日志
            latch: None,
        }
    }

    /// 设置宿主配置
    pub fn with_config(mut self, config: ServiceHostConfig) -> Self {
        self.config = config;
        self
    }

    /// 从 TOML 或 JSON 文件加载宿主配置
    pub fn with_config_file(mut self, path: impl AsRef<Path>) -> InfrastructureResult<Self> {
        let path = path.as_ref();
        info!("加载宿主配置: {}", path.display());
        self.config = ServiceHostConfig::from_file(path)?;
        Ok(self)
    }

    /// 设置构造机制
    pub fn with_factory(mut self, factory: Arc<dyn ServiceFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// 启用日志初始化
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    /// 设置重量级操作标记，默认使用进程级标记
    pub fn with_latch(mut self, latch: Arc<HeavyProcessLatch>) -> Self {
        self.latch = Some(latch);
        self
    }

    /// 构建服务宿主
    pub fn build(self) -> InfrastructureResult<ServiceHost> {
        self.config.validate()?;
        if self.logging_enabled {
            init_logging(&self.config.logging)?;
        }

        let factory = self
            .factory
            .ok_or_else(|| InfrastructureError::BootstrapFailed {
                message: "未设置构造机制".to_string(),
            })?;
        let latch = self.latch.unwrap_or_else(HeavyProcessLatch::global);

        let disposer = Arc::new(DisposalTree::new());
        let application_node =
            disposer.create_scope(disposer.root(), ServiceScope::Application.to_string())?;

        let environment = ServiceEnvironment::new(factory, Arc::clone(&disposer), application_node)
            .with_latch(latch)
            .with_config(self.config.registry.clone());
        let registry = Arc::new(ServiceRegistry::new(ServiceScope::Application, environment));

        let application_services = Arc::new(ExtensionPoint::new(APPLICATION_SERVICES));
        let project_services = Arc::new(ExtensionPoint::new(PROJECT_SERVICES));
        let application = Arc::new(ServiceManager::new(registry, application_services.clone())?);

        info!("服务宿主已构建");
        Ok(ServiceHost {
            config: self.config,
            disposer,
            application_node,
            application_services,
            project_services,
            application,
            projects: RwLock::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        })
    }
}

impl Default for ServiceHostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct ProjectScope {
    node: NodeId,
    manager: Arc<ServiceManager>,
}

/// 服务宿主
pub struct ServiceHost {
    config: ServiceHostConfig,
    disposer: Arc<DisposalTree>,
    application_node: NodeId,
    application_services: Arc<ExtensionPoint>,
    project_services: Arc<ExtensionPoint>,
    application: Arc<ServiceManager>,
    projects: RwLock<HashMap<String, ProjectScope>>,
    shut_down: AtomicBool,
}

impl ServiceHost {
    /// 创建构建器
    pub fn builder() -> ServiceHostBuilder {
        ServiceHostBuilder::new()
    }

    pub fn config(&self) -> &ServiceHostConfig {
        &self.config
    }

    pub fn disposer(&self) -> &Arc<DisposalTree> {
        &self.disposer
    }

    pub fn application_node(&self) -> NodeId {
        self.application_node
    }

    /// 应用级服务扩展点
    pub fn application_services(&self) -> &Arc<ExtensionPoint> {
        &self.application_services
    }

    /// 项目级服务扩展点，所有项目共享
    pub fn project_services(&self) -> &Arc<ExtensionPoint> {
        &self.project_services
    }

    /// 应用作用域的服务管理器
    pub fn application(&self) -> &Arc<ServiceManager> {
        &self.application
    }

    /// 解析应用级服务
    pub fn resolve(&self, interface_key: &str) -> DependencyResult<ServiceInstance> {
        self.application.resolve(interface_key)
    }

    /// 打开项目作用域
    pub fn open_project(&self, name: &str) -> InfrastructureResult<Arc<ServiceManager>> {
        if self.is_shut_down() {
            return Err(InfrastructureError::ShutDown);
        }

        let mut projects = self.projects.write();
        if projects.contains_key(name) {
            return Err(LifecycleError::ScopeAlreadyExists {
                name: name.to_string(),
            }
            .into());
        }

        let scope = ServiceScope::Project(name.to_string());
        let node = self
            .disposer
            .create_scope(self.application_node, scope.to_string())?;

        let application_registry = self.application.registry();
        let environment = application_registry.environment().for_scope(node);
        let registry = ServiceRegistry::new(scope, environment)
            .with_parent(Arc::clone(application_registry));

        let manager = match ServiceManager::new(Arc::new(registry), self.project_services.clone()) {
            Ok(manager) => Arc::new(manager),
            Err(e) => {
                warn!("项目作用域打开失败: {}, 原因: {}", name, e);
                self.disposer.dispose(node);
                return Err(e.into());
            }
        };

        projects.insert(
            name.to_string(),
            ProjectScope {
                node,
                manager: Arc::clone(&manager),
            },
        );
        info!("项目作用域已打开: {}", name);
        Ok(manager)
    }

    /// 关闭项目作用域：取消订阅并拆除作用域下的全部实例
    pub fn close_project(&self, name: &str) -> InfrastructureResult<()> {
        let project = self
            .projects
            .write()
            .remove(name)
            .ok_or_else(|| LifecycleError::ScopeNotFound {
                scope_id: name.to_string(),
            })?;

        project.manager.dispose();
        let disposed = self.disposer.dispose(project.node);
        info!("项目作用域已关闭: {} (销毁 {} 个对象)", name, disposed);
        Ok(())
    }

    /// 已打开项目的服务管理器
    pub fn project(&self, name: &str) -> Option<Arc<ServiceManager>> {
        self.projects
            .read()
            .get(name)
            .map(|project| Arc::clone(&project.manager))
    }

    pub fn project_names(&self) -> Vec<String> {
        self.projects.read().keys().cloned().collect()
    }

    /// 关闭宿主：关闭全部项目，释放应用管理器并拆除销毁树，重复调用为空操作
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("开始关闭服务宿主");
        let projects: Vec<_> = self.projects.write().drain().collect();
        for (name, project) in projects {
            project.manager.dispose();
            self.disposer.dispose(project.node);
            info!("项目作用域已关闭: {}", name);
        }

        self.application.dispose();
        let disposed = self.disposer.dispose(self.disposer.root());
        info!("服务宿主已关闭 (销毁 {} 个对象)", disposed);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Drop for ServiceHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ServiceHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHost")
            .field("application", &self.application)
            .field("projects", &self.project_names())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
