//! 槽位构造所需的作用域环境

use di_abstractions::ServiceFactory;
use infrastructure_common::{DisposalTree, HeavyProcessLatch, NodeId, RegistryConfig};
use std::fmt;
use std::sync::Arc;

/// 服务环境
///
/// 一个作用域内所有槽位共享：构造机制、销毁树及作用域节点、重量级操作标记和配置
pub struct ServiceEnvironment {
    factory: Arc<dyn ServiceFactory>,
    disposer: Arc<DisposalTree>,
    scope_node: NodeId,
    latch: Arc<HeavyProcessLatch>,
    config: RegistryConfig,
}

impl ServiceEnvironment {
    /// 创建新的服务环境
    pub fn new(
        factory: Arc<dyn ServiceFactory>,
        disposer: Arc<DisposalTree>,
        scope_node: NodeId,
    ) -> Self {
        Self {
            factory,
            disposer,
            scope_node,
            latch: Arc::new(HeavyProcessLatch::new()),
            config: RegistryConfig::default(),
        }
    }

    /// 设置重量级操作标记
    pub fn with_latch(mut self, latch: Arc<HeavyProcessLatch>) -> Self {
        self.latch = latch;
        self
    }

    /// 设置注册表配置
    pub fn with_config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// 派生子作用域环境，共享构造机制、销毁树、标记和配置
    pub fn for_scope(&self, scope_node: NodeId) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            disposer: Arc::clone(&self.disposer),
            scope_node,
            latch: Arc::clone(&self.latch),
            config: self.config.clone(),
        }
    }

    pub fn factory(&self) -> &dyn ServiceFactory {
        self.factory.as_ref()
    }

    pub fn disposer(&self) -> &DisposalTree {
        &self.disposer
    }

    pub fn scope_node(&self) -> NodeId {
        self.scope_node
    }

    pub fn latch(&self) -> &HeavyProcessLatch {
        &self.latch
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl fmt::Debug for ServiceEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEnvironment")
            .field("scope_node", &self.scope_node)
            .field("config", &self.config)
            .finish()
    }
}
