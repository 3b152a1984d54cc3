//! 错误类型定义

use thiserror::Error;

/// 构造机制返回的不透明错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置文件读取失败: {source}")]
    FileReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("配置解析失败: {source}")]
    ParseError { source: BoxError },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

impl ConfigError {
    /// 创建解析错误
    pub fn parse_error(source: impl Into<BoxError>) -> Self {
        Self::ParseError {
            source: source.into(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }
}

/// 服务注册与解析错误类型
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("服务重复绑定: {interface_key} 已绑定到 {existing_implementation}")]
    DuplicateBinding {
        interface_key: String,
        existing_implementation: String,
    },

    #[error("服务 {interface_key} 声明了覆盖，但没有可覆盖的绑定")]
    NothingToOverride { interface_key: String },

    #[error("服务未注册: {interface_key}")]
    UnregisteredService { interface_key: String },

    #[error("实现未找到: {implementation_key} (来源: {origin}), 原因: {message}")]
    ImplementationNotFound {
        implementation_key: String,
        origin: String,
        message: String,
    },

    #[error("服务构造失败: {interface_key} ({implementation_key}), 原因: {source}")]
    ConstructionFailed {
        interface_key: String,
        implementation_key: String,
        source: BoxError,
    },

    #[error("循环依赖检测到: {dependency_chain}")]
    CircularDependency { dependency_chain: String },

    #[error("服务类型不匹配: {interface_key}, 期望 {expected}")]
    TypeMismatch {
        interface_key: String,
        expected: &'static str,
    },

    #[error("服务 {interface_key} 所属作用域已销毁: {source}")]
    ScopeDisposed {
        interface_key: String,
        source: LifecycleError,
    },
}

impl DependencyError {
    /// 创建未注册错误
    pub fn unregistered(interface_key: impl Into<String>) -> Self {
        Self::UnregisteredService {
            interface_key: interface_key.into(),
        }
    }

    /// 创建构造失败错误
    pub fn construction_failed(
        interface_key: impl Into<String>,
        implementation_key: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::ConstructionFailed {
            interface_key: interface_key.into(),
            implementation_key: implementation_key.into(),
            source: source.into(),
        }
    }

    /// 之后的解析是否可能成功
    ///
    /// 只有构造失败和循环依赖中止不会在槽位上留下状态。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConstructionFailed { .. } | Self::CircularDependency { .. }
        )
    }

    /// 是否为注册阶段的配置错误
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateBinding { .. } | Self::NothingToOverride { .. }
        )
    }
}

/// 生命周期管理错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("作用域不存在: {scope_id}")]
    ScopeNotFound { scope_id: String },

    #[error("作用域已销毁: {scope_id}")]
    ScopeDisposed { scope_id: String },

    #[error("作用域已存在: {name}")]
    ScopeAlreadyExists { name: String },
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    #[error("依赖注入错误: {source}")]
    DependencyError {
        #[from]
        source: DependencyError,
    },

    #[error("生命周期错误: {source}")]
    LifecycleError {
        #[from]
        source: LifecycleError,
    },

    #[error("基础设施启动失败: {message}")]
    BootstrapFailed { message: String },

    #[error("基础设施已关闭")]
    ShutDown,
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type DependencyResult<T> = Result<T, DependencyError>;
pub type LifecycleResult<T> = Result<T, LifecycleError>;
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;
