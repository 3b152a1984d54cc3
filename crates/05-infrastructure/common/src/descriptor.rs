//! 服务描述符定义
//!
//! 描述一次"接口 → 实现"的绑定贡献

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// 贡献来源（插件/模块）标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginId(String);

impl PluginId {
    /// 创建新的插件标识
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 获取字符串表示
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PluginId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// 服务描述符
///
/// 创建后不可变。相等性只比较身份键（接口键与实现键），
/// 两个键相同的描述符视为同一次绑定贡献。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// 接口键，在一个作用域内唯一
    interface_key: String,
    /// 实现键
    implementation_key: String,
    /// 是否替换已有绑定
    #[serde(default)]
    overrides: bool,
    /// 贡献来源，`None` 表示核心模块
    #[serde(default)]
    origin: Option<PluginId>,
}

impl ServiceDescriptor {
    /// 创建新的服务描述符
    pub fn new(interface_key: impl Into<String>, implementation_key: impl Into<String>) -> Self {
        Self {
            interface_key: interface_key.into(),
            implementation_key: implementation_key.into(),
            overrides: false,
            origin: None,
        }
    }

    /// 标记为覆盖已有绑定
    pub fn overriding(mut self) -> Self {
        self.overrides = true;
        self
    }

    /// 设置贡献来源
    pub fn with_origin(mut self, origin: impl Into<PluginId>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn interface_key(&self) -> &str {
        &self.interface_key
    }

    pub fn implementation_key(&self) -> &str {
        &self.implementation_key
    }

    pub fn overrides(&self) -> bool {
        self.overrides
    }

    pub fn origin(&self) -> Option<&PluginId> {
        self.origin.as_ref()
    }

    /// 用于日志的来源名称
    pub fn origin_label(&self) -> &str {
        self.origin.as_ref().map_or("core", PluginId::as_str)
    }
}

impl PartialEq for ServiceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.interface_key == other.interface_key
            && self.implementation_key == other.implementation_key
    }
}

impl Eq for ServiceDescriptor {}

impl Hash for ServiceDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.interface_key.hash(state);
        self.implementation_key.hash(state);
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Service[{}]: implementation={}, plugin={}",
            self.interface_key,
            self.implementation_key,
            self.origin_label()
        )?;
        if self.overrides {
            f.write_str(", overrides")?;
        }
        Ok(())
    }
}

/// 服务所属作用域
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceScope {
    /// 进程级作用域
    Application,
    /// 项目级作用域
    Project(String),
}

impl ServiceScope {
    /// 该作用域对应的描述符扩展点名称
    pub fn extension_point_name(&self) -> &'static str {
        match self {
            Self::Application => APPLICATION_SERVICES,
            Self::Project(_) => PROJECT_SERVICES,
        }
    }
}

impl fmt::Display for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application => f.write_str("application"),
            Self::Project(name) => write!(f, "project:{name}"),
        }
    }
}

/// 应用级服务扩展点名称
pub const APPLICATION_SERVICES: &str = "lorn.applicationService";
/// 项目级服务扩展点名称
pub const PROJECT_SERVICES: &str = "lorn.projectService";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_uses_identity_keys_only() {
        let plain = ServiceDescriptor::new("Logger", "FileLogger");
        let overriding = ServiceDescriptor::new("Logger", "FileLogger")
            .overriding()
            .with_origin("plugin.a");
        assert_eq!(plain, overriding);

        let other = ServiceDescriptor::new("Logger", "NullLogger");
        assert_ne!(plain, other);

        let set: HashSet<_> = [plain, overriding, other].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display_and_origin_label() {
        let core = ServiceDescriptor::new("Cache", "MemoryCache");
        assert_eq!(core.origin_label(), "core");
        assert_eq!(
            core.to_string(),
            "Service[Cache]: implementation=MemoryCache, plugin=core"
        );

        let plugin = ServiceDescriptor::new("Cache", "DiskCache")
            .overriding()
            .with_origin("disk-plugin");
        assert!(plugin.to_string().ends_with("plugin=disk-plugin, overrides"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let descriptor: ServiceDescriptor =
            serde_json::from_str(r#"{"interface_key":"Logger","implementation_key":"FileLogger"}"#)
                .unwrap();
        assert!(!descriptor.overrides());
        assert!(descriptor.origin().is_none());
        assert_eq!(
            ServiceScope::Project("demo".into()).extension_point_name(),
            PROJECT_SERVICES
        );
    }
}
