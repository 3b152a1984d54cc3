//! 配置定义
//!
//! 注册表与宿主的配置记录，支持 TOML / JSON 加载

use crate::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 注册表配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// 构造耗时超过该阈值时记录警告（毫秒）
    pub slow_construction_threshold_ms: u64,
    /// 是否检测同一线程上的循环依赖
    pub detect_cycles: bool,
}

impl RegistryConfig {
    pub fn slow_construction_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_construction_threshold_ms)
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.slow_construction_threshold_ms == 0 {
            return Err(ConfigError::validation(
                "registry.slow_construction_threshold_ms 必须大于 0",
            ));
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            slow_construction_threshold_ms: 500,
            detect_cycles: true,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` 过滤指令
    pub filter: String,
    /// 是否使用 JSON 格式
    pub json: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            show_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境日志配置
    pub fn development() -> Self {
        Self {
            filter: "debug".to_string(),
            json: false,
            show_thread_ids: true,
        }
    }

    /// 创建生产环境日志配置
    pub fn production() -> Self {
        Self {
            filter: "info".to_string(),
            json: true,
            show_thread_ids: false,
        }
    }
}

/// 服务宿主配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceHostConfig {
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

impl ServiceHostConfig {
    /// 从 TOML 文本加载
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(ConfigError::parse_error)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文本加载
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::parse_error)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载，按扩展名选择格式（默认 TOML）
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.registry.validate()
    }
}
