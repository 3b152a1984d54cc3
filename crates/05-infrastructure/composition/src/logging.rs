//! 日志初始化

use infrastructure_common::{InfrastructureError, InfrastructureResult, LoggingConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// 按配置安装全局 tracing 订阅者
///
/// 进程中已经存在全局订阅者时不做任何事，返回 `Ok(false)`。
/// 过滤指令无效时返回 [`InfrastructureError::BootstrapFailed`]。
pub fn init_logging(config: &LoggingConfig) -> InfrastructureResult<bool> {
    let filter =
        EnvFilter::try_new(&config.filter).map_err(|e| InfrastructureError::BootstrapFailed {
            message: format!("日志过滤指令无效: {}: {}", config.filter, e),
        })?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(config.show_thread_ids);

    let installed = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    match installed {
        Ok(()) => {
            info!("日志系统初始化完成 (filter={}, json={})", config.filter, config.json);
            Ok(true)
        }
        Err(e) => {
            debug!("日志系统已初始化，跳过: {}", e);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LoggingConfig {
            filter: "di_impl=notalevel".to_string(),
            ..LoggingConfig::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(InfrastructureError::BootstrapFailed { .. })
        ));
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        let config = LoggingConfig::development();
        init_logging(&config).unwrap();
        // 其他测试可能先安装了订阅者，只保证第二次一定不再安装
        assert!(!init_logging(&config).unwrap());
    }
}
