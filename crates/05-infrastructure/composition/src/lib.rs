//! # 基础设施组合层
//!
//! 这个 crate 负责把服务注册基础设施组装成可运行的宿主。
//!
//! ## 主要功能
//!
//! - **服务宿主构建器**: 使用构建者模式组装宿主
//! - **作用域管理**: 应用作用域随宿主创建，项目作用域按需打开和关闭
//! - **日志初始化**: 按配置安装 tracing 订阅者
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use di_impl::ImplementationCatalog;
//! use infrastructure_common::ServiceDescriptor;
//! use infrastructure_composition::ServiceHost;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Arc::new(ImplementationCatalog::new());
//!     let host = ServiceHost::builder()
//!         .with_config_file("config/host.toml")?
//!         .with_factory(catalog)
//!         .with_logging(true)
//!         .build()?;
//!
//!     host.application_services()
//!         .register_extension(ServiceDescriptor::new("Logger", "FileLogger"))?;
//!     let logger = host.resolve("Logger")?;
//!     println!("{:?}", logger);
//!
//!     host.shutdown();
//!     Ok(())
//! }
//! ```

pub mod host;
pub mod logging;

pub use host::{ServiceHost, ServiceHostBuilder};
pub use logging::init_logging;

// 重新导出错误类型
pub use infrastructure_common::InfrastructureError;
