//! # 服务注册具体实现
//!
//! 提供作用域服务注册表、单例槽位、扩展点和服务管理器的实现。
//!
//! - [`ServiceRegistry`] - 接口键到单例槽位的映射，变更串行化
//! - [`SingletonSlot`] - 延迟构造、并发安全的单例
//! - [`ExtensionPoint`] - 内存中的描述符来源
//! - [`ServiceManager`] - 将注册表绑定到描述符来源
//! - [`ImplementationCatalog`] - 按插件命名空间登记构造器

pub mod catalog;
pub mod environment;
pub mod extension_point;
pub mod manager;
pub mod registry;
pub mod slot;

pub use catalog::ImplementationCatalog;
pub use environment::ServiceEnvironment;
pub use extension_point::ExtensionPoint;
pub use manager::ServiceManager;
pub use registry::ServiceRegistry;
pub use slot::{SingletonSlot, SlotState};
