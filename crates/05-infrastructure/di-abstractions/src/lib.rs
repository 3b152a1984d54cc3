//! # Dependency Injection Abstractions
//! 
//! 服务注册抽象层，定义描述符来源、构造机制和服务解析的核心接口。
//! 
//! ## 核心接口
//! 
//! - [`DescriptorFeed`] / [`DescriptorListener`] - 描述符增删通知
//! - [`ServiceFactory`] / [`ServiceConstructor`] - 构造机制
//! - [`ServiceResolver`] - 服务解析接口
//! - [`ResolutionChain`] - 线程内解析链，用于检测循环依赖

pub mod factory;
pub mod feed;
pub mod resolver;

pub use factory::*;
pub use feed::*;
pub use resolver::*;
