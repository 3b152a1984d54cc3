//! # Infrastructure Common
//!
//! 这个 crate 提供了 Lorn ADSP 服务注册基础设施的公共模型和工具。
//!
//! ## 核心组件
//!
//! - [`ServiceDescriptor`] - 服务绑定描述符
//! - [`Service`] / [`Disposable`] - 服务实例能力
//! - [`DisposalTree`] - 作用域销毁树
//! - [`HeavyProcessLatch`] - 重量级操作标记
//! - [`DependencyError`] - 注册与解析错误
//!
//! ## 设计原则
//!
//! - 描述符不可变，按身份键比较
//! - 销毁顺序由显式的父子关系决定，而不是析构函数
//! - 进程级标记以显式句柄传递

pub mod configuration;
pub mod descriptor;
pub mod errors;
pub mod latch;
pub mod lifecycle;
pub mod service;

pub use configuration::*;
pub use descriptor::*;
pub use errors::*;
pub use latch::*;
pub use lifecycle::*;
pub use service::*;
