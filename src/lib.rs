//! RelDB - 关系型查询执行引擎
//!
//! 把查询计划树编译为拉取式执行器树并驱动执行，负责结果行的
//! 外部格式转换和单语句/多语句事务边界管理。
//!
//! # 架构
//!
//! - `query::plan` - 计划树表示
//! - `query::executor` - 执行器树的编译、物化插入与驱动循环
//! - `transaction` - 事务生命周期管理
//! - `storage` - 写时复制的内存存储
//! - `api` - 外部行格式与参数绑定
//! - `core` - 值类型与统一错误
//! - `config` / `utils` - 配置加载与日志初始化

pub mod api;
pub mod config;
pub mod core;
pub mod query;
pub mod storage;
pub mod transaction;
pub mod utils;

pub use crate::core::error::{DBError, DBResult};
pub use query::executor::{ExecutionStatus, PlanExecutor};
