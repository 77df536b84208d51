//! 查询执行引擎
//!
//! 拉取式执行器树：`factory` 按计划节点创建执行器，
//! `plan_executor` 编译计划树、驱动执行并管理事务边界。

pub mod context;
pub mod factory;
pub mod memory;
pub mod operators;
pub mod plan_executor;
pub mod tile;
pub mod traits;

pub use context::ExecutorContext;
pub use factory::create_executor;
pub use memory::{ConversionScope, MemoryTracker};
pub use plan_executor::{
    add_materialization, build_executor_tree, clean_executor_tree, ExecutionStatus, PlanExecutor,
};
pub use tile::Tile;
pub use traits::{BaseExecutor, BoxedExecutor, Executor};
