//! 执行器算子模块

pub mod dml;
pub mod join;
pub mod result_processing;
pub mod scan;

pub use dml::{DeleteExecutor, InsertExecutor, UpdateExecutor};
pub use join::{MergeJoinExecutor, NestedLoopJoinExecutor};
pub use result_processing::{
    AggregateExecutor, LimitExecutor, MaterializeExecutor, OrderByExecutor, ProjectionExecutor,
};
pub use scan::{IndexScanExecutor, SeqScanExecutor};
