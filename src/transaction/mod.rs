//! 事务模块
//!
//! 提供事务句柄、事务管理器以及相关类型定义。
//! 并发控制与日志属于外部协作者，本模块只维护事务的
//! 生命周期状态机与执行结果。

pub mod context;
pub mod manager;
pub mod types;

pub use context::Transaction;
pub use manager::{TransactionManager, TransactionManagerConfig, TransactionStats};
pub use types::{
    TransactionError, TransactionId, TransactionResult, TransactionState, TxnOwnership,
};
