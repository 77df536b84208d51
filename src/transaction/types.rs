//! 事务管理类型定义
//!
//! 提供事务管理所需的核心类型和结构

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 事务ID
///
/// 由调用方（语句执行层）分配并传入，不在本模块内生成
pub type TransactionId = u64;

/// 事务状态
///
/// 单向状态机：`Active -> Committed | Aborted`，到达终态后不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    /// 活跃状态，可执行读写操作
    Active,
    /// 已提交
    Committed,
    /// 已中止
    Aborted,
}

impl TransactionState {
    /// 检查是否可以提交
    pub fn can_commit(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    /// 检查是否可以中止
    pub fn can_abort(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    /// 检查是否已结束
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Committed | TransactionState::Aborted)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Active => write!(f, "Active"),
            TransactionState::Committed => write!(f, "Committed"),
            TransactionState::Aborted => write!(f, "Aborted"),
        }
    }
}

/// 事务执行结果
///
/// 执行驱动器据此决定提交还是中止
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionResult {
    /// 执行成功
    #[default]
    Success,
    /// 执行失败
    Failure,
}

impl fmt::Display for TransactionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionResult::Success => write!(f, "Success"),
            TransactionResult::Failure => write!(f, "Failure"),
        }
    }
}

/// 事务所有权
///
/// 事务边界解析的显式结果：谁负责关闭这个事务
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnOwnership {
    /// 多语句事务，由调用方开启并负责关闭
    CallerOwned,
    /// 单语句事务，由本次调用创建并在结束时关闭
    ThisCallOwned,
}

/// 事务错误类型
#[derive(Error, Debug, Clone)]
pub enum TransactionError {
    #[error("事务开始失败: {0}")]
    BeginFailed(String),

    #[error("事务未找到: {0}")]
    TransactionNotFound(TransactionId),

    #[error("事务已存在: {0}")]
    TransactionAlreadyExists(TransactionId),

    #[error("无效的状态用于提交: {0}")]
    InvalidStateForCommit(TransactionState),

    #[error("无效的状态用于中止: {0}")]
    InvalidStateForAbort(TransactionState),

    #[error("并发事务数过多")]
    TooManyTransactions,
}
