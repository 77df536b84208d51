//! 事务上下文
//!
//! 管理单个事务的状态和执行结果

use std::time::Instant;

use crossbeam_utils::atomic::AtomicCell;

use crate::transaction::types::{
    TransactionError, TransactionId, TransactionResult, TransactionState,
};

/// 事务句柄
///
/// 通过 `Arc<Transaction>` 在执行器上下文之间共享；状态和结果
/// 使用 `AtomicCell` 保存，读写无需外部锁
pub struct Transaction {
    /// 事务ID
    id: TransactionId,
    /// 当前状态
    state: AtomicCell<TransactionState>,
    /// 执行结果
    result: AtomicCell<TransactionResult>,
    /// 开始时间戳
    start_time: Instant,
}

impl Transaction {
    /// 创建新的活跃事务
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: AtomicCell::new(TransactionState::Active),
            result: AtomicCell::new(TransactionResult::Success),
            start_time: Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state.load()
    }

    pub fn result(&self) -> TransactionResult {
        self.result.load()
    }

    /// 记录执行结果
    ///
    /// 只影响结果字段，不推进状态机
    pub fn set_result(&self, result: TransactionResult) {
        self.result.store(result);
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// 推进到已提交状态
    ///
    /// 终态只能到达一次；从非活跃状态提交返回错误
    pub(crate) fn mark_committed(&self) -> Result<(), TransactionError> {
        let current = self.state.load();
        if !current.can_commit() {
            return Err(TransactionError::InvalidStateForCommit(current));
        }
        self.state.store(TransactionState::Committed);
        Ok(())
    }

    /// 推进到已中止状态
    pub(crate) fn mark_aborted(&self) -> Result<(), TransactionError> {
        let current = self.state.load();
        if !current.can_abort() {
            return Err(TransactionError::InvalidStateForAbort(current));
        }
        self.state.store(TransactionState::Aborted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let txn = Transaction::new(7);
        assert_eq!(txn.id(), 7);
        assert_eq!(txn.state(), TransactionState::Active);
        assert_eq!(txn.result(), TransactionResult::Success);
    }

    #[test]
    fn test_terminal_state_is_one_way() {
        let txn = Transaction::new(1);
        txn.mark_committed().expect("提交失败");
        assert!(txn.state().is_terminal());
        // 终态后不可再转换
        assert!(txn.mark_aborted().is_err());
        assert!(txn.mark_committed().is_err());
    }

    #[test]
    fn test_result_does_not_touch_state() {
        let txn = Transaction::new(1);
        txn.set_result(TransactionResult::Failure);
        assert_eq!(txn.state(), TransactionState::Active);
        assert_eq!(txn.result(), TransactionResult::Failure);
    }
}
