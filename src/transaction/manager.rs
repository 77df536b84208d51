//! 事务管理器
//!
//! 管理所有事务的生命周期，提供事务的查找、开始、提交、中止等操作。
//! 事务以调用方提供的ID为键；同一ID的并发调用需要由调用方串行化。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::transaction::context::Transaction;
use crate::transaction::types::{TransactionError, TransactionId};

/// 事务统计信息
#[derive(Debug, Default)]
pub struct TransactionStats {
    /// 已开始的事务总数
    pub started: AtomicU64,
    /// 已提交的事务总数
    pub committed: AtomicU64,
    /// 已中止的事务总数
    pub aborted: AtomicU64,
}

/// 事务管理器配置
#[derive(Debug, Clone)]
pub struct TransactionManagerConfig {
    /// 最大并发事务数
    pub max_concurrent_transactions: usize,
}

impl Default for TransactionManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transactions: 1000,
        }
    }
}

/// 事务管理器
pub struct TransactionManager {
    /// 配置
    config: TransactionManagerConfig,
    /// 活跃事务表
    active_transactions: RwLock<HashMap<TransactionId, Arc<Transaction>>>,
    /// 统计信息
    stats: TransactionStats,
}

impl TransactionManager {
    /// 创建新的事务管理器
    pub fn new(config: TransactionManagerConfig) -> Self {
        Self {
            config,
            active_transactions: RwLock::new(HashMap::new()),
            stats: TransactionStats::default(),
        }
    }

    /// 按ID查找活跃事务
    ///
    /// 找到表示本次调用参与一个多语句事务；未找到则由调用者
    /// 通过 `start_transaction` 开启单语句事务
    pub fn get_transaction(&self, id: TransactionId) -> Option<Arc<Transaction>> {
        self.active_transactions.read().get(&id).cloned()
    }

    /// 以给定ID开始新事务
    pub fn start_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Arc<Transaction>, TransactionError> {
        let mut active = self.active_transactions.write();
        if active.contains_key(&id) {
            return Err(TransactionError::TransactionAlreadyExists(id));
        }
        if active.len() >= self.config.max_concurrent_transactions {
            return Err(TransactionError::TooManyTransactions);
        }

        let txn = Arc::new(Transaction::new(id));
        active.insert(id, txn.clone());
        self.stats.started.fetch_add(1, Ordering::Relaxed);
        log::debug!("事务开始: {}", id);
        Ok(txn)
    }

    /// 提交事务
    pub fn commit_transaction(&self, txn: &Arc<Transaction>) -> Result<(), TransactionError> {
        txn.mark_committed()?;
        self.active_transactions.write().remove(&txn.id());
        self.stats.committed.fetch_add(1, Ordering::Relaxed);
        log::debug!("事务提交: {}", txn.id());
        Ok(())
    }

    /// 中止事务
    pub fn abort_transaction(&self, txn: &Arc<Transaction>) -> Result<(), TransactionError> {
        txn.mark_aborted()?;
        self.active_transactions.write().remove(&txn.id());
        self.stats.aborted.fetch_add(1, Ordering::Relaxed);
        log::debug!("事务中止: {}", txn.id());
        Ok(())
    }

    /// 当前活跃事务数
    pub fn active_count(&self) -> usize {
        self.active_transactions.read().len()
    }

    /// 获取统计信息
    pub fn stats(&self) -> &TransactionStats {
        &self.stats
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(TransactionManagerConfig::default())
    }
}
