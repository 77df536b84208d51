//! 执行器上下文
//!
//! 每个执行器一份的上下文包：活跃事务句柄（共享引用，不拥有）
//! 和绑定参数数组（构造后不可变）。在工厂的匹配分支内按需构造，
//! 随执行器一同转移所有权——不支持的节点不会产生多余的上下文。

use std::sync::Arc;

use crate::core::error::DBResult;
use crate::core::Value;
use crate::query::plan::PlanValue;
use crate::transaction::Transaction;

/// 执行器上下文
#[derive(Clone)]
pub struct ExecutorContext {
    /// 活跃事务句柄
    txn: Arc<Transaction>,
    /// 绑定参数数组
    params: Arc<Vec<Value>>,
}

impl ExecutorContext {
    pub fn new(txn: Arc<Transaction>, params: Arc<Vec<Value>>) -> Self {
        Self { txn, params }
    }

    pub fn txn(&self) -> &Arc<Transaction> {
        &self.txn
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// 对照绑定参数解析计划值
    pub fn resolve(&self, value: &PlanValue) -> DBResult<Value> {
        value.resolve(&self.params)
    }
}
