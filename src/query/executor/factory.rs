//! 执行器工厂
//!
//! 按计划节点类型直接匹配创建对应的执行器实例。

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::Value;
use crate::query::executor::context::ExecutorContext;
use crate::query::executor::operators::{
    AggregateExecutor, DeleteExecutor, IndexScanExecutor, InsertExecutor, LimitExecutor,
    MaterializeExecutor, MergeJoinExecutor, NestedLoopJoinExecutor, OrderByExecutor,
    ProjectionExecutor, SeqScanExecutor, UpdateExecutor,
};
use crate::query::executor::traits::BoxedExecutor;
use crate::query::plan::{PlanNode, PlanNodeBody};
use crate::storage::StorageClient;
use crate::transaction::Transaction;

/// 根据计划节点创建执行器
///
/// 不支持的节点类型返回 `None`，由调用方决定跳过或报错。
/// 执行器上下文在匹配成功后才构造，避免为不支持的节点分配。
pub fn create_executor<S: StorageClient + 'static>(
    plan: &Arc<PlanNode>,
    txn: &Arc<Transaction>,
    params: &Arc<Vec<Value>>,
    storage: &Arc<Mutex<S>>,
) -> Option<BoxedExecutor<S>> {
    let context = || ExecutorContext::new(Arc::clone(txn), Arc::clone(params));

    match plan.body() {
        PlanNodeBody::SeqScan { table } => Some(Box::new(SeqScanExecutor::new(
            Arc::clone(plan),
            context(),
            Arc::clone(storage),
            table.clone(),
        ))),
        PlanNodeBody::IndexScan {
            table,
            key_column,
            key_value,
        } => Some(Box::new(IndexScanExecutor::new(
            Arc::clone(plan),
            context(),
            Arc::clone(storage),
            table.clone(),
            *key_column,
            key_value.clone(),
        ))),
        PlanNodeBody::Insert { table, rows } => Some(Box::new(InsertExecutor::new(
            Arc::clone(plan),
            context(),
            Arc::clone(storage),
            table.clone(),
            rows.clone(),
        ))),
        PlanNodeBody::Delete { table } => Some(Box::new(DeleteExecutor::new(
            Arc::clone(plan),
            context(),
            Arc::clone(storage),
            table.clone(),
        ))),
        PlanNodeBody::Update { table, assignments } => Some(Box::new(UpdateExecutor::new(
            Arc::clone(plan),
            context(),
            Arc::clone(storage),
            table.clone(),
            assignments.clone(),
        ))),
        PlanNodeBody::Limit { limit, offset } => Some(Box::new(LimitExecutor::new(
            Arc::clone(plan),
            context(),
            Arc::clone(storage),
            *limit,
            *offset,
        ))),
        PlanNodeBody::NestedLoopJoin {
            left_key,
            right_key,
        } => Some(Box::new(NestedLoopJoinExecutor::new(
            Arc::clone(plan),
            context(),
            Arc::clone(storage),
            *left_key,
            *right_key,
        ))),
        PlanNodeBody::MergeJoin {
            left_key,
            right_key,
        } => Some(Box::new(MergeJoinExecutor::new(
            Arc::clone(plan),
            context(),
            Arc::clone(storage),
            *left_key,
            *right_key,
        ))),
        PlanNodeBody::Projection { columns } => Some(Box::new(ProjectionExecutor::new(
            Arc::clone(plan),
            context(),
            Arc::clone(storage),
            columns.clone(),
        ))),
        PlanNodeBody::Materialize => Some(Box::new(MaterializeExecutor::new(
            Arc::clone(plan),
            context(),
            Arc::clone(storage),
        ))),
        PlanNodeBody::Aggregate {
            group_by,
            aggregates,
        } => Some(Box::new(AggregateExecutor::new(
            Arc::clone(plan),
            context(),
            Arc::clone(storage),
            group_by.clone(),
            aggregates.clone(),
        ))),
        PlanNodeBody::OrderBy { sort_items } => Some(Box::new(OrderByExecutor::new(
            Arc::clone(plan),
            context(),
            Arc::clone(storage),
            sort_items.clone(),
        ))),
        PlanNodeBody::Invalid => {
            log::error!("不支持的计划节点类型: {} (id={})", plan.node_type(), plan.id());
            None
        }
    }
}
