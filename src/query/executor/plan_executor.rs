//! 计划执行器
//!
//! 查询计划和执行引擎之间的桥接层：把计划树编译为执行器树，
//! 在根部按需插入物化包装器，驱动拉取循环并把内部行转换为
//! 外部行，最后按事务归属决定是否提交或中止。

use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{build_params, to_external_row, ExternalParam, ExternalRow, RowDescriptor};
use crate::core::error::{DBResult, QueryError};
use crate::core::Value;
use crate::query::executor::factory::create_executor;
use crate::query::executor::memory::{ConversionScope, MemoryTracker};
use crate::query::executor::operators::MaterializeExecutor;
use crate::query::executor::traits::BoxedExecutor;
use crate::query::plan::{print_plan, PlanNode, PlanNodeType};
use crate::storage::StorageClient;
use crate::transaction::{
    Transaction, TransactionId, TransactionManager, TransactionResult, TxnOwnership,
};

/// 一次计划执行的结果
#[derive(Debug, Default)]
pub struct ExecutionStatus {
    /// 执行结果
    pub result: TransactionResult,
    /// 收集到的输出行
    pub rows: Vec<ExternalRow>,
}

/// 递归编译计划树为执行器树
///
/// 支持的节点创建执行器并挂接子树；不支持的节点被跳过，其
/// 唯一子节点直接挂到当前位置。不支持的节点带多个子节点时
/// 无法保持树形，返回错误。
pub fn build_executor_tree<S: StorageClient + 'static>(
    root: Option<BoxedExecutor<S>>,
    plan: Option<&Arc<PlanNode>>,
    txn: &Arc<Transaction>,
    params: &Arc<Vec<Value>>,
    storage: &Arc<Mutex<S>>,
) -> DBResult<Option<BoxedExecutor<S>>> {
    let Some(plan) = plan else {
        return Ok(root);
    };

    match create_executor(plan, txn, params, storage) {
        Some(mut executor) => {
            for child in plan.children() {
                if let Some(child_executor) =
                    build_executor_tree(None, Some(child), txn, params, storage)?
                {
                    executor.add_child(child_executor);
                }
            }
            match root {
                Some(mut root) => {
                    root.add_child(executor);
                    Ok(Some(root))
                }
                None => Ok(Some(executor)),
            }
        }
        None => match plan.children() {
            // 叶子节点跳过后无事可做
            [] => Ok(root),
            // 单子节点：子树顶替被跳过的节点
            [only] => build_executor_tree(root, Some(only), txn, params, storage),
            children => Err(QueryError::InvalidPlanShape {
                children: children.len(),
            }
            .into()),
        },
    }
}

/// 判断根执行器的输出是否需要物化
fn needs_materialization(node_type: PlanNodeType) -> bool {
    matches!(
        node_type,
        PlanNodeType::MergeJoin
            | PlanNodeType::NestedLoopJoin
            | PlanNodeType::SeqScan
            | PlanNodeType::IndexScan
            | PlanNodeType::Limit
    )
}

/// 按需在根部插入物化包装器
///
/// 这些根节点产出的引用瓦片指向存储快照，后续写入会替换快照
/// 使其失效，因此在交给调用方之前复制为自有瓦片。
pub fn add_materialization<S: StorageClient + 'static>(
    root: Option<BoxedExecutor<S>>,
) -> Option<BoxedExecutor<S>> {
    let root = root?;
    let wrap = root
        .plan_node()
        .map(|plan| needs_materialization(plan.node_type()))
        .unwrap_or(false);
    if !wrap {
        return Some(root);
    }

    log::trace!("在执行器树根部插入物化包装器");
    let mut wrapper: BoxedExecutor<S> = Box::new(MaterializeExecutor::detached());
    wrapper.add_child(root);
    Some(wrapper)
}

/// 后序销毁执行器树，子执行器严格先于父执行器释放
pub fn clean_executor_tree<S: StorageClient>(mut root: BoxedExecutor<S>) {
    for child in root.take_children() {
        clean_executor_tree(child);
    }
    drop(root);
}

/// 计划执行器
///
/// 持有存储、事务管理器和内存跟踪器，对外提供 `execute_plan`
pub struct PlanExecutor<S: StorageClient> {
    storage: Arc<Mutex<S>>,
    txn_manager: Arc<TransactionManager>,
    memory: Arc<MemoryTracker>,
}

impl<S: StorageClient + 'static> PlanExecutor<S> {
    pub fn new(
        storage: Arc<Mutex<S>>,
        txn_manager: Arc<TransactionManager>,
        memory: Arc<MemoryTracker>,
    ) -> Self {
        Self {
            storage,
            txn_manager,
            memory,
        }
    }

    pub fn txn_manager(&self) -> &Arc<TransactionManager> {
        &self.txn_manager
    }

    pub fn storage(&self) -> &Arc<Mutex<S>> {
        &self.storage
    }

    /// 执行一棵计划树
    ///
    /// - 空计划直接返回，不创建事务也不修改 `status`
    /// - `txn_id` 对应的事务已存在时表示多语句事务，由调用方
    ///   负责关闭；不存在时开启单语句事务并在本次调用内关闭
    /// - 初始化失败时无论事务归属都立即中止
    ///
    /// 执行失败通过 `status.result` 报告；返回错误仅表示事务
    /// 无法开启。
    pub fn execute_plan(
        &self,
        plan: Option<&Arc<PlanNode>>,
        param_list: &[ExternalParam],
        row_desc: &RowDescriptor,
        status: &mut ExecutionStatus,
        txn_id: TransactionId,
    ) -> DBResult<()> {
        let Some(plan) = plan else {
            log::trace!("计划为空，跳过执行");
            return Ok(());
        };
        print_plan(plan);

        let (txn, ownership) = match self.txn_manager.get_transaction(txn_id) {
            Some(txn) => (txn, TxnOwnership::CallerOwned),
            None => (
                self.txn_manager.start_transaction(txn_id)?,
                TxnOwnership::ThisCallOwned,
            ),
        };
        let params = Arc::new(build_params(param_list));

        let mut init_failure = false;
        let mut rows: Vec<ExternalRow> = Vec::new();

        let root = match build_executor_tree(None, Some(plan), &txn, &params, &self.storage) {
            Ok(root) => add_materialization(root),
            Err(e) => {
                log::error!("执行器树编译失败: {}", e);
                txn.set_result(TransactionResult::Failure);
                init_failure = true;
                None
            }
        };

        if let Some(mut root) = root {
            match root.init() {
                Ok(()) => loop {
                    match root.execute() {
                        Ok(true) => {
                            let Some(tile) = root.get_output() else {
                                continue;
                            };
                            match ConversionScope::enter(&self.memory, tile.estimated_size()) {
                                Ok(_scope) => {
                                    for i in 0..tile.row_count() {
                                        if let Some(row) = tile.row(i) {
                                            if let Some(external) = to_external_row(row, row_desc)
                                            {
                                                rows.push(external);
                                            }
                                        }
                                    }
                                }
                                Err(e) => {
                                    log::error!("结果转换内存分配失败: {}", e);
                                    txn.set_result(TransactionResult::Failure);
                                    break;
                                }
                            }
                        }
                        Ok(false) => break,
                        Err(e) => {
                            log::error!("执行器执行失败: {}", e);
                            txn.set_result(TransactionResult::Failure);
                            break;
                        }
                    }
                },
                Err(e) => {
                    log::error!("执行器初始化失败: {}", e);
                    txn.set_result(TransactionResult::Failure);
                    init_failure = true;
                }
            }
            clean_executor_tree(root);
        }

        // 事务边界：本次调用开启的事务在此关闭；调用方的事务
        // 仅在初始化失败时强制中止
        if ownership == TxnOwnership::ThisCallOwned || init_failure {
            let closed = match txn.result() {
                TransactionResult::Success => self.txn_manager.commit_transaction(&txn),
                TransactionResult::Failure => self.txn_manager.abort_transaction(&txn),
            };
            if let Err(e) = closed {
                log::error!("事务 {} 关闭失败: {}", txn.id(), e);
            }
        }

        status.result = txn.result();
        status.rows = rows;
        Ok(())
    }
}
