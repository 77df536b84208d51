//! 扫描执行器
//!
//! 顺序扫描与索引扫描。两者都产生引用模式的瓦片：瓦片只持有
//! 存储快照的 `Arc` 和行号，不复制行数据，因此处于物化触发集合中。

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::error::{DBResult, QueryError};
use crate::core::Value;
use crate::query::executor::context::ExecutorContext;
use crate::query::executor::tile::Tile;
use crate::query::executor::traits::{BaseExecutor, Executor};
use crate::query::plan::{PlanNode, PlanValue};
use crate::storage::{StorageClient, Table};

/// 顺序扫描执行器
pub struct SeqScanExecutor<S: StorageClient> {
    base: BaseExecutor<S>,
    table_name: String,
    snapshot: Option<Arc<Table>>,
    done: bool,
}

impl<S: StorageClient> SeqScanExecutor<S> {
    pub fn new(
        plan: Arc<PlanNode>,
        context: ExecutorContext,
        storage: Arc<Mutex<S>>,
        table_name: String,
    ) -> Self {
        Self {
            base: BaseExecutor::new("SeqScanExecutor", plan, context, storage),
            table_name,
            snapshot: None,
            done: false,
        }
    }
}

impl<S: StorageClient> Executor<S> for SeqScanExecutor<S> {
    fn base(&self) -> &BaseExecutor<S> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseExecutor<S> {
        &mut self.base
    }

    fn init(&mut self) -> DBResult<()> {
        let storage = self
            .base
            .storage
            .as_ref()
            .ok_or_else(|| QueryError::MissingInput("SeqScanExecutor".to_string()))?;
        self.snapshot = Some(storage.lock().snapshot(&self.table_name)?);
        self.base.init_children()
    }

    fn execute(&mut self) -> DBResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;

        let snapshot = self
            .snapshot
            .clone()
            .ok_or_else(|| QueryError::ExecutionError("扫描执行器未初始化".to_string()))?;
        let row_ids: Vec<usize> = (0..snapshot.rows.len()).collect();
        log::trace!("顺序扫描 {} 产生 {} 行", self.table_name, row_ids.len());
        self.base.output = Some(Tile::referenced(snapshot, row_ids));
        Ok(true)
    }
}

/// 索引扫描执行器
///
/// 按键列等值过滤；键值可以引用绑定参数，在 `init` 时解析
pub struct IndexScanExecutor<S: StorageClient> {
    base: BaseExecutor<S>,
    table_name: String,
    key_column: usize,
    key_value: PlanValue,
    resolved_key: Option<Value>,
    snapshot: Option<Arc<Table>>,
    done: bool,
}

impl<S: StorageClient> IndexScanExecutor<S> {
    pub fn new(
        plan: Arc<PlanNode>,
        context: ExecutorContext,
        storage: Arc<Mutex<S>>,
        table_name: String,
        key_column: usize,
        key_value: PlanValue,
    ) -> Self {
        Self {
            base: BaseExecutor::new("IndexScanExecutor", plan, context, storage),
            table_name,
            key_column,
            key_value,
            resolved_key: None,
            snapshot: None,
            done: false,
        }
    }
}

impl<S: StorageClient> Executor<S> for IndexScanExecutor<S> {
    fn base(&self) -> &BaseExecutor<S> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseExecutor<S> {
        &mut self.base
    }

    fn init(&mut self) -> DBResult<()> {
        let context = self
            .base
            .context
            .as_ref()
            .ok_or_else(|| QueryError::MissingInput("IndexScanExecutor".to_string()))?;
        self.resolved_key = Some(context.resolve(&self.key_value)?);

        let storage = self
            .base
            .storage
            .as_ref()
            .ok_or_else(|| QueryError::MissingInput("IndexScanExecutor".to_string()))?;
        self.snapshot = Some(storage.lock().snapshot(&self.table_name)?);
        self.base.init_children()
    }

    fn execute(&mut self) -> DBResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;

        let snapshot = self
            .snapshot
            .clone()
            .ok_or_else(|| QueryError::ExecutionError("扫描执行器未初始化".to_string()))?;
        let key = self
            .resolved_key
            .clone()
            .ok_or_else(|| QueryError::ExecutionError("索引键未解析".to_string()))?;

        let row_ids: Vec<usize> = snapshot
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.get(self.key_column) == Some(&key))
            .map(|(id, _)| id)
            .collect();
        log::trace!(
            "索引扫描 {} 键列 {} 命中 {} 行",
            self.table_name,
            self.key_column,
            row_ids.len()
        );
        self.base.output = Some(Tile::referenced(snapshot, row_ids));
        Ok(true)
    }
}
