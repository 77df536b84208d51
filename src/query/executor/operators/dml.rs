//! 行变更执行器
//!
//! 插入、删除、更新。变更执行器不产生输出瓦片：完成一次变更后
//! `execute` 返回 true 且 `get_output` 为 None（驱动器视为
//! "本步无行，继续循环"），下一步返回 false 结束。
//!
//! 删除/更新带子执行器时，从子执行器的引用瓦片中取存储行号
//! 定位受害行；不带子执行器时作用于全表。

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::error::{DBResult, QueryError};
use crate::core::{Row, Value};
use crate::query::executor::context::ExecutorContext;
use crate::query::executor::traits::{BaseExecutor, Executor};
use crate::query::plan::{PlanNode, PlanValue};
use crate::storage::StorageClient;

/// 插入执行器
pub struct InsertExecutor<S: StorageClient> {
    base: BaseExecutor<S>,
    table_name: String,
    rows: Vec<Row>,
    done: bool,
}

impl<S: StorageClient> InsertExecutor<S> {
    pub fn new(
        plan: Arc<PlanNode>,
        context: ExecutorContext,
        storage: Arc<Mutex<S>>,
        table_name: String,
        rows: Vec<Row>,
    ) -> Self {
        Self {
            base: BaseExecutor::new("InsertExecutor", plan, context, storage),
            table_name,
            rows,
            done: false,
        }
    }
}

impl<S: StorageClient> Executor<S> for InsertExecutor<S> {
    fn base(&self) -> &BaseExecutor<S> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseExecutor<S> {
        &mut self.base
    }

    fn init(&mut self) -> DBResult<()> {
        self.base.init_children()
    }

    fn execute(&mut self) -> DBResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;

        let storage = self
            .base
            .storage
            .as_ref()
            .ok_or_else(|| QueryError::MissingInput("InsertExecutor".to_string()))?;
        let rows = std::mem::take(&mut self.rows);
        let count = storage.lock().insert_rows(&self.table_name, rows)?;
        log::debug!("插入 {} 行到 {}", count, self.table_name);
        Ok(true)
    }
}

/// 删除执行器
pub struct DeleteExecutor<S: StorageClient> {
    base: BaseExecutor<S>,
    table_name: String,
    done: bool,
}

impl<S: StorageClient> DeleteExecutor<S> {
    pub fn new(
        plan: Arc<PlanNode>,
        context: ExecutorContext,
        storage: Arc<Mutex<S>>,
        table_name: String,
    ) -> Self {
        Self {
            base: BaseExecutor::new("DeleteExecutor", plan, context, storage),
            table_name,
            done: false,
        }
    }
}

impl<S: StorageClient> Executor<S> for DeleteExecutor<S> {
    fn base(&self) -> &BaseExecutor<S> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseExecutor<S> {
        &mut self.base
    }

    fn init(&mut self) -> DBResult<()> {
        self.base.init_children()
    }

    fn execute(&mut self) -> DBResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;

        let victims = collect_victim_row_ids(&mut self.base)?;
        let storage = self
            .base
            .storage
            .as_ref()
            .ok_or_else(|| QueryError::MissingInput("DeleteExecutor".to_string()))?;
        let count = storage
            .lock()
            .delete_rows(&self.table_name, victims.as_deref())?;
        log::debug!("从 {} 删除 {} 行", self.table_name, count);
        Ok(true)
    }
}

/// 更新执行器
pub struct UpdateExecutor<S: StorageClient> {
    base: BaseExecutor<S>,
    table_name: String,
    assignments: Vec<(usize, PlanValue)>,
    done: bool,
}

impl<S: StorageClient> UpdateExecutor<S> {
    pub fn new(
        plan: Arc<PlanNode>,
        context: ExecutorContext,
        storage: Arc<Mutex<S>>,
        table_name: String,
        assignments: Vec<(usize, PlanValue)>,
    ) -> Self {
        Self {
            base: BaseExecutor::new("UpdateExecutor", plan, context, storage),
            table_name,
            assignments,
            done: false,
        }
    }
}

impl<S: StorageClient> Executor<S> for UpdateExecutor<S> {
    fn base(&self) -> &BaseExecutor<S> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseExecutor<S> {
        &mut self.base
    }

    fn init(&mut self) -> DBResult<()> {
        self.base.init_children()
    }

    fn execute(&mut self) -> DBResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;

        let context = self
            .base
            .context
            .as_ref()
            .ok_or_else(|| QueryError::MissingInput("UpdateExecutor".to_string()))?;
        let resolved: Vec<(usize, Value)> = self
            .assignments
            .iter()
            .map(|(column, value)| Ok((*column, context.resolve(value)?)))
            .collect::<DBResult<_>>()?;

        let victims = collect_victim_row_ids(&mut self.base)?;
        let storage = self
            .base
            .storage
            .as_ref()
            .ok_or_else(|| QueryError::MissingInput("UpdateExecutor".to_string()))?;
        let count =
            storage
                .lock()
                .update_rows(&self.table_name, victims.as_deref(), &resolved)?;
        log::debug!("更新 {} 中 {} 行", self.table_name, count);
        Ok(true)
    }
}

/// 收集受害行号
///
/// 无子执行器返回 None（作用于全表）；有子执行器时排空其输出，
/// 要求瓦片为引用模式（自有瓦片不携带存储行号）
fn collect_victim_row_ids<S: StorageClient>(
    base: &mut BaseExecutor<S>,
) -> DBResult<Option<Vec<usize>>> {
    if base.children.is_empty() {
        return Ok(None);
    }

    let mut row_ids = Vec::new();
    while let Some(tile) = base.pull_child(0)? {
        let ids = tile
            .storage_row_ids()
            .ok_or_else(|| QueryError::MissingRowIds(base.name.to_string()))?;
        row_ids.extend_from_slice(ids);
    }
    Ok(Some(row_ids))
}
