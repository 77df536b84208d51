//! 连接执行器
//!
//! 嵌套循环连接和归并连接，均为单键等值连接。输出行由左右
//! 子行拼接而成。连接类节点处于物化触发集合中：当连接直接
//! 作为树根时，驱动器会在其上插入物化包装器。

use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::error::DBResult;
use crate::core::{Row, Value};
use crate::query::executor::context::ExecutorContext;
use crate::query::executor::tile::Tile;
use crate::query::executor::traits::{BaseExecutor, Executor};
use crate::query::plan::PlanNode;
use crate::storage::StorageClient;

/// 嵌套循环连接执行器
pub struct NestedLoopJoinExecutor<S: StorageClient> {
    base: BaseExecutor<S>,
    left_key: usize,
    right_key: usize,
    done: bool,
}

impl<S: StorageClient> NestedLoopJoinExecutor<S> {
    pub fn new(
        plan: Arc<PlanNode>,
        context: ExecutorContext,
        storage: Arc<Mutex<S>>,
        left_key: usize,
        right_key: usize,
    ) -> Self {
        Self {
            base: BaseExecutor::new("NestedLoopJoinExecutor", plan, context, storage),
            left_key,
            right_key,
            done: false,
        }
    }
}

impl<S: StorageClient> Executor<S> for NestedLoopJoinExecutor<S> {
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

        let left_rows = self.base.drain_child_rows(0)?;
        let right_rows = self.base.drain_child_rows(1)?;

        let mut joined: Vec<Row> = Vec::new();
        for left in &left_rows {
            for right in &right_rows {
                if left.get(self.left_key) == right.get(self.right_key) {
                    let mut row = left.clone();
                    row.extend_from_slice(right);
                    joined.push(row);
                }
            }
        }
        log::trace!(
            "嵌套循环连接: 左 {} 行 × 右 {} 行 -> {} 行",
            left_rows.len(),
            right_rows.len(),
            joined.len()
        );
        self.base.output = Some(Tile::owned(joined));
        Ok(true)
    }
}

/// 归并连接执行器
///
/// 假定两侧输入已按连接键有序（由上游排序节点保证）
pub struct MergeJoinExecutor<S: StorageClient> {
    base: BaseExecutor<S>,
    left_key: usize,
    right_key: usize,
    done: bool,
}

impl<S: StorageClient> MergeJoinExecutor<S> {
    pub fn new(
        plan: Arc<PlanNode>,
        context: ExecutorContext,
        storage: Arc<Mutex<S>>,
        left_key: usize,
        right_key: usize,
    ) -> Self {
        Self {
            base: BaseExecutor::new("MergeJoinExecutor", plan, context, storage),
            left_key,
            right_key,
            done: false,
        }
    }
}

impl<S: StorageClient> Executor<S> for MergeJoinExecutor<S> {
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

        let left_rows = self.base.drain_child_rows(0)?;
        let right_rows = self.base.drain_child_rows(1)?;

        let mut joined: Vec<Row> = Vec::new();
        let mut li = 0;
        let mut ri = 0;
        while li < left_rows.len() && ri < right_rows.len() {
            // 短行（宽度不足键列）按 Null 键处理，不会越界
            let lk = left_rows[li].get(self.left_key).unwrap_or(&Value::Null);
            let rk = right_rows[ri].get(self.right_key).unwrap_or(&Value::Null);
            match lk.compare(rk) {
                Ordering::Less => li += 1,
                Ordering::Greater => ri += 1,
                Ordering::Equal => {
                    // 相同键的组成笛卡尔积
                    let left_end = run_end(&left_rows, li, self.left_key);
                    let right_end = run_end(&right_rows, ri, self.right_key);
                    for left in &left_rows[li..left_end] {
                        for right in &right_rows[ri..right_end] {
                            let mut row = left.clone();
                            row.extend_from_slice(right);
                            joined.push(row);
                        }
                    }
                    li = left_end;
                    ri = right_end;
                }
            }
        }
        log::trace!("归并连接产生 {} 行", joined.len());
        self.base.output = Some(Tile::owned(joined));
        Ok(true)
    }
}

/// 同键行程的结束位置
fn run_end(rows: &[Row], start: usize, key: usize) -> usize {
    let first = rows[start].get(key).unwrap_or(&Value::Null);
    let mut end = start + 1;
    while end < rows.len()
        && rows[end].get(key).unwrap_or(&Value::Null).compare(first) == Ordering::Equal
    {
        end += 1;
    }
    end
}
