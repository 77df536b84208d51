//! 结果处理执行器
//!
//! 投影、限制、排序、聚合和物化。限制执行器逐瓦片透传并原地
//! 裁剪（不复制行），因此处于物化触发集合中；排序和聚合属于
//! 阻塞执行器，先排空子执行器再产出单个自有瓦片。

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::error::{DBResult, QueryError};
use crate::core::{Row, Value};
use crate::query::executor::context::ExecutorContext;
use crate::query::executor::tile::Tile;
use crate::query::executor::traits::{BaseExecutor, Executor};
use crate::query::plan::{AggFunc, AggSpec, PlanNode, SortOrder};
use crate::storage::StorageClient;

/// 投影执行器
pub struct ProjectionExecutor<S: StorageClient> {
    base: BaseExecutor<S>,
    columns: Vec<usize>,
}

impl<S: StorageClient> ProjectionExecutor<S> {
    pub fn new(
        plan: Arc<PlanNode>,
        context: ExecutorContext,
        storage: Arc<Mutex<S>>,
        columns: Vec<usize>,
    ) -> Self {
        Self {
            base: BaseExecutor::new("ProjectionExecutor", plan, context, storage),
            columns,
        }
    }
}

impl<S: StorageClient> Executor<S> for ProjectionExecutor<S> {
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
        let Some(tile) = self.base.pull_child(0)? else {
            return Ok(false);
        };

        let mut rows: Vec<Row> = Vec::with_capacity(tile.row_count());
        for i in 0..tile.row_count() {
            if let Some(row) = tile.row(i) {
                let projected = self
                    .columns
                    .iter()
                    .map(|c| row.get(*c).cloned().unwrap_or(Value::Null))
                    .collect();
                rows.push(projected);
            }
        }
        self.base.output = Some(Tile::owned(rows));
        Ok(true)
    }
}

/// 限制执行器 - 实现LIMIT和OFFSET功能
pub struct LimitExecutor<S: StorageClient> {
    base: BaseExecutor<S>,
    /// 限制数量
    limit: Option<usize>,
    /// 偏移量
    offset: usize,
    /// 已跳过的行数
    skipped: usize,
    /// 已产出的行数
    emitted: usize,
}

impl<S: StorageClient> LimitExecutor<S> {
    pub fn new(
        plan: Arc<PlanNode>,
        context: ExecutorContext,
        storage: Arc<Mutex<S>>,
        limit: Option<usize>,
        offset: usize,
    ) -> Self {
        Self {
            base: BaseExecutor::new("LimitExecutor", plan, context, storage),
            limit,
            offset,
            skipped: 0,
            emitted: 0,
        }
    }
}

impl<S: StorageClient> Executor<S> for LimitExecutor<S> {
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
        if let Some(limit) = self.limit {
            if self.emitted >= limit {
                return Ok(false);
            }
        }

        let Some(mut tile) = self.base.pull_child(0)? else {
            return Ok(false);
        };

        // 应用尚未消耗完的偏移量
        let skip_now = (self.offset - self.skipped).min(tile.row_count());
        self.skipped += skip_now;
        let remaining = self.limit.map(|l| l - self.emitted);
        tile.retain_range(skip_now, remaining);
        self.emitted += tile.row_count();

        // 瓦片透传保持原有所有权模式（引用瓦片仍是引用瓦片）
        self.base.output = Some(tile);
        Ok(true)
    }
}

/// 排序执行器
///
/// 阻塞执行器：排空子执行器后按排序项整体排序
pub struct OrderByExecutor<S: StorageClient> {
    base: BaseExecutor<S>,
    sort_items: Vec<(usize, SortOrder)>,
    done: bool,
}

impl<S: StorageClient> OrderByExecutor<S> {
    pub fn new(
        plan: Arc<PlanNode>,
        context: ExecutorContext,
        storage: Arc<Mutex<S>>,
        sort_items: Vec<(usize, SortOrder)>,
    ) -> Self {
        Self {
            base: BaseExecutor::new("OrderByExecutor", plan, context, storage),
            sort_items,
            done: false,
        }
    }
}

impl<S: StorageClient> Executor<S> for OrderByExecutor<S> {
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

        let mut rows = self.base.drain_child_rows(0)?;
        let sort_items = self.sort_items.clone();
        rows.sort_by(|a, b| {
            for (column, order) in &sort_items {
                let lhs = a.get(*column).unwrap_or(&Value::Null);
                let rhs = b.get(*column).unwrap_or(&Value::Null);
                let cmp = match order {
                    SortOrder::Asc => lhs.compare(rhs),
                    SortOrder::Desc => rhs.compare(lhs),
                };
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            Ordering::Equal
        });
        self.base.output = Some(Tile::owned(rows));
        Ok(true)
    }
}

/// 分组键
///
/// `Value` 含浮点数无法派生 `Ord`，用 `Value::compare` 的全序包装
#[derive(Debug, Clone)]
struct GroupKey(Vec<Value>);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            let cmp = a.compare(b);
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

/// 单个聚合函数的累积状态
#[derive(Debug, Clone)]
struct AggState {
    func: AggFunc,
    count: u64,
    acc: Option<Value>,
}

impl AggState {
    fn new(func: AggFunc) -> Self {
        Self {
            func,
            count: 0,
            acc: None,
        }
    }

    fn feed(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }
        self.count += 1;
        match self.func {
            AggFunc::Count => {}
            AggFunc::Sum => {
                self.acc = Some(match self.acc.take() {
                    None => value.clone(),
                    Some(Value::Int(a)) => match value {
                        Value::Int(b) => Value::Int(a + b),
                        Value::Float(b) => Value::Float(a as f64 + b),
                        _ => Value::Int(a),
                    },
                    Some(Value::Float(a)) => match value {
                        Value::Int(b) => Value::Float(a + *b as f64),
                        Value::Float(b) => Value::Float(a + b),
                        _ => Value::Float(a),
                    },
                    Some(other) => other,
                });
            }
            AggFunc::Min => {
                let replace = match &self.acc {
                    None => true,
                    Some(current) => value.compare(current) == Ordering::Less,
                };
                if replace {
                    self.acc = Some(value.clone());
                }
            }
            AggFunc::Max => {
                let replace = match &self.acc {
                    None => true,
                    Some(current) => value.compare(current) == Ordering::Greater,
                };
                if replace {
                    self.acc = Some(value.clone());
                }
            }
        }
    }

    fn finish(self) -> Value {
        match self.func {
            AggFunc::Count => Value::Int(self.count as i64),
            _ => self.acc.unwrap_or(Value::Null),
        }
    }
}

/// 聚合执行器
///
/// 阻塞执行器：排空子执行器后按分组键聚合；无分组键且无输入时
/// 仍产出一行（COUNT 为 0）
pub struct AggregateExecutor<S: StorageClient> {
    base: BaseExecutor<S>,
    group_by: Vec<usize>,
    aggregates: Vec<AggSpec>,
    done: bool,
}

impl<S: StorageClient> AggregateExecutor<S> {
    pub fn new(
        plan: Arc<PlanNode>,
        context: ExecutorContext,
        storage: Arc<Mutex<S>>,
        group_by: Vec<usize>,
        aggregates: Vec<AggSpec>,
    ) -> Self {
        Self {
            base: BaseExecutor::new("AggregateExecutor", plan, context, storage),
            group_by,
            aggregates,
            done: false,
        }
    }
}

impl<S: StorageClient> Executor<S> for AggregateExecutor<S> {
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

        let rows = self.base.drain_child_rows(0)?;
        let mut groups: BTreeMap<GroupKey, Vec<AggState>> = BTreeMap::new();

        for row in &rows {
            let key = GroupKey(
                self.group_by
                    .iter()
                    .map(|c| row.get(*c).cloned().unwrap_or(Value::Null))
                    .collect(),
            );
            let states = groups
                .entry(key)
                .or_insert_with(|| self.aggregates.iter().map(|a| AggState::new(a.func)).collect());
            for (state, spec) in states.iter_mut().zip(self.aggregates.iter()) {
                state.feed(row.get(spec.column).unwrap_or(&Value::Null));
            }
        }

        // 无分组时保证输出一行
        if groups.is_empty() && self.group_by.is_empty() {
            groups.insert(
                GroupKey(Vec::new()),
                self.aggregates.iter().map(|a| AggState::new(a.func)).collect(),
            );
        }

        let mut output: Vec<Row> = Vec::with_capacity(groups.len());
        for (key, states) in groups {
            let mut row = key.0;
            row.extend(states.into_iter().map(AggState::finish));
            output.push(row);
        }
        self.base.output = Some(Tile::owned(output));
        Ok(true)
    }
}

/// 物化执行器
///
/// 把子执行器的瓦片复制为自有瓦片。作为计划节点出现时携带
/// 计划与上下文；作为驱动器插入的根部包装器时两者皆无。
pub struct MaterializeExecutor<S: StorageClient> {
    base: BaseExecutor<S>,
}

impl<S: StorageClient> MaterializeExecutor<S> {
    pub fn new(plan: Arc<PlanNode>, context: ExecutorContext, storage: Arc<Mutex<S>>) -> Self {
        Self {
            base: BaseExecutor::new("MaterializeExecutor", plan, context, storage),
        }
    }

    /// 游离构造：无计划节点、无上下文
    pub fn detached() -> Self {
        Self {
            base: BaseExecutor::detached("MaterializeExecutor"),
        }
    }
}

impl<S: StorageClient> Executor<S> for MaterializeExecutor<S> {
    fn base(&self) -> &BaseExecutor<S> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseExecutor<S> {
        &mut self.base
    }

    fn init(&mut self) -> DBResult<()> {
        if self.base.children.is_empty() {
            return Err(QueryError::MissingInput("MaterializeExecutor".to_string()).into());
        }
        self.base.init_children()
    }

    fn execute(&mut self) -> DBResult<bool> {
        let Some(tile) = self.base.pull_child(0)? else {
            return Ok(false);
        };
        self.base.output = Some(tile.materialize());
        Ok(true)
    }
}
