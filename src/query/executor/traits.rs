//! 执行器 trait 定义
//!
//! 所有执行器实现统一的拉取式 `Executor` trait。执行器树与计划树
//! 同构（受支持的节点一一对应）；每个执行器独占拥有其子执行器，
//! `add_child` 转移所有权，`take_children` 在拆除时按后序取回。

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::error::{DBResult, QueryError};
use crate::query::executor::context::ExecutorContext;
use crate::query::executor::tile::Tile;
use crate::query::plan::PlanNode;
use crate::storage::StorageClient;

/// 装箱的执行器，树节点的统一形态
pub type BoxedExecutor<S> = Box<dyn Executor<S>>;

/// 统一的执行器 trait
///
/// 拉取协议：`init` 一次，随后反复 `execute`；返回 `Ok(true)` 表示
/// 可能还有输出（通过 `get_output` 取走，所有权转移给调用方），
/// `Ok(false)` 表示数据耗尽。某些执行器（如行变更类）的步骤
/// 合法地不产生瓦片。
pub trait Executor<S: StorageClient>: Send {
    /// 访问基础执行器状态
    fn base(&self) -> &BaseExecutor<S>;

    /// 可变访问基础执行器状态
    fn base_mut(&mut self) -> &mut BaseExecutor<S>;

    /// 初始化执行器（递归初始化子执行器）
    fn init(&mut self) -> DBResult<()>;

    /// 执行一步，true 表示可能还有输出
    fn execute(&mut self) -> DBResult<bool>;

    /// 取走本步产生的输出瓦片
    fn get_output(&mut self) -> Option<Tile> {
        self.base_mut().output.take()
    }

    /// 挂接子执行器（转移所有权）
    fn add_child(&mut self, child: BoxedExecutor<S>) {
        self.base_mut().children.push(child);
    }

    /// 有序子执行器列表
    fn children(&self) -> &[BoxedExecutor<S>] {
        &self.base().children
    }

    /// 取走全部子执行器（用于后序拆除）
    fn take_children(&mut self) -> Vec<BoxedExecutor<S>> {
        std::mem::take(&mut self.base_mut().children)
    }

    /// 底层计划节点，用于物化决策检查
    ///
    /// 物化包装器没有自己的计划节点，返回 None
    fn plan_node(&self) -> Option<&Arc<PlanNode>> {
        self.base().plan.as_ref()
    }

    /// 执行器名称
    fn name(&self) -> &str {
        self.base().name
    }
}

/// 基础执行器
///
/// 提供执行器的通用状态：计划节点、上下文、存储引用、
/// 子执行器和待取走的输出瓦片
pub struct BaseExecutor<S: StorageClient> {
    /// 执行器名称
    pub name: &'static str,
    /// 底层计划节点
    pub plan: Option<Arc<PlanNode>>,
    /// 执行上下文
    pub context: Option<ExecutorContext>,
    /// 存储引擎引用
    pub storage: Option<Arc<Mutex<S>>>,
    /// 子执行器
    pub children: Vec<BoxedExecutor<S>>,
    /// 本步输出
    pub output: Option<Tile>,
}

impl<S: StorageClient> BaseExecutor<S> {
    /// 创建新的基础执行器（带存储）
    pub fn new(
        name: &'static str,
        plan: Arc<PlanNode>,
        context: ExecutorContext,
        storage: Arc<Mutex<S>>,
    ) -> Self {
        Self {
            name,
            plan: Some(plan),
            context: Some(context),
            storage: Some(storage),
            children: Vec::new(),
            output: None,
        }
    }

    /// 创建游离的基础执行器（无计划节点、无上下文、无存储）
    ///
    /// 用于驱动器在根部插入的物化包装器
    pub fn detached(name: &'static str) -> Self {
        Self {
            name,
            plan: None,
            context: None,
            storage: None,
            children: Vec::new(),
            output: None,
        }
    }

    /// 初始化全部子执行器
    pub fn init_children(&mut self) -> DBResult<()> {
        for child in self.children.iter_mut() {
            child.init()?;
        }
        Ok(())
    }

    /// 从第 idx 个子执行器拉取下一个数据瓦片
    ///
    /// 跳过不产生瓦片的步骤；返回 None 表示该子执行器数据耗尽
    pub fn pull_child(&mut self, idx: usize) -> DBResult<Option<Tile>> {
        let child = self
            .children
            .get_mut(idx)
            .ok_or_else(|| QueryError::MissingInput(self.name.to_string()))?;
        while child.execute()? {
            if let Some(tile) = child.get_output() {
                return Ok(Some(tile));
            }
        }
        Ok(None)
    }

    /// 排空第 idx 个子执行器，把所有行复制为自有行
    pub fn drain_child_rows(&mut self, idx: usize) -> DBResult<Vec<crate::core::Row>> {
        let mut rows = Vec::new();
        while let Some(tile) = self.pull_child(idx)? {
            for i in 0..tile.row_count() {
                if let Some(row) = tile.row(i) {
                    rows.push(row.clone());
                }
            }
        }
        Ok(rows)
    }
}
