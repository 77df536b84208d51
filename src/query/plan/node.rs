//! 计划节点定义
//!
//! 优化器输出的不可变计划树。每个节点携带操作类型判别值、
//! 有序子节点列表和按类型区分的负载。采用闭合枚举避免
//! 动态分发的性能开销；编译器只读计划树，从不修改。

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::error::{DBResult, QueryError};
use crate::core::{Row, Value};

/// 计划节点操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanNodeType {
    /// 顺序扫描
    SeqScan,
    /// 索引扫描
    IndexScan,
    /// 插入
    Insert,
    /// 删除
    Delete,
    /// 更新
    Update,
    /// 限制
    Limit,
    /// 嵌套循环连接
    NestedLoopJoin,
    /// 归并连接
    MergeJoin,
    /// 投影
    Projection,
    /// 物化
    Materialize,
    /// 聚合
    Aggregate,
    /// 排序
    OrderBy,
    /// 无效标记（不支持的节点）
    Invalid,
}

impl fmt::Display for PlanNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlanNodeType::SeqScan => "SeqScan",
            PlanNodeType::IndexScan => "IndexScan",
            PlanNodeType::Insert => "Insert",
            PlanNodeType::Delete => "Delete",
            PlanNodeType::Update => "Update",
            PlanNodeType::Limit => "Limit",
            PlanNodeType::NestedLoopJoin => "NestedLoopJoin",
            PlanNodeType::MergeJoin => "MergeJoin",
            PlanNodeType::Projection => "Projection",
            PlanNodeType::Materialize => "Materialize",
            PlanNodeType::Aggregate => "Aggregate",
            PlanNodeType::OrderBy => "OrderBy",
            PlanNodeType::Invalid => "Invalid",
        };
        write!(f, "{}", name)
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// 聚合函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggFunc {
    Count,
    Sum,
    Min,
    Max,
}

/// 聚合项：对某一列应用某个聚合函数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggSpec {
    pub func: AggFunc,
    pub column: usize,
}

/// 计划中的值：常量或绑定参数引用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanValue {
    /// 字面常量
    Const(Value),
    /// 第 n 个绑定参数
    Param(usize),
}

impl PlanValue {
    /// 对照绑定参数数组解析出具体值
    pub fn resolve(&self, params: &[Value]) -> DBResult<Value> {
        match self {
            PlanValue::Const(v) => Ok(v.clone()),
            PlanValue::Param(index) => params.get(*index).cloned().ok_or_else(|| {
                QueryError::ParamIndexOutOfBounds {
                    index: *index,
                    len: params.len(),
                }
                .into()
            }),
        }
    }
}

/// 计划节点负载
///
/// 每个变体对应一种关系操作，携带该操作所需的最小参数集；
/// 表达式求值不在本系统范围内
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanNodeBody {
    SeqScan {
        table: String,
    },
    IndexScan {
        table: String,
        key_column: usize,
        key_value: PlanValue,
    },
    Insert {
        table: String,
        rows: Vec<Row>,
    },
    Delete {
        table: String,
    },
    Update {
        table: String,
        assignments: Vec<(usize, PlanValue)>,
    },
    Limit {
        limit: Option<usize>,
        offset: usize,
    },
    NestedLoopJoin {
        left_key: usize,
        right_key: usize,
    },
    MergeJoin {
        left_key: usize,
        right_key: usize,
    },
    Projection {
        columns: Vec<usize>,
    },
    Materialize,
    Aggregate {
        group_by: Vec<usize>,
        aggregates: Vec<AggSpec>,
    },
    OrderBy {
        sort_items: Vec<(usize, SortOrder)>,
    },
    Invalid,
}

impl PlanNodeBody {
    /// 负载对应的操作类型
    pub fn node_type(&self) -> PlanNodeType {
        match self {
            PlanNodeBody::SeqScan { .. } => PlanNodeType::SeqScan,
            PlanNodeBody::IndexScan { .. } => PlanNodeType::IndexScan,
            PlanNodeBody::Insert { .. } => PlanNodeType::Insert,
            PlanNodeBody::Delete { .. } => PlanNodeType::Delete,
            PlanNodeBody::Update { .. } => PlanNodeType::Update,
            PlanNodeBody::Limit { .. } => PlanNodeType::Limit,
            PlanNodeBody::NestedLoopJoin { .. } => PlanNodeType::NestedLoopJoin,
            PlanNodeBody::MergeJoin { .. } => PlanNodeType::MergeJoin,
            PlanNodeBody::Projection { .. } => PlanNodeType::Projection,
            PlanNodeBody::Materialize => PlanNodeType::Materialize,
            PlanNodeBody::Aggregate { .. } => PlanNodeType::Aggregate,
            PlanNodeBody::OrderBy { .. } => PlanNodeType::OrderBy,
            PlanNodeBody::Invalid => PlanNodeType::Invalid,
        }
    }
}

/// 计划节点
///
/// 不可变树节点，生命周期完全由调用方/优化器持有；
/// 子节点以 `Arc` 共享，编译器只读不改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    /// 节点ID
    id: i64,
    /// 节点负载
    body: PlanNodeBody,
    /// 有序子节点列表
    children: Vec<Arc<PlanNode>>,
}

impl PlanNode {
    /// 创建叶子节点
    pub fn new(id: i64, body: PlanNodeBody) -> Self {
        Self {
            id,
            body,
            children: Vec::new(),
        }
    }

    /// 创建带子节点的节点
    pub fn with_children(id: i64, body: PlanNodeBody, children: Vec<Arc<PlanNode>>) -> Self {
        Self { id, body, children }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// 获取操作类型判别值
    pub fn node_type(&self) -> PlanNodeType {
        self.body.node_type()
    }

    pub fn body(&self) -> &PlanNodeBody {
        &self.body
    }

    /// 获取有序子节点列表
    pub fn children(&self) -> &[Arc<PlanNode>] {
        &self.children
    }
}

/// 打印计划树
///
/// 按深度缩进逐节点输出到 trace 日志
pub fn print_plan(plan: &PlanNode) {
    print_plan_inner(plan, String::new());
}

fn print_plan_inner(plan: &PlanNode, mut prefix: String) {
    prefix.push_str("  ");
    log::trace!("{}-> 计划节点类型 :: {}", prefix, plan.node_type());
    for child in plan.children() {
        print_plan_inner(child, prefix.clone());
    }
}
