//! 计划树模块

pub mod node;

pub use node::{
    print_plan, AggFunc, AggSpec, PlanNode, PlanNodeBody, PlanNodeType, PlanValue, SortOrder,
};
