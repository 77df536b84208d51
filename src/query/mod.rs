//! 查询模块：计划表示与执行引擎

pub mod executor;
pub mod plan;
