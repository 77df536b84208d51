//! 核心数据结构定义
//!
//! 提供行、列定义和模式等关系型基础类型

use serde::{Deserialize, Serialize};

use super::value::{Value, ValueType};

/// 表行，列值按模式顺序排列
pub type Row = Vec<Value>;

/// 列定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// 列名
    pub name: String,
    /// 列类型
    pub value_type: ValueType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// 表模式
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// 列定义列表
    pub columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    /// 列数
    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

/// 估算一行占用的内存字节数
pub fn estimated_row_size(row: &Row) -> usize {
    row.iter().map(Value::estimated_size).sum()
}
