//! 外部行格式转换
//!
//! 内部行（`Vec<Value>`）与面向客户端的 JSON 行之间的转换，
//! 以及外部参数到内部值的绑定。

use serde_json::{Map, Number};

use crate::core::{Row, Value};

/// 输出行描述中的单列
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDesc {
    pub name: String,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// 输出行描述：列名按位置对应内部行
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowDescriptor {
    pub columns: Vec<ColumnDesc>,
}

impl RowDescriptor {
    pub fn new(names: &[&str]) -> Self {
        Self {
            columns: names.iter().map(|n| ColumnDesc::new(*n)).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

/// 交给客户端的一行，JSON 对象形式
pub type ExternalRow = serde_json::Value;

/// 客户端传入的查询参数
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// 把外部参数列表绑定为内部值列表
pub fn build_params(params: &[ExternalParam]) -> Vec<Value> {
    params
        .iter()
        .map(|p| match p {
            ExternalParam::Null => Value::Null,
            ExternalParam::Bool(b) => Value::Bool(*b),
            ExternalParam::Int(i) => Value::Int(*i),
            ExternalParam::Float(f) => Value::Float(*f),
            ExternalParam::Text(s) => Value::String(s.clone()),
        })
        .collect()
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number(Number::from(*i)),
        Value::Float(f) => match Number::from_f64(*f) {
            Some(n) => serde_json::Value::Number(n),
            None => serde_json::Value::Null,
        },
        Value::String(s) => serde_json::Value::String(s.clone()),
    }
}

/// 按行描述把内部行转换为外部行
///
/// 行宽与描述不一致时返回 `None`，该行被丢弃而不中断执行。
pub fn to_external_row(row: &Row, desc: &RowDescriptor) -> Option<ExternalRow> {
    if row.len() != desc.width() {
        log::warn!("行宽不匹配: 行 {} 列, 描述 {} 列", row.len(), desc.width());
        return None;
    }
    let mut object = Map::with_capacity(row.len());
    for (value, column) in row.iter().zip(desc.columns.iter()) {
        object.insert(column.name.clone(), value_to_json(value));
    }
    Some(serde_json::Value::Object(object))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== 参数绑定测试 ====================

    #[test]
    fn test_build_params() {
        let params = build_params(&[
            ExternalParam::Int(7),
            ExternalParam::Text("张三".to_string()),
            ExternalParam::Null,
        ]);
        assert_eq!(
            params,
            vec![Value::Int(7), Value::String("张三".to_string()), Value::Null]
        );
    }

    // ==================== 行转换测试 ====================

    #[test]
    fn test_to_external_row() {
        let desc = RowDescriptor::new(&["id", "name"]);
        let row = vec![Value::Int(1), Value::String("alice".to_string())];
        let external = to_external_row(&row, &desc).expect("转换应成功");
        assert_eq!(external["id"], serde_json::json!(1));
        assert_eq!(external["name"], serde_json::json!("alice"));
    }

    #[test]
    fn test_to_external_row_width_mismatch() {
        let desc = RowDescriptor::new(&["id"]);
        let row = vec![Value::Int(1), Value::Int(2)];
        assert!(to_external_row(&row, &desc).is_none());
    }

    #[test]
    fn test_to_external_row_nan_becomes_null() {
        let desc = RowDescriptor::new(&["x"]);
        let row = vec![Value::Float(f64::NAN)];
        let external = to_external_row(&row, &desc).expect("转换应成功");
        assert!(external["x"].is_null());
    }
}
