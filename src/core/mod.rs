//! 核心类型模块
//!
//! 提供值类型、行/模式定义和统一错误处理

pub mod error;
pub mod types;
pub mod value;

pub use error::{DBError, DBResult, QueryError, StorageError};
pub use types::{estimated_row_size, ColumnDef, Row, Schema};
pub use value::{Value, ValueType};
