//! 外部接口模块

pub mod row_format;

pub use row_format::{
    build_params, to_external_row, ColumnDesc, ExternalParam, ExternalRow, RowDescriptor,
};
