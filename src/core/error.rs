//! 统一错误处理系统 for RelDB
//!
//! ## 设计理念
//!
//! 1. **按需设计**：根据错误复杂度选择合适的结构
//!    - 查询/存储错误使用枚举设计，简洁高效
//!    - 事务错误定义在 `transaction` 模块中，通过 `#[from]` 接入
//! 2. **分层转换**：子系统错误通过 `#[from]` 注解自动转换，保留完整错误信息
//! 3. **统一接口**：`DBResult<T>` 提供统一的返回类型，简化错误传播

use thiserror::Error;

use crate::transaction::types::TransactionError;

/// 统一的数据库错误类型
#[derive(Error, Debug)]
pub enum DBError {
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),

    #[error("查询错误: {0}")]
    Query(#[from] QueryError),

    #[error("事务错误: {0}")]
    Transaction(#[from] TransactionError),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的结果类型
pub type DBResult<T> = Result<T, DBError>;

/// 存储层错误类型
///
/// 涵盖表数据读写相关的错误
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("表未找到: {0}")]
    TableNotFound(String),

    #[error("表已存在: {0}")]
    TableAlreadyExists(String),

    #[error("列索引越界: 索引 {index}, 列数 {width}")]
    ColumnIndexOutOfBounds { index: usize, width: usize },
}

/// 查询执行错误类型
///
/// 涵盖计划编译与执行器运行相关的错误
#[derive(Error, Debug, Clone)]
pub enum QueryError {
    #[error("执行错误: {0}")]
    ExecutionError(String),

    #[error("无效的计划形状: 不支持的节点带有 {children} 个子节点")]
    InvalidPlanShape { children: usize },

    #[error("参数索引越界: 索引 {index}, 参数数量 {len}")]
    ParamIndexOutOfBounds { index: usize, len: usize },

    #[error("执行器需要输入: {0}")]
    MissingInput(String),

    #[error("执行器输入不含行标识，无法定位存储行: {0}")]
    MissingRowIds(String),

    #[error("内存限制超出: 当前 {current} 字节, 限制 {limit} 字节")]
    MemoryLimitExceeded { current: usize, limit: usize },
}
