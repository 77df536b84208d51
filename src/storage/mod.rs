//! 存储层接口与内存实现
//!
//! 执行器通过 `StorageClient` trait 访问表数据。读取操作返回
//! `Arc<Table>` 快照；写入操作采用写时复制（COW）策略替换快照，
//! 因此引用旧快照的瓦片在写入发生后即失效（这正是执行驱动器在
//! 根节点插入物化执行器的原因）。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::error::{DBResult, StorageError};
use crate::core::{Row, Schema, Value};

/// 表数据
///
/// 只读快照单元：存储层中的表以 `Arc<Table>` 形式对外暴露，
/// 任何写入都会生成新的 `Table` 并整体替换
#[derive(Debug, Clone)]
pub struct Table {
    /// 表名
    pub name: String,
    /// 表模式
    pub schema: Schema,
    /// 行数据
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(name: impl Into<String>, schema: Schema, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            schema,
            rows,
        }
    }
}

/// 存储客户端 trait
///
/// 执行器与具体存储实现之间的接口边界
pub trait StorageClient: Send + 'static {
    /// 获取表的只读快照
    fn snapshot(&self, table: &str) -> DBResult<Arc<Table>>;

    /// 创建表
    fn create_table(&mut self, table: Table) -> DBResult<()>;

    /// 插入行，返回插入的行数
    fn insert_rows(&mut self, table: &str, rows: Vec<Row>) -> DBResult<usize>;

    /// 删除行
    ///
    /// `row_ids` 为 None 时删除全表，否则删除指定行号的行；
    /// 返回实际删除的行数
    fn delete_rows(&mut self, table: &str, row_ids: Option<&[usize]>) -> DBResult<usize>;

    /// 更新行
    ///
    /// `row_ids` 为 None 时更新全表；`assignments` 为 (列索引, 新值) 列表；
    /// 返回实际更新的行数
    fn update_rows(
        &mut self,
        table: &str,
        row_ids: Option<&[usize]>,
        assignments: &[(usize, Value)],
    ) -> DBResult<usize>;
}

/// 内存存储实现
///
/// 表映射由读写锁保护；所有写入走 COW 替换路径
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// 取出一个表的可变副本，写入完成后通过 `replace` 放回
    fn clone_table(&self, name: &str) -> DBResult<Table> {
        let tables = self.tables.read();
        let table = tables
            .get(name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))?;
        Ok(Table::clone(table))
    }

    fn replace(&self, table: Table) {
        self.tables
            .write()
            .insert(table.name.clone(), Arc::new(table));
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageClient for MemoryStorage {
    fn snapshot(&self, table: &str) -> DBResult<Arc<Table>> {
        let tables = self.tables.read();
        tables
            .get(table)
            .cloned()
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()).into())
    }

    fn create_table(&mut self, table: Table) -> DBResult<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(&table.name) {
            return Err(StorageError::TableAlreadyExists(table.name).into());
        }
        tables.insert(table.name.clone(), Arc::new(table));
        Ok(())
    }

    fn insert_rows(&mut self, table: &str, rows: Vec<Row>) -> DBResult<usize> {
        let mut copy = self.clone_table(table)?;
        let count = rows.len();
        copy.rows.extend(rows);
        self.replace(copy);
        Ok(count)
    }

    fn delete_rows(&mut self, table: &str, row_ids: Option<&[usize]>) -> DBResult<usize> {
        let mut copy = self.clone_table(table)?;
        let count = match row_ids {
            None => {
                let count = copy.rows.len();
                copy.rows.clear();
                count
            }
            Some(ids) => {
                // 按行号降序删除，避免删除过程中行号偏移
                let mut sorted: Vec<usize> = ids.to_vec();
                sorted.sort_unstable();
                sorted.dedup();
                let mut count = 0;
                for id in sorted.into_iter().rev() {
                    if id < copy.rows.len() {
                        copy.rows.remove(id);
                        count += 1;
                    }
                }
                count
            }
        };
        self.replace(copy);
        Ok(count)
    }

    fn update_rows(
        &mut self,
        table: &str,
        row_ids: Option<&[usize]>,
        assignments: &[(usize, Value)],
    ) -> DBResult<usize> {
        let mut copy = self.clone_table(table)?;
        let width = copy.schema.width();
        for (index, _) in assignments {
            if *index >= width {
                return Err(StorageError::ColumnIndexOutOfBounds {
                    index: *index,
                    width,
                }
                .into());
            }
        }

        let mut count = 0;
        match row_ids {
            None => {
                for row in copy.rows.iter_mut() {
                    for (index, value) in assignments {
                        row[*index] = value.clone();
                    }
                    count += 1;
                }
            }
            Some(ids) => {
                for id in ids {
                    if let Some(row) = copy.rows.get_mut(*id) {
                        for (index, value) in assignments {
                            row[*index] = value.clone();
                        }
                        count += 1;
                    }
                }
            }
        }
        self.replace(copy);
        Ok(count)
    }
}
