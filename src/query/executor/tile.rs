//! 瓦片（Tile）：执行器之间传递的行批次
//!
//! 两种所有权模式：
//! - `Referenced`：持有存储快照的 `Arc` 引用和行号列表，不复制行数据。
//!   存储采用写时复制，写入发生后引用的快照即过期，因此引用瓦片
//!   只能在产生它的扫描仍然有效的范围内使用。
//! - `Owned`：持有独立的行副本，与存储层生命周期无关。
//!
//! 物化即把 `Referenced` 瓦片复制为 `Owned` 瓦片。

use std::sync::Arc;

use crate::core::{estimated_row_size, Row};
use crate::storage::Table;

/// 行批次
#[derive(Debug, Clone)]
pub enum Tile {
    /// 引用模式：快照 + 行号
    Referenced {
        table: Arc<Table>,
        row_ids: Vec<usize>,
    },
    /// 自有模式：独立行副本
    Owned { rows: Vec<Row> },
}

impl Tile {
    /// 从行副本构造自有瓦片
    pub fn owned(rows: Vec<Row>) -> Self {
        Tile::Owned { rows }
    }

    /// 从存储快照构造引用瓦片
    pub fn referenced(table: Arc<Table>, row_ids: Vec<usize>) -> Self {
        Tile::Referenced { table, row_ids }
    }

    /// 是否为自有模式
    pub fn is_owned(&self) -> bool {
        matches!(self, Tile::Owned { .. })
    }

    /// 行数
    pub fn row_count(&self) -> usize {
        match self {
            Tile::Referenced { row_ids, .. } => row_ids.len(),
            Tile::Owned { rows } => rows.len(),
        }
    }

    /// 按瓦片内顺序取第 i 行
    ///
    /// 引用模式下行号越界返回 None（快照与行号不匹配的防护路径）
    pub fn row(&self, i: usize) -> Option<&Row> {
        match self {
            Tile::Referenced { table, row_ids } => {
                row_ids.get(i).and_then(|id| table.rows.get(*id))
            }
            Tile::Owned { rows } => rows.get(i),
        }
    }

    /// 引用模式下的存储行号列表，自有模式返回 None
    ///
    /// 行变更执行器用它定位存储中的受害行
    pub fn storage_row_ids(&self) -> Option<&[usize]> {
        match self {
            Tile::Referenced { row_ids, .. } => Some(row_ids),
            Tile::Owned { .. } => None,
        }
    }

    /// 应用偏移和限制，原地裁剪瓦片
    pub fn retain_range(&mut self, offset: usize, limit: Option<usize>) {
        match self {
            Tile::Referenced { row_ids, .. } => {
                trim(row_ids, offset, limit);
            }
            Tile::Owned { rows } => {
                trim(rows, offset, limit);
            }
        }
    }

    /// 物化：把引用瓦片复制为自有瓦片
    pub fn materialize(self) -> Tile {
        match self {
            Tile::Owned { rows } => Tile::Owned { rows },
            Tile::Referenced { table, row_ids } => {
                let rows = row_ids
                    .into_iter()
                    .filter_map(|id| table.rows.get(id).cloned())
                    .collect();
                Tile::Owned { rows }
            }
        }
    }

    /// 估算瓦片占用的内存字节数，用于查询内存记账
    pub fn estimated_size(&self) -> usize {
        match self {
            Tile::Referenced { row_ids, .. } => row_ids.len() * std::mem::size_of::<usize>(),
            Tile::Owned { rows } => rows.iter().map(|r| estimated_row_size(r)).sum(),
        }
    }
}

fn trim<T>(items: &mut Vec<T>, offset: usize, limit: Option<usize>) {
    if offset > 0 {
        if offset < items.len() {
            items.drain(0..offset);
        } else {
            items.clear();
        }
    }
    if let Some(limit) = limit {
        items.truncate(limit);
    }
}
