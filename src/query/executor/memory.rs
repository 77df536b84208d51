//! 内存管理模块
//!
//! 提供查询执行过程中的内存使用监控和限制功能。
//! `ConversionScope` 是行转换阶段使用的作用域守卫：进入时记账，
//! 离开时（任何退出路径，包括提前退出）自动释放。

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::error::{DBResult, QueryError};

/// 内存使用跟踪器
pub struct MemoryTracker {
    /// 当前内存使用量
    current_usage: AtomicUsize,
    /// 内存限制
    limit: usize,
}

impl MemoryTracker {
    /// 创建新的内存跟踪器
    pub fn new(limit: usize) -> Self {
        Self {
            current_usage: AtomicUsize::new(0),
            limit,
        }
    }

    /// 分配内存
    pub fn allocate(&self, size: usize) -> DBResult<()> {
        let current = self.current_usage.fetch_add(size, Ordering::AcqRel);

        // 检查是否超出限制
        if current + size > self.limit {
            // 回滚分配
            self.current_usage.fetch_sub(size, Ordering::AcqRel);
            return Err(QueryError::MemoryLimitExceeded {
                current: current + size,
                limit: self.limit,
            }
            .into());
        }

        Ok(())
    }

    /// 释放内存
    pub fn deallocate(&self, size: usize) {
        self.current_usage.fetch_sub(size, Ordering::AcqRel);
    }

    /// 获取当前内存使用量
    pub fn current_usage(&self) -> usize {
        self.current_usage.load(Ordering::Acquire)
    }

    /// 内存限制
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// 行转换作用域守卫
///
/// 替代手工保存/恢复分配上下文的做法：构造时向跟踪器记账，
/// `Drop` 时无条件释放
pub struct ConversionScope<'a> {
    tracker: &'a MemoryTracker,
    size: usize,
}

impl<'a> ConversionScope<'a> {
    /// 进入转换作用域
    pub fn enter(tracker: &'a MemoryTracker, size: usize) -> DBResult<Self> {
        tracker.allocate(size)?;
        Ok(Self { tracker, size })
    }
}

impl Drop for ConversionScope<'_> {
    fn drop(&mut self) {
        self.tracker.deallocate(self.size);
    }
}
