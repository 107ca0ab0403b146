//! 通知 ID 分配器
//!
//! 平台显示层用 ID 区分通知，重复 ID 会覆盖之前的通知，所以计数器必须持久化，
//! 并且读-改-写不能交错：进程内由互斥锁串行化，跨进程由存储的 `update_int` 保证。

use std::sync::{Arc, Mutex};
use tracing::{debug, error};

use super::store::KeyValueStore;
use crate::error::{AlertError, Result};

/// 持久化、单调递增的通知 ID 分配器
pub struct IdAllocator {
    store: Arc<dyn KeyValueStore>,
    key: String,
    /// 串行化 read-modify-write
    guard: Mutex<()>,
}

impl IdAllocator {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            guard: Mutex::new(()),
        }
    }

    /// 返回当前计数并把计数 +1 写回存储
    ///
    /// 存储不可用时返回 `StorageUnavailable`，绝不回退到 0。
    pub fn next_id(&self) -> Result<u32> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| AlertError::storage("id allocator lock poisoned"))?;

        let key = &self.key;
        let mut current = 0;
        self.store
            .update_int(key, &mut |stored| {
                current = match stored {
                    None => 0,
                    Some(v) => u32::try_from(v).map_err(|_| {
                        AlertError::StorageUnavailable(format!("counter '{}' out of range: {}", key, v))
                    })?,
                };
                let next = current.checked_add(1).ok_or_else(|| {
                    AlertError::StorageUnavailable(format!("counter '{}' exhausted", key))
                })?;
                Ok(i64::from(next))
            })
            .map_err(|e| {
                error!(key = %self.key, error = %e, "Failed to advance notification counter");
                e
            })?;

        debug!(key = %self.key, id = current, "Allocated notification id");
        Ok(current)
    }
}
