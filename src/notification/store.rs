//! 持久化 KV 存储 - 保存通知 ID 计数器
//!
//! `JsonFileStore` 把所有 key 存在一个 JSON 对象文件里，写入时持有文件锁并原子替换。

use fs2::FileExt;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{AlertError, Result};

/// 进程级持久化的整数 KV 存储
pub trait KeyValueStore: Send + Sync {
    /// 读取整数；key 不存在返回 `None`
    fn get_int(&self, key: &str) -> Result<Option<i64>>;

    /// 写入整数，返回前必须已持久化
    fn set_int(&self, key: &str, value: i64) -> Result<()>;

    /// 在同一临界区内读-改-写；`update` 返回要写回的值，出错则不写入
    fn update_int(
        &self,
        key: &str,
        update: &mut dyn FnMut(Option<i64>) -> Result<i64>,
    ) -> Result<()> {
        let next = update(self.get_int(key)?)?;
        self.set_int(key, next)
    }
}

/// JSON 文件存储
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileStore {
    /// 打开存储，立即创建所在目录
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AlertError::Initialization(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let lock_path = path.with_extension("lock");
        Ok(Self { path, lock_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(AlertError::storage)?;
        file.lock_exclusive().map_err(AlertError::storage)?;
        Ok(file)
    }

    fn read_map(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path).map_err(AlertError::storage)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content).map_err(AlertError::storage)? {
            Value::Object(map) => Ok(map),
            other => Err(AlertError::StorageUnavailable(format!(
                "expected JSON object in {}, found {}",
                self.path.display(),
                other
            ))),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<()> {
        let temp_path = self.path.with_extension("tmp");
        {
            let mut temp_file = File::create(&temp_path).map_err(AlertError::storage)?;
            let json = serde_json::to_string_pretty(map).map_err(AlertError::storage)?;
            temp_file.write_all(json.as_bytes()).map_err(AlertError::storage)?;
            temp_file.sync_all().map_err(AlertError::storage)?;
        }
        // 原子替换
        fs::rename(&temp_path, &self.path).map_err(AlertError::storage)
    }
}

fn int_value(map: &Map<String, Value>, key: &str) -> Result<Option<i64>> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| {
            AlertError::StorageUnavailable(format!("value for '{}' is not an integer", key))
        }),
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_int(&self, key: &str) -> Result<Option<i64>> {
        let lock = self.lock()?;
        let map = self.read_map();
        lock.unlock().map_err(AlertError::storage)?;

        int_value(&map?, key)
    }

    fn set_int(&self, key: &str, value: i64) -> Result<()> {
        let lock = self.lock()?;
        let result = self.read_map().and_then(|mut map| {
            map.insert(key.to_string(), Value::from(value));
            self.write_map(&map)
        });
        lock.unlock().map_err(AlertError::storage)?;
        result
    }

    /// 文件锁覆盖整个读-改-写，多个进程共享计数器时也不会重复
    fn update_int(
        &self,
        key: &str,
        update: &mut dyn FnMut(Option<i64>) -> Result<i64>,
    ) -> Result<()> {
        let lock = self.lock()?;
        let result = self.read_map().and_then(|mut map| {
            let next = update(int_value(&map, key)?)?;
            map.insert(key.to_string(), Value::from(next));
            self.write_map(&map)
        });
        lock.unlock().map_err(AlertError::storage)?;
        result
    }
}

/// 内存存储（测试与 dry-run 使用）
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_int(&self, key: &str) -> Result<Option<i64>> {
        let values = self.values.lock().map_err(|_| AlertError::storage("store lock poisoned"))?;
        Ok(values.get(key).copied())
    }

    fn set_int(&self, key: &str, value: i64) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| AlertError::storage("store lock poisoned"))?;
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn update_int(
        &self,
        key: &str,
        update: &mut dyn FnMut(Option<i64>) -> Result<i64>,
    ) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| AlertError::storage("store lock poisoned"))?;
        let next = update(values.get(key).copied())?;
        values.insert(key.to_string(), next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_key_is_none() {
        let temp = tempdir().unwrap();
        let store = JsonFileStore::open(temp.path().join("ids.json")).unwrap();
        assert_eq!(store.get_int("notification_id").unwrap(), None);
    }

    #[test]
    fn test_value_survives_reopen() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("ids.json");
        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set_int("notification_id", 42).unwrap();
        }
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get_int("notification_id").unwrap(), Some(42));
    }

    #[test]
    fn test_keys_are_independent() {
        let temp = tempdir().unwrap();
        let store = JsonFileStore::open(temp.path().join("ids.json")).unwrap();
        store.set_int("a", 1).unwrap();
        store.set_int("b", 2).unwrap();
        assert_eq!(store.get_int("a").unwrap(), Some(1));
        assert_eq!(store.get_int("b").unwrap(), Some(2));
    }

    #[test]
    fn test_corrupt_value_is_storage_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("ids.json");
        fs::write(&path, r#"{"notification_id": "seven"}"#).unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        let err = store.get_int("notification_id").unwrap_err();
        assert!(matches!(err, AlertError::StorageUnavailable(_)));
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("ids.json");
        fs::write(&path, "[1, 2]").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.get_int("notification_id").is_err());
        assert!(store.set_int("notification_id", 1).is_err());
    }

    #[test]
    fn test_update_int() {
        let temp = tempdir().unwrap();
        let store = JsonFileStore::open(temp.path().join("ids.json")).unwrap();
        store.update_int("n", &mut |v| Ok(v.unwrap_or(10) + 1)).unwrap();
        store.update_int("n", &mut |v| Ok(v.unwrap_or(10) + 1)).unwrap();
        assert_eq!(store.get_int("n").unwrap(), Some(12));

        let err = store
            .update_int("n", &mut |_| Err(AlertError::storage("rejected")))
            .unwrap_err();
        assert!(matches!(err, AlertError::StorageUnavailable(_)));
        assert_eq!(store.get_int("n").unwrap(), Some(12));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get_int("k").unwrap(), None);
        store.set_int("k", 9).unwrap();
        assert_eq!(store.get_int("k").unwrap(), Some(9));
    }
}
