//! 静态资源缓存：按路径缓存文件内容，文件修改时间变化即视为失效，容量满时按 LRU 淘汰。

use std::num::NonZeroUsize;
use std::time::SystemTime;

use bytes::Bytes;
use lru::LruCache;

/// 超过该大小的文件不进入缓存
pub const MAX_CACHED_FILE: u64 = 1024 * 1024;

#[derive(Clone)]
struct StaticEntry {
    content: Bytes,
    modified: SystemTime,
}

pub struct StaticCache {
    entries: LruCache<String, StaticEntry>,
}

impl StaticCache {
    /// 容量为 0 时按 1 处理
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn store(&mut self, path: &str, content: Bytes, modified: SystemTime) {
        self.entries
            .put(path.to_string(), StaticEntry { content, modified });
    }

    /// 修改时间一致才算命中；过期条目顺便移除
    pub fn fetch(&mut self, path: &str, modified: SystemTime) -> Option<Bytes> {
        let fresh = self.entries.get(path)?.modified == modified;
        if fresh {
            self.entries.get(path).map(|e| e.content.clone())
        } else {
            self.entries.pop(path);
            None
        }
    }

    pub fn should_cache(file_size: u64) -> bool {
        file_size <= MAX_CACHED_FILE
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
