// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板缓存
//!
//! 编译结果以 `Arc` 共享，执行模板不修改编译单元，因此可以被多个请求同时使用。
//! 缓存在进程生命周期内只增不减：模板源是只读的，编译结果不会过期。
//!
//! 缓存键由页面片段路径和有序的局部模板列表共同组成，同一页面搭配不同局部模板时
//! 不会复用错误的编译结果。

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, RwLock},
};

use log::warn;

use super::{compose::CompiledTemplate, source};

/// 缓存键：页面片段路径 + 按调用顺序排列的局部模板名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    page_id: String,
    partials: Vec<String>,
}

impl CacheKey {
    pub fn new(page: &str, partials: &[&str]) -> Self {
        Self {
            page_id: source::page_id(page),
            partials: partials.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    pub fn partials(&self) -> &[String] {
        &self.partials
    }
}

#[derive(Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<CacheKey, Arc<CompiledTemplate>>>,
    // 每个键一把编译锁，保证同一个未命中窗口内只编译一次
    gates: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<Arc<CompiledTemplate>> {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("模板缓存读锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        };
        entries.get(key).cloned()
    }

    /// 放入或覆盖一个编译单元（开发模式下后写者覆盖先写者）
    pub fn insert(&self, key: CacheKey, unit: Arc<CompiledTemplate>) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("模板缓存写锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        };
        entries.insert(key, unit);
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 取得某个键的编译锁
    pub(crate) fn gate(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut gates = match self.gates.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("模板编译锁表被污染，恢复并继续");
                poisoned.into_inner()
            }
        };
        Arc::clone(gates.entry(key.clone()).or_default())
    }
}

/// 加锁编译锁；锁中只保护“是否已编译”这一事实，污染后可以直接恢复
pub(crate) fn hold(gate: &Mutex<()>) -> MutexGuard<'_, ()> {
    match gate.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
