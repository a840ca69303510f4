// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 渲染器
//!
//! 每次渲染的路径选择：
//!
//! | 运行模式 | 缓存状态 | 行为 |
//! |---------|---------|------|
//! | production | 命中 | 直接复用编译单元 |
//! | production | 未命中 | 按键加锁编译一次，其余并发请求等待并复用结果 |
//! | 其它 | 任意 | 重新编译并覆盖缓存项 |
//!
//! 执行前总会注入默认数据；调用方未提供数据时使用空的 `TemplateData`。

use std::{io::Write, sync::Arc};

use log::debug;

use super::{
    cache::{self, CacheKey, TemplateCache},
    compose::{CompiledTemplate, Composer},
    data::TemplateData,
    error::TemplateError,
    source::TemplateSource,
};
use crate::config::AppEnv;

pub struct Renderer {
    env: AppEnv,
    api: String,
    composer: Composer,
    cache: TemplateCache,
}

impl Renderer {
    pub fn new(env: AppEnv, api: &str, source: Arc<dyn TemplateSource>) -> Self {
        Self {
            env,
            api: api.to_string(),
            composer: Composer::new(source),
            cache: TemplateCache::new(),
        }
    }

    pub fn env(&self) -> AppEnv {
        self.env
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    /// 渲染页面 `page` 并写入 `out`。
    ///
    /// 失败时不记录日志，由调用方带上请求上下文记录一次后终止当前请求。
    pub fn render<W: Write>(
        &self,
        out: W,
        page: &str,
        data: Option<&mut TemplateData>,
        partials: &[&str],
    ) -> Result<(), TemplateError> {
        let unit = self.resolve(page, partials)?;

        let mut fresh = TemplateData::new();
        let data = match data {
            Some(data) => data,
            None => &mut fresh,
        };
        data.apply_defaults(&self.api);

        unit.execute(data, out)
    }

    fn resolve(&self, page: &str, partials: &[&str]) -> Result<Arc<CompiledTemplate>, TemplateError> {
        if !self.env.caches_templates() {
            debug!("{}模式，重新编译模板{}", self.env, page);
            return self.composer.compose(&self.cache, page, partials);
        }

        let key = CacheKey::new(page, partials);
        if let Some(unit) = self.cache.lookup(&key) {
            debug!("模板缓存命中：{}", key.page_id());
            return Ok(unit);
        }

        let gate = self.cache.gate(&key);
        let _guard = cache::hold(&gate);
        // 等锁期间可能已被其它请求编译
        if let Some(unit) = self.cache.lookup(&key) {
            debug!("模板{}已由并发请求编译，直接复用", key.page_id());
            return Ok(unit);
        }
        debug!("模板缓存未命中：{}", key.page_id());
        self.composer.compose(&self.cache, page, partials)
    }
}
