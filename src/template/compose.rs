// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板组合器
//!
//! 将共享布局、若干局部模板和页面模板一次性载入，编译成一个可执行的编译单元，
//! 并以页面 + 局部模板列表为键写入缓存。编译失败时缓存保持不变。

use std::{fmt, io::Write, sync::Arc};

use log::debug;
use minijinja::{Environment, UndefinedBehavior};

use super::{
    cache::{CacheKey, TemplateCache},
    data::TemplateData,
    error::TemplateError,
    source::{self, TemplateSource, LAYOUT_ID},
};

/// 编译单元：布局 + 局部模板 + 页面，入口为页面模板。
///
/// 创建后不可变，执行时只读，可被多个请求并发使用。
pub struct CompiledTemplate {
    name: String,
    env: Environment<'static>,
}

impl CompiledTemplate {
    /// 入口模板名，例如 `terminal.page.html`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 以 `data` 为上下文执行模板，结果直接写入 `out`。
    ///
    /// 出错前已写出的字节不会回滚。
    pub fn execute<W: Write>(&self, data: &TemplateData, out: W) -> Result<(), TemplateError> {
        let execution_error = |source| TemplateError::Execution {
            template: self.name.clone(),
            source,
        };
        let template = self.env.get_template(&self.name).map_err(execution_error)?;
        template
            .render_to_write(data, out)
            .map(|_| ())
            .map_err(execution_error)
    }
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

pub struct Composer {
    source: Arc<dyn TemplateSource>,
}

impl Composer {
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self { source }
    }

    /// 编译 `page`（可附带局部模板）并写入缓存，返回新的编译单元。
    ///
    /// 局部模板按传入顺序注册，同名片段后者覆盖前者。失败时缓存不变，错误交给调用方记录。
    pub fn compose(
        &self,
        cache: &TemplateCache,
        page: &str,
        partials: &[&str],
    ) -> Result<Arc<CompiledTemplate>, TemplateError> {
        let unit = Arc::new(self.build(page, partials)?);
        cache.insert(CacheKey::new(page, partials), Arc::clone(&unit));
        debug!("模板{}编译完成并已写入缓存，局部模板：{:?}", unit.name(), partials);
        Ok(unit)
    }

    fn build(&self, page: &str, partials: &[&str]) -> Result<CompiledTemplate, TemplateError> {
        if !source::is_valid_name(page) {
            return Err(TemplateError::invalid_name(page));
        }
        if let Some(bad) = partials.iter().find(|p| !source::is_valid_name(p)) {
            return Err(TemplateError::invalid_name(bad));
        }

        let page_id = source::page_id(page);
        let mut ids = Vec::with_capacity(partials.len() + 2);
        ids.push(LAYOUT_ID.to_string());
        ids.extend(partials.iter().map(|p| source::partial_id(p)));
        ids.push(page_id.clone());

        // 先完整载入，再统一编译
        let mut fragments = Vec::with_capacity(ids.len());
        for id in ids {
            let text = self
                .source
                .fetch(&id)
                .ok_or_else(|| TemplateError::not_found(&id))?;
            fragments.push((id, text));
        }

        let mut env = Environment::new();
        // 输出不存在的字段即报错，`if` 判断仍然允许
        env.set_undefined_behavior(UndefinedBehavior::SemiStrict);
        for (id, text) in fragments {
            env.add_template_owned(source::unit_name(&id).to_string(), text)
                .map_err(|e| TemplateError::syntax(&id, e))?;
        }

        Ok(CompiledTemplate {
            name: source::unit_name(&page_id).to_string(),
            env,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::error::ResolutionCause;
    use crate::template::source::{page_id, partial_id, MockTemplateSource};
    use mockall::{predicate::eq, Sequence};

    const LAYOUT: &str = "<html>{% block content %}{% endblock %}</html>";
    const PAGE: &str = r#"{% extends "base.layout.html" %}{% block content %}<p>{{ string_map.name }}</p>{% include "note.partial.html" ignore missing %}{% endblock %}"#;

    fn render(unit: &CompiledTemplate, data: &TemplateData) -> String {
        let mut out = Vec::new();
        unit.execute(data, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_compose_loads_layout_partials_then_page_in_order() {
        let mut source = MockTemplateSource::new();
        let mut seq = Sequence::new();
        source
            .expect_fetch()
            .with(eq(LAYOUT_ID))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Some(LAYOUT.to_string()));
        source
            .expect_fetch()
            .with(eq("templates/note.partial.html"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Some("<em>note</em>".to_string()));
        source
            .expect_fetch()
            .with(eq("templates/home.page.html"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Some(PAGE.to_string()));

        let composer = Composer::new(Arc::new(source));
        let cache = TemplateCache::new();
        let unit = composer.compose(&cache, "home", &["note"]).unwrap();

        assert_eq!(unit.name(), "home.page.html");
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(&CacheKey::new("home", &["note"])).is_some());

        let html = render(&unit, &TemplateData::new().with_string("name", "Ada"));
        assert_eq!(html, "<html><p>Ada</p><em>note</em></html>");
    }

    #[test]
    fn test_compose_missing_page_leaves_cache_untouched() {
        let mut source = MockTemplateSource::new();
        source
            .expect_fetch()
            .with(eq(LAYOUT_ID))
            .returning(|_| Some(LAYOUT.to_string()));
        source
            .expect_fetch()
            .with(eq("templates/nonexistent.page.html"))
            .returning(|_| None);

        let composer = Composer::new(Arc::new(source));
        let cache = TemplateCache::new();
        let err = composer.compose(&cache, "nonexistent", &[]).unwrap_err();

        match err {
            TemplateError::Resolution { fragment, cause } => {
                assert_eq!(fragment, page_id("nonexistent"));
                assert!(matches!(cause, ResolutionCause::NotFound));
            }
            other => panic!("Expected resolution error, got {other}"),
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_compose_missing_partial_is_resolution_error() {
        let mut source = MockTemplateSource::new();
        source
            .expect_fetch()
            .with(eq(LAYOUT_ID))
            .returning(|_| Some(LAYOUT.to_string()));
        source
            .expect_fetch()
            .with(eq(partial_id("ghost")))
            .returning(|_| None);

        let composer = Composer::new(Arc::new(source));
        let cache = TemplateCache::new();
        let err = composer.compose(&cache, "home", &["ghost"]).unwrap_err();

        assert!(err.is_resolution());
        assert!(format!("{err}").contains("ghost.partial.html"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_compose_invalid_name_never_touches_source() {
        let mut source = MockTemplateSource::new();
        source.expect_fetch().never();

        let composer = Composer::new(Arc::new(source));
        let cache = TemplateCache::new();

        assert!(composer.compose(&cache, "../etc/passwd", &[]).is_err());
        assert!(composer.compose(&cache, "home", &["a/b"]).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_compose_syntax_error_is_resolution_error() {
        let mut source = MockTemplateSource::new();
        source
            .expect_fetch()
            .with(eq(LAYOUT_ID))
            .returning(|_| Some(LAYOUT.to_string()));
        source
            .expect_fetch()
            .with(eq("templates/broken.page.html"))
            .returning(|_| Some("{% if %}".to_string()));

        let composer = Composer::new(Arc::new(source));
        let cache = TemplateCache::new();
        let err = composer.compose(&cache, "broken", &[]).unwrap_err();

        match err {
            TemplateError::Resolution { cause, .. } => {
                assert!(matches!(cause, ResolutionCause::Syntax(_)));
            }
            other => panic!("Expected syntax error, got {other}"),
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_execute_unknown_field_is_execution_error() {
        let mut source = MockTemplateSource::new();
        source
            .expect_fetch()
            .with(eq(LAYOUT_ID))
            .returning(|_| Some(LAYOUT.to_string()));
        source
            .expect_fetch()
            .with(eq("templates/typo.page.html"))
            .returning(|_| {
                Some(
                    r#"{% extends "base.layout.html" %}{% block content %}[{{ csrf_tokn }}]{% endblock %}"#
                        .to_string(),
                )
            });

        let composer = Composer::new(Arc::new(source));
        let unit = composer.compose(&TemplateCache::new(), "typo", &[]).unwrap();

        let mut out = Vec::new();
        let err = unit.execute(&TemplateData::new(), &mut out).unwrap_err();
        assert!(err.is_execution());
    }

    #[test]
    fn test_execute_allows_testing_undefined() {
        let mut source = MockTemplateSource::new();
        source
            .expect_fetch()
            .with(eq(LAYOUT_ID))
            .returning(|_| Some(LAYOUT.to_string()));
        source
            .expect_fetch()
            .with(eq("templates/flash.page.html"))
            .returning(|_| {
                Some(
                    r#"{% extends "base.layout.html" %}{% block content %}{% if data.notice %}{{ data.notice }}{% endif %}ok{% endblock %}"#
                        .to_string(),
                )
            });

        let composer = Composer::new(Arc::new(source));
        let unit = composer.compose(&TemplateCache::new(), "flash", &[]).unwrap();

        assert_eq!(render(&unit, &TemplateData::new()), "<html>ok</html>");
    }

    #[test]
    fn test_execute_escapes_html() {
        let mut source = MockTemplateSource::new();
        source
            .expect_fetch()
            .with(eq(LAYOUT_ID))
            .returning(|_| Some(LAYOUT.to_string()));
        source
            .expect_fetch()
            .with(eq("templates/home.page.html"))
            .returning(|_| Some(PAGE.to_string()));

        let composer = Composer::new(Arc::new(source));
        let unit = composer.compose(&TemplateCache::new(), "home", &[]).unwrap();

        let html = render(&unit, &TemplateData::new().with_string("name", "<b>x</b>"));
        assert!(html.contains("&lt;b&gt;x&lt;"));
        assert!(!html.contains("<b>"));
    }
}
