// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板源
//!
//! 模板片段（布局、局部模板、页面）在编译期被打包进二进制文件，运行期只读。
//! 片段通过形如 `templates/<name>.page.html` 的逻辑路径寻址。

use std::collections::HashMap;

use include_dir::{include_dir, Dir};
use lazy_static::lazy_static;
use regex::Regex;

/// 片段逻辑路径的公共前缀
pub const TEMPLATE_DIR: &str = "templates";

/// 模板文件后缀
pub const TEMPLATE_EXT: &str = "html";

/// 所有页面共享的布局片段
pub const LAYOUT_ID: &str = "templates/base.layout.html";

static EMBEDDED: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/templates");

lazy_static! {
    static ref NAME_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

/// 只读的模板片段仓库。
///
/// `fetch` 在片段不存在时返回 `None`，由调用方决定如何报错。
#[cfg_attr(test, mockall::automock)]
pub trait TemplateSource: Send + Sync {
    fn fetch(&self, id: &str) -> Option<String>;
}

/// 页面名到片段路径：`terminal` -> `templates/terminal.page.html`
pub fn page_id(page: &str) -> String {
    format!("{}/{}.page.{}", TEMPLATE_DIR, page, TEMPLATE_EXT)
}

/// 局部模板名到片段路径：`stripe-js` -> `templates/stripe-js.partial.html`
pub fn partial_id(partial: &str) -> String {
    format!("{}/{}.partial.{}", TEMPLATE_DIR, partial, TEMPLATE_EXT)
}

/// 编译单元内部使用的短名（去掉目录前缀），布局中的 `extends` / `include` 以此引用
pub fn unit_name(id: &str) -> &str {
    id.strip_prefix(TEMPLATE_DIR)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(id)
}

/// 页面名与局部模板名只允许字母、数字、下划线和连字符
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// 编译进二进制的 `templates/` 目录
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedTemplates;

impl TemplateSource for EmbeddedTemplates {
    fn fetch(&self, id: &str) -> Option<String> {
        EMBEDDED
            .get_file(unit_name(id))
            .and_then(|file| file.contents_utf8())
            .map(str::to_string)
    }
}

/// 内存中的模板源，供测试与基准测试使用
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    fragments: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, source: &str) -> Self {
        self.insert(id, source);
        self
    }

    pub fn insert(&mut self, id: &str, source: &str) {
        self.fragments.insert(id.to_string(), source.to_string());
    }
}

impl TemplateSource for MemorySource {
    fn fetch(&self, id: &str) -> Option<String> {
        self.fragments.get(id).cloned()
    }
}
