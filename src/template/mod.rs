// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板引擎
//!
//! 由共享布局、可选局部模板和页面模板组合出 HTML 页面，并按运行模式决定
//! 复用缓存中的编译结果还是重新编译：
//! - `source`：编译期打包的只读模板源
//! - `data`：请求级模板数据与默认数据注入
//! - `cache`：编译单元缓存
//! - `compose`：片段载入与编译
//! - `render`：渲染调度

pub mod cache;
pub mod compose;
pub mod data;
pub mod error;
pub mod render;
pub mod source;

pub use cache::{CacheKey, TemplateCache};
pub use compose::{CompiledTemplate, Composer};
pub use data::TemplateData;
pub use error::{ResolutionCause, TemplateError};
pub use render::Renderer;
pub use source::{EmbeddedTemplates, MemorySource, TemplateSource};
