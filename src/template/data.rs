// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求级模板数据
//!
//! 每个请求由处理函数新建一份 `TemplateData`，渲染器在执行模板前调用
//! [`TemplateData::apply_defaults`] 注入进程级共享数据，响应写出后即丢弃。

use std::collections::HashMap;

use serde_derive::Serialize;
use serde_json::Value;

/// 模板可引用的全部字段。
///
/// 模板中以蛇形命名访问，例如 `{{ string_map.publishable_key }}`、`{{ data.cardholder }}`、`{{ api }}`。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemplateData {
    pub string_map: HashMap<String, String>,
    pub int_map: HashMap<String, i64>,
    pub float_map: HashMap<String, f32>,
    pub data: HashMap<String, Value>,
    /// 跨站请求伪造令牌
    pub csrf_token: String,
    pub flash: String,
    pub warning: String,
    pub error: String,
    pub is_authenticated: bool,
    /// 后端 API 的基础地址，由渲染器统一覆盖
    pub api: String,
    /// 静态资源版本号，用于让浏览器重新拉取 CSS
    pub css_version: String,
}

impl TemplateData {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注入默认数据。无条件覆盖 `api`，不触碰其它字段，因此重复调用结果不变。
    pub fn apply_defaults(&mut self, api: &str) -> &mut Self {
        self.api = api.to_string();
        self
    }

    pub fn with_string(mut self, key: &str, value: &str) -> Self {
        self.string_map.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn with_css_version(mut self, version: &str) -> Self {
        self.css_version = version.to_string();
        self
    }
}
