// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板引擎错误类型
//!
//! 渲染链路上只有两类失败：
//! - **解析失败**（`Resolution`）：片段缺失、名称非法或语法错误。属于部署/配置缺陷。
//! - **执行失败**（`Execution`）：模板与数据不匹配，或指令求值出错。属于编码缺陷。
//!
//! 两者都不会被重试，由调用方记录日志并终止当前请求。

use thiserror::Error;

/// 片段解析失败的具体原因
#[derive(Debug, Error)]
pub enum ResolutionCause {
    /// 模板源中不存在该片段
    #[error("fragment not found")]
    NotFound,
    /// 名称中包含不允许的字符
    #[error("invalid fragment name")]
    InvalidName,
    /// 片段存在但无法通过语法检查
    #[error("syntax error: {0}")]
    Syntax(#[source] minijinja::Error),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to resolve template `{fragment}`: {cause}")]
    Resolution {
        fragment: String,
        #[source]
        cause: ResolutionCause,
    },

    #[error("failed to execute template `{template}`: {source}")]
    Execution {
        template: String,
        #[source]
        source: minijinja::Error,
    },
}

impl TemplateError {
    pub(crate) fn not_found(fragment: &str) -> Self {
        TemplateError::Resolution {
            fragment: fragment.to_string(),
            cause: ResolutionCause::NotFound,
        }
    }

    pub(crate) fn invalid_name(fragment: &str) -> Self {
        TemplateError::Resolution {
            fragment: fragment.to_string(),
            cause: ResolutionCause::InvalidName,
        }
    }

    pub(crate) fn syntax(fragment: &str, err: minijinja::Error) -> Self {
        TemplateError::Resolution {
            fragment: fragment.to_string(),
            cause: ResolutionCause::Syntax(err),
        }
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, TemplateError::Resolution { .. })
    }

    pub fn is_execution(&self) -> bool {
        matches!(self, TemplateError::Execution { .. })
    }
}
