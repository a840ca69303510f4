// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! HTTP 层在读取、解析请求以及查找静态资源时可能出现的异常。
//! 每个变体都对应一个确定的 HTTP 状态码，由 [`Exception::status_code`] 给出。
//! 模板渲染相关的错误见 [`crate::template::TemplateError`]。

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Exception {
    /// 请求字节流无法解析为合法的 UTF-8 字符串
    #[error("Request bytes can't be parsed in UTF-8")]
    RequestIsNotUtf8,
    /// 不支持的 HTTP 方法
    #[error("Unsupported request method")]
    UnsupportedRequestMethod,
    #[error("Unsupported HTTP version")]
    UnsupportedHttpVersion,
    /// 请求行或标头格式错误
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    #[error("Request exceeds {0} bytes")]
    RequestTooLarge(usize),
    /// 在读超时内未能收到完整请求
    #[error("Timed out reading request")]
    Timeout,
    #[error("File not found (404)")]
    FileNotFound,
    /// 路径格式非法或包含越权尝试（如目录遍历）
    #[error("Invalid path (400)")]
    InvalidPath,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Exception {
    /// 异常对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Exception::RequestIsNotUtf8
            | Exception::MalformedRequest(_)
            | Exception::InvalidPath => 400,
            Exception::UnsupportedRequestMethod => 405,
            Exception::UnsupportedHttpVersion => 505,
            Exception::RequestTooLarge(_) => 413,
            Exception::Timeout => 408,
            Exception::FileNotFound => 404,
            Exception::Io(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Exception::FileNotFound.status_code(), 404);
        assert_eq!(Exception::InvalidPath.status_code(), 400);
        assert_eq!(Exception::RequestTooLarge(10).status_code(), 413);
        assert_eq!(Exception::Timeout.status_code(), 408);
        assert_eq!(Exception::UnsupportedRequestMethod.status_code(), 405);
        assert_eq!(Exception::UnsupportedHttpVersion.status_code(), 505);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Exception::RequestTooLarge(1024).to_string(),
            "Request exceeds 1024 bytes"
        );
        let io_err = Exception::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(io_err.to_string().contains("boom"));
        assert_eq!(io_err.status_code(), 500);
    }
}
