// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责将 TCP 流中读取的原始字节解析为强类型的 `Request` 结构体：
//! 1. 请求行（方法、路径、查询字符串、版本）的解析。
//! 2. 常用 HTTP 标头的提取。
//! 3. 请求体与 `application/x-www-form-urlencoded` 表单的解析。

use std::collections::HashMap;

use crate::{exception::Exception, param::*, util::parse_form};
use log::error;

/// 标头与请求体之间的分隔符
const HEADER_END: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// 不含查询字符串的路径
    path: String,
    query: String,
    version: HttpVersion,
    user_agent: String,
    /// 客户端支持的压缩编码列表（按解析顺序排列）
    accept_encoding: Vec<HttpEncoding>,
    accept: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

/// 返回标头结束位置（不含分隔符）
pub fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_END.len())
        .position(|window| window == HEADER_END)
}

/// 从标头文本中读取 `Content-Length`，缺省为 0
pub fn content_length(head: &str) -> Result<usize, Exception> {
    for line in head.split(CRLF).skip(1) {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                return value.trim().parse::<usize>().map_err(|_| {
                    Exception::MalformedRequest(format!("bad Content-Length: {}", value.trim()))
                });
            }
        }
    }
    Ok(0)
}

impl Request {
    /// 从原始字节缓冲区构建 `Request`。
    ///
    /// # 逻辑步骤
    /// 1. 按空行切分标头与请求体，标头必须是合法的 UTF-8。
    /// 2. 解析请求行：方法、路径、协议版本。
    /// 3. 迭代解析 `User-Agent`、`Accept`、`Accept-Encoding`、`Content-Type` 等标头。
    /// 4. 按 `Content-Length` 截取请求体。
    ///
    /// `id` 为全局请求 ID，用于日志追踪。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let (head_bytes, rest) = match find_header_end(buffer) {
            Some(end) => (&buffer[..end], &buffer[end + HEADER_END.len()..]),
            None => (buffer, &buffer[buffer.len()..]),
        };

        let head = match std::str::from_utf8(head_bytes) {
            Ok(s) => s,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let request_lines: Vec<&str> = head.split(CRLF).collect();

        // 请求行，例如 "POST /payment-succeeded HTTP/1.1"
        let first_line_parts: Vec<&str> = request_lines[0].split(' ').collect();
        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_lines[0]);
            return Err(Exception::MalformedRequest(request_lines[0].to_string()));
        }

        let method_str = first_line_parts[0].to_uppercase();
        let method = match method_str.as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            _ => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::UnsupportedRequestMethod);
            }
        };

        let version_str = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        let target = first_line_parts[1..first_line_parts.len() - 1].join(" ");
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), q.to_string()),
            None => (target, String::new()),
        };

        let mut user_agent = String::new();
        let mut accept_encoding = vec![];
        let mut accept = None;
        let mut content_type = None;
        for line in request_lines.iter().skip(1) {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match name.trim().to_lowercase().as_str() {
                "user-agent" => user_agent = value.to_string(),
                "accept" => accept = Some(value.to_string()),
                "content-type" => content_type = Some(value.to_string()),
                // 只要包含关键词即视为支持
                "accept-encoding" => {
                    if value.contains("gzip") {
                        accept_encoding.push(HttpEncoding::Gzip);
                    }
                    if value.contains("deflate") {
                        accept_encoding.push(HttpEncoding::Deflate);
                    }
                    if value.contains("br") {
                        accept_encoding.push(HttpEncoding::Br);
                    }
                }
                _ => {}
            }
        }

        let length = content_length(head)?;
        if rest.len() < length {
            error!(
                "[ID{}]请求体不完整：期望{}字节，实际{}字节",
                id,
                length,
                rest.len()
            );
            return Err(Exception::MalformedRequest("truncated body".to_string()));
        }
        let body = rest[..length].to_vec();

        Ok(Self {
            method,
            path,
            query,
            version,
            user_agent,
            accept_encoding,
            accept,
            content_type,
            body,
        })
    }

    /// 解析 url-encoded 表单。非表单请求返回空表。
    pub fn form(&self) -> Result<HashMap<String, String>, Exception> {
        let is_form = self
            .content_type
            .as_deref()
            .map_or(false, |t| t.starts_with("application/x-www-form-urlencoded"));
        if !is_form {
            return Ok(HashMap::new());
        }
        let body = std::str::from_utf8(&self.body).map_err(|_| Exception::RequestIsNotUtf8)?;
        parse_form(body)
    }
}

impl Request {
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn accept_encoding(&self) -> &Vec<HttpEncoding> {
        &self.accept_encoding
    }

    pub fn accept(&self) -> Option<&String> {
        self.accept.as_ref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get_request() {
        let request_str = "GET / HTTP/1.1\r\nHost: localhost:4000\r\nUser-Agent: Test-Browser\r\nAccept-Encoding: gzip, deflate, br\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.path(), "/");
        assert_eq!(request.user_agent(), "Test-Browser");
        assert!(request.accept_encoding().contains(&HttpEncoding::Gzip));
        assert!(request.accept_encoding().contains(&HttpEncoding::Deflate));
        assert!(request.accept_encoding().contains(&HttpEncoding::Br));
        assert!(request.body().is_empty());
    }

    #[test]
    fn test_parse_post_form() {
        let body = "cardholder_name=Jane+Doe&cardholder_email=jane%40example.com&payment_intent=pi_123";
        let request_str = format!(
            "POST /payment-succeeded HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Post);
        assert_eq!(request.path(), "/payment-succeeded");
        let form = request.form().unwrap();
        assert_eq!(form["cardholder_name"], "Jane Doe");
        assert_eq!(form["cardholder_email"], "jane@example.com");
        assert_eq!(form["payment_intent"], "pi_123");
    }

    #[test]
    fn test_form_ignored_for_other_content_types() {
        let request_str =
            "POST /x HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert!(request.form().unwrap().is_empty());
    }

    #[test]
    fn test_truncated_body() {
        let request_str = "POST /x HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc";
        let result = Request::try_from(request_str.as_bytes(), 0);
        assert!(matches!(result, Err(Exception::MalformedRequest(_))));
    }

    #[test]
    fn test_bad_content_length() {
        let request_str = "POST /x HTTP/1.1\r\nContent-Length: ten\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);
        assert!(matches!(result, Err(Exception::MalformedRequest(_))));
    }

    #[test]
    fn test_unsupported_method() {
        let request_str = "DELETE /resource HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);
        assert!(matches!(result, Err(Exception::UnsupportedRequestMethod)));
    }

    #[test]
    fn test_unsupported_http_version() {
        let request_str = "GET / HTTP/2.0\r\nHost: localhost\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);
        assert!(matches!(result, Err(Exception::UnsupportedHttpVersion)));
    }

    #[test]
    fn test_invalid_utf8() {
        let buffer = vec![0xFF, 0xFE, 0xFD];
        let result = Request::try_from(&buffer, 0);
        assert!(matches!(result, Err(Exception::RequestIsNotUtf8)));
    }

    #[test]
    fn test_malformed_request_line() {
        let result = Request::try_from(b"GET\r\n\r\n", 0);
        assert!(matches!(result, Err(Exception::MalformedRequest(_))));
    }

    #[test]
    fn test_case_insensitive_headers() {
        let request_str =
            "get / HTTP/1.1\r\nhost: localhost\r\nuser-agent: Test\r\naccept-encoding: gzip\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.user_agent(), "Test");
        assert!(request.accept_encoding().contains(&HttpEncoding::Gzip));
    }

    #[test]
    fn test_path_with_query_string() {
        let request_str = "GET /static/css/styles.css?v=1 HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.path(), "/static/css/styles.css");
        assert_eq!(request.query(), "v=1");
    }

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n\r\nbody"), Some(14));
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n"), None);
    }

    #[test]
    fn test_content_length_helper() {
        assert_eq!(content_length("POST / HTTP/1.1\r\ncontent-length: 42").unwrap(), 42);
        assert_eq!(content_length("GET / HTTP/1.1\r\nHost: x").unwrap(), 0);
    }
}
