// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 后端 API
//!
//! 目前只提供健康检查 `/api/status`，其余路径统一返回 JSON 格式的错误。
//! 数据库连接串只用于日志展示，不会建立连接。

use std::sync::Arc;

use log::{debug, warn};
use serde_derive::Serialize;
use serde_json::json;

use crate::{
    config::Config,
    param::{HttpRequestMethod, VERSION},
    request::Request,
    response::Response,
    server::Handler,
};

pub const STATUS_PATH: &str = "/api/status";

/// `/api/status` 的响应体
#[derive(Debug, Serialize)]
pub struct AppStatus {
    pub status: String,
    pub environment: String,
    pub version: String,
}

pub struct ApiApp {
    config: Arc<Config>,
}

impl ApiApp {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn status(&self) -> AppStatus {
        AppStatus {
            status: "available".to_string(),
            environment: self.config.env().to_string(),
            version: VERSION.to_string(),
        }
    }
}

fn error_body(message: &str, code: u16, headonly: bool) -> Response {
    Response::from_json(&json!({ "error": true, "message": message }), code, headonly)
}

impl Handler for ApiApp {
    fn handle(&self, request: &Request, id: u128) -> Response {
        let method = request.method();
        debug!("[ID{}]API路由匹配开始: {} {}", id, method, request.path());

        if method == HttpRequestMethod::Options {
            return Response::from_status_code(204, &[], id, false);
        }
        let headonly = method == HttpRequestMethod::Head;

        match (request.path(), method) {
            (STATUS_PATH, HttpRequestMethod::Get | HttpRequestMethod::Head) => {
                match serde_json::to_value(self.status()) {
                    Ok(body) => Response::from_json(&body, 200, headonly),
                    Err(e) => {
                        warn!("[ID{}]序列化状态信息失败：{}", id, e);
                        error_body("internal server error", 500, headonly)
                    }
                }
            }
            (STATUS_PATH, _) => error_body("method not allowed", 405, false),
            (path, _) => {
                warn!("[ID{}]API路径：{} 不存在", id, path);
                error_body("not found", 404, headonly)
            }
        }
    }
}

/// 隐藏连接串中的密码，例如 `user:secret@tcp(...)` 变为 `user:***@tcp(...)`
pub fn redact_dsn(dsn: &str) -> String {
    let Some(at) = dsn.find('@') else {
        return dsn.to_string();
    };
    match dsn[..at].find(':') {
        Some(colon) => format!("{}:***{}", &dsn[..colon], &dsn[at..]),
        None => dsn.to_string(),
    }
}
