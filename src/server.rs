// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 服务器
//!
//! - [`serve`]：接收连接的主循环，每个连接一个 tokio 任务，读写均有超时。
//! - [`Handler`]：把解析好的请求转换为响应，前端与后端各有一个实现。
//! - [`WebApp`]：前端应用状态与路由。

use std::{
    future::Future,
    net::{Ipv4Addr, SocketAddrV4},
    path::Path,
    sync::{Arc, Mutex},
    time::Instant,
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::spawn_blocking,
    time::timeout,
};

use crate::{
    cache::StaticCache,
    config::Config,
    exception::Exception,
    handlers,
    param::HttpRequestMethod,
    request::{content_length, find_header_end, Request},
    response::Response,
    template::{EmbeddedTemplates, Renderer, TemplateData, TemplateSource},
    util::safe_join,
};

const READ_CHUNK: usize = 4096;

/// `\r\n\r\n`
const HEADER_SEPARATOR_LEN: usize = 4;

/// 请求处理器
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: &Request, id: u128) -> Response;
}

/// 前端应用：配置、渲染器与静态资源缓存
pub struct WebApp {
    config: Arc<Config>,
    renderer: Renderer,
    statics: Mutex<StaticCache>,
}

impl WebApp {
    /// 使用编译进二进制的模板
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_source(config, Arc::new(EmbeddedTemplates))
    }

    pub fn with_source(config: Arc<Config>, source: Arc<dyn TemplateSource>) -> Self {
        let renderer = Renderer::new(config.env(), config.api(), source);
        let statics = Mutex::new(StaticCache::with_capacity(config.static_cache_size()));
        Self {
            config,
            renderer,
            statics,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// 渲染页面并包装成 HTML 响应。
    ///
    /// 渲染失败时返回 500，正文是失败前模板已经写出的内容。
    pub fn render_page(
        &self,
        request: &Request,
        id: u128,
        page: &str,
        data: Option<&mut TemplateData>,
        partials: &[&str],
    ) -> Response {
        let headonly = request.method() == HttpRequestMethod::Head;
        let mut body = Vec::new();
        match self.renderer.render(&mut body, page, data, partials) {
            Ok(()) => Response::from_html(body, request.accept_encoding(), id, headonly),
            Err(e) => {
                error!(
                    "[ID{}]渲染页面{}失败，局部模板：{:?}，运行模式：{}，错误：{}",
                    id,
                    page,
                    partials,
                    self.config.env(),
                    e
                );
                Response::from_html(body, request.accept_encoding(), id, headonly).with_code(500)
            }
        }
    }

    fn serve_static(&self, request: &Request, id: u128, relative: &str) -> Response {
        let headonly = request.method() == HttpRequestMethod::Head;
        let result = safe_join(self.config.static_root(), relative).and_then(|path| {
            Response::from_static(
                Path::new(&path),
                request.accept_encoding(),
                id,
                &self.statics,
                headonly,
            )
        });
        match result {
            Ok(response) => response,
            Err(e) => {
                warn!("[ID{}]静态资源{}不可用：{}", id, relative, e);
                Response::from_status_code(e.status_code(), request.accept_encoding(), id, headonly)
            }
        }
    }
}

impl Handler for WebApp {
    fn handle(&self, request: &Request, id: u128) -> Response {
        let method = request.method();
        let path = request.path();
        debug!("[ID{}]路由匹配开始: {} {}", id, method, path);

        if method == HttpRequestMethod::Options {
            return Response::from_status_code(204, request.accept_encoding(), id, false);
        }
        let readable = matches!(method, HttpRequestMethod::Get | HttpRequestMethod::Head);

        match path {
            "/" | "/virtual-terminal" if readable => handlers::virtual_terminal(self, request, id),
            "/payment-succeeded" if method == HttpRequestMethod::Post => {
                handlers::payment_succeeded(self, request, id)
            }
            "/" | "/virtual-terminal" | "/payment-succeeded" => {
                Response::from_status_code(405, request.accept_encoding(), id, false)
            }
            _ => match path.strip_prefix("/static/") {
                Some(relative) if readable => self.serve_static(request, id, relative),
                Some(_) => Response::from_status_code(405, request.accept_encoding(), id, false),
                None => {
                    warn!("[ID{}]请求的路径：{} 不存在，返回404", id, path);
                    Response::from_status_code(404, request.accept_encoding(), id, method == HttpRequestMethod::Head)
                }
            },
        }
    }
}

/// 按配置绑定监听地址：`local = true` 时只监听回环地址
pub async fn bind(config: &Config) -> std::io::Result<TcpListener> {
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    TcpListener::bind(SocketAddrV4::new(address, config.port())).await
}

/// 主循环：持续接收新连接，直到 `shutdown` 完成
pub async fn serve<H, F>(listener: TcpListener, handler: Arc<H>, config: Arc<Config>, shutdown: F)
where
    H: Handler,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut id: u128 = 0;

    loop {
        let (mut stream, addr) = tokio::select! {
            _ = &mut shutdown => {
                info!("主循环接收到停机指令，停止接受新连接");
                return;
            }
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!("接受连接失败：{}", e);
                    continue;
                }
            },
        };
        debug!("[ID{}]新的连接：{}", id, addr);

        let handler = Arc::clone(&handler);
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            handle_connection(&mut stream, id, handler, &config).await;
        });
        id += 1;
    }
}

/// 单个连接：读取请求、交给处理器、写回响应，然后关闭连接
async fn handle_connection<H: Handler>(stream: &mut TcpStream, id: u128, handler: Arc<H>, config: &Config) {
    let buffer = match timeout(config.read_timeout(), read_request(stream, config)).await {
        Ok(Ok(Some(buffer))) => buffer,
        Ok(Ok(None)) => {
            debug!("[ID{}]客户端在发送请求前关闭了连接", id);
            return;
        }
        Ok(Err(e)) => {
            warn!("[ID{}]读取请求失败：{}", id, e);
            write_response(stream, id, &Response::from_status_code(e.status_code(), &[], id, false), config).await;
            return;
        }
        Err(_) => {
            warn!("[ID{}]读取请求超时", id);
            let e = Exception::Timeout;
            write_response(stream, id, &Response::from_status_code(e.status_code(), &[], id, false), config).await;
            return;
        }
    };

    let start_time = Instant::now();
    let request = match Request::try_from(&buffer, id) {
        Ok(req) => req,
        Err(e) => {
            error!("[ID{}]解析HTTP请求失败: {}", id, e);
            write_response(stream, id, &Response::from_status_code(e.status_code(), &[], id, false), config).await;
            return;
        }
    };

    // 渲染可能在模板编译锁上阻塞，只能在阻塞线程池中执行
    let (request, response) = match spawn_blocking(move || {
        let response = handler.handle(&request, id);
        (request, response)
    })
    .await
    {
        Ok(pair) => pair,
        Err(e) => {
            error!("[ID{}]处理请求的任务异常退出：{}", id, e);
            write_response(stream, id, &Response::from_status_code(500, &[], id, false), config).await;
            return;
        }
    };
    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );
    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}",
        id,
        request.version(),
        request.path(),
        request.method(),
        response.status_code(),
        response.information(),
        request.user_agent(),
    );

    write_response(stream, id, &response, config).await;
}

/// 读取一个完整请求（标头 + `Content-Length` 指定的请求体）。
///
/// 客户端未发送任何字节就关闭连接时返回 `Ok(None)`。
async fn read_request(stream: &mut TcpStream, config: &Config) -> Result<Option<Vec<u8>>, Exception> {
    let limit = config.max_request_size();
    let mut buffer = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    let header_end = timeout(config.read_header_timeout(), async {
        loop {
            if let Some(end) = find_header_end(&buffer) {
                return Ok::<_, Exception>(Some(end));
            }
            if buffer.len() > limit {
                return Err(Exception::RequestTooLarge(limit));
            }
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                if buffer.is_empty() {
                    return Ok(None);
                }
                return Err(Exception::MalformedRequest(
                    "connection closed before end of headers".to_string(),
                ));
            }
            buffer.extend_from_slice(&chunk[..n]);
        }
    })
    .await
    .map_err(|_| Exception::Timeout)??;

    let Some(header_end) = header_end else {
        return Ok(None);
    };

    let head = std::str::from_utf8(&buffer[..header_end]).map_err(|_| Exception::RequestIsNotUtf8)?;
    let total = request_size(header_end, content_length(head)?, limit)?;
    while buffer.len() < total {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
    Ok(Some(buffer))
}

/// 标头、分隔符与请求体的总长度，超过 `limit`（或溢出）即拒绝
fn request_size(header_end: usize, body_length: usize, limit: usize) -> Result<usize, Exception> {
    header_end
        .checked_add(HEADER_SEPARATOR_LEN)
        .and_then(|n| n.checked_add(body_length))
        .filter(|&total| total <= limit)
        .ok_or(Exception::RequestTooLarge(limit))
}

async fn write_response(stream: &mut TcpStream, id: u128, response: &Response, config: &Config) {
    let bytes = response.as_bytes();
    debug!("[ID{}]发送响应，长度: {}", id, bytes.len());
    let result = timeout(config.write_timeout(), async {
        stream.write_all(&bytes).await?;
        stream.flush().await?;
        stream.shutdown().await
    })
    .await;
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("[ID{}]发送响应失败: {}", id, e),
        Err(_) => error!("[ID{}]发送响应超时", id),
    }
}
