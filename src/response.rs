use crate::{cache::StaticCache, exception::Exception, param::*, util::HtmlBuilder};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error, warn};

use std::{
    ffi::OsStr,
    fs,
    io::{self, Write},
    path::Path,
    sync::Mutex,
};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    allow: Option<Vec<HttpRequestMethod>>,
    content: Option<Bytes>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: 0,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            allow: None,
            content: None,
        }
    }

    /// 渲染好的 HTML 页面，按客户端能力压缩
    pub fn from_html(
        html: Vec<u8>,
        accept_encoding: &[HttpEncoding],
        id: u128,
        headonly: bool,
    ) -> Self {
        let mut response = Self::new();
        response.content_type = Some("text/html;charset=utf-8".to_string());
        response.content_encoding = decide_encoding(accept_encoding);
        debug!("[ID{}]开始压缩HTML，原始大小: {} bytes", id, html.len());
        let body = match compress(html.clone(), response.content_encoding) {
            Ok(c) => c,
            Err(e) => {
                error!("[ID{}]压缩HTML失败: {}，返回未压缩内容", id, e);
                response.content_encoding = None;
                html
            }
        };
        response.set_body(Bytes::from(body), headonly);
        response
    }

    /// JSON 响应，不压缩
    pub fn from_json(value: &serde_json::Value, code: u16, headonly: bool) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        response.content_type = Some("application/json".to_string());
        response.set_body(Bytes::from(value.to_string()), headonly);
        response
    }

    /// 状态页。204 只返回 `Allow` 头，不带正文。
    pub fn from_status_code(
        code: u16,
        accept_encoding: &[HttpEncoding],
        id: u128,
        headonly: bool,
    ) -> Self {
        if code == 204 {
            let mut response = Self::new();
            response.set_code(204);
            response.allow = Some(ALLOWED_METHODS.to_vec());
            return response;
        }
        let note = match code {
            404 => Some(r"<h2>噢！</h2><p>你指定的网页无法找到。</p>"),
            500 => Some(r"<h2>噢！</h2><p>服务器出现了一个内部错误。</p>"),
            _ => None,
        };
        let html = HtmlBuilder::from_status_code(code, note).build();
        let mut response = Self::from_html(html.into_bytes(), accept_encoding, id, headonly);
        response.set_code(code);
        if code == 405 {
            response.allow = Some(ALLOWED_METHODS.to_vec());
        }
        response
    }

    /// 读取静态资源。命中缓存时不再读盘。
    pub fn from_static(
        path: &Path,
        accept_encoding: &[HttpEncoding],
        id: u128,
        cache: &Mutex<StaticCache>,
        headonly: bool,
    ) -> Result<Self, Exception> {
        let metadata = match fs::metadata(path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(Exception::FileNotFound),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Exception::FileNotFound),
            Err(e) => return Err(e.into()),
        };
        let modified = metadata.modified()?;
        let key = path.to_string_lossy().to_string();

        let cached = {
            let mut cache_lock = match cache.lock() {
                Ok(lock) => lock,
                Err(poisoned) => {
                    warn!("[ID{}]缓存锁被污染，恢复并继续", id);
                    poisoned.into_inner()
                }
            };
            cache_lock.fetch(&key, modified)
        };

        let raw = match cached {
            Some(bytes) => {
                debug!("[ID{}]静态资源缓存命中：{}", id, key);
                bytes
            }
            None => {
                debug!("[ID{}]静态资源缓存未命中，读取文件：{}", id, key);
                let bytes = Bytes::from(fs::read(path)?);
                if StaticCache::should_cache(metadata.len()) {
                    let mut cache_lock = match cache.lock() {
                        Ok(lock) => lock,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    cache_lock.store(&key, bytes.clone(), modified);
                }
                bytes
            }
        };

        let mime = get_mime(path.extension().unwrap_or_default());
        let mut response = Self::new();
        response.content_type = Some(mime.to_string());
        response.content_encoding = match should_skip_compression(mime) {
            true => None,
            false => decide_encoding(accept_encoding),
        };
        let body = match compress(raw.to_vec(), response.content_encoding) {
            Ok(c) => Bytes::from(c),
            Err(e) => {
                error!("[ID{}]压缩文件{}失败: {}，返回未压缩内容", id, key, e);
                response.content_encoding = None;
                raw
            }
        };
        response.set_body(body, headonly);
        Ok(response)
    }

    /// HEAD 请求保留 `Content-Length`，但不发送正文
    fn set_body(&mut self, body: Bytes, headonly: bool) {
        self.content_length = body.len() as u64;
        self.content = match headonly {
            true => None,
            false => Some(body),
        };
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                "Unknown Status".to_string()
            }
        };
        self
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.set_code(code);
        self
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let version: &str = match self.version {
            HttpVersion::V1_0 => "HTTP/1.0",
            HttpVersion::V1_1 => "HTTP/1.1",
        };
        let mut header = format!("{} {} {}{}", version, self.status_code, self.information, CRLF);
        if let Some(t) = &self.content_type {
            header.push_str(&format!("Content-Type: {}{}", t, CRLF));
        }
        if let Some(e) = self.content_encoding {
            header.push_str(&format!("Content-Encoding: {}{}", e, CRLF));
        }
        header.push_str(&format!("Content-Length: {}{}", self.content_length, CRLF));
        header.push_str(&format!("Date: {}{}", format_date(&self.date), CRLF));
        header.push_str(&format!("Server: {}{}", self.server_name, CRLF));
        if let Some(a) = &self.allow {
            let methods: Vec<String> = a.iter().map(|m| m.to_string()).collect();
            header.push_str(&format!("Allow: {}{}", methods.join(", "), CRLF));
        }
        header.push_str("Connection: close");
        header.push_str(CRLF);
        header.push_str(CRLF);

        [
            header.as_bytes(),
            match &self.content {
                Some(c) => c,
                None => b"",
            },
        ]
        .concat()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn content_encoding(&self) -> Option<HttpEncoding> {
        self.content_encoding
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let result = match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    };

    if let Ok(ref compressed) = result {
        debug!(
            "压缩完成: {:?}, 原始大小: {} bytes, 压缩后: {} bytes",
            mode,
            original_size,
            compressed.len()
        );
    }

    result
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = ["image/", "font/woff", "font/woff2"];
    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
        && mime_type != "image/svg+xml"
}

/// gzip 优先，其次 deflate，最后 brotli
fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    if accept_encoding.contains(&HttpEncoding::Gzip) {
        Some(HttpEncoding::Gzip)
    } else if accept_encoding.contains(&HttpEncoding::Deflate) {
        Some(HttpEncoding::Deflate)
    } else if accept_encoding.contains(&HttpEncoding::Br) {
        Some(HttpEncoding::Br)
    } else {
        None
    }
}

fn get_mime(extension: &OsStr) -> &'static str {
    extension
        .to_str()
        .and_then(|e| MIME_TYPES.get(e.to_ascii_lowercase().as_str()).copied())
        .unwrap_or("application/octet-stream")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use std::time::SystemTime;

    fn gunzip(data: &[u8]) -> String {
        let mut decoder = GzDecoder::new(data);
        let mut out = String::new();
        decoder.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_format_date() {
        let date = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_date(&date), "Fri, 02 Jan 2026 03:04:05 GMT");
    }

    #[test]
    fn test_compress_none() {
        let data = b"Hello, World!".to_vec();
        assert_eq!(compress(data.clone(), None).unwrap(), data);
    }

    #[test]
    fn test_compress_gzip_roundtrip() {
        let data = b"Hello, World! This is a test string for compression.".to_vec();
        let result = compress(data.clone(), Some(HttpEncoding::Gzip)).unwrap();

        assert_eq!(&result[0..2], &[0x1f, 0x8b]);
        assert_eq!(gunzip(&result).as_bytes(), &data[..]);
    }

    #[test]
    fn test_compress_deflate_and_brotli() {
        let data = b"Hello, World! This is a test string for compression.".to_vec();
        assert!(!compress(data.clone(), Some(HttpEncoding::Deflate)).unwrap().is_empty());
        assert!(!compress(data, Some(HttpEncoding::Br)).unwrap().is_empty());
    }

    #[test]
    fn test_decide_encoding() {
        assert_eq!(
            decide_encoding(&[HttpEncoding::Deflate, HttpEncoding::Gzip]),
            Some(HttpEncoding::Gzip)
        );
        assert_eq!(
            decide_encoding(&[HttpEncoding::Br, HttpEncoding::Deflate]),
            Some(HttpEncoding::Deflate)
        );
        assert_eq!(decide_encoding(&[HttpEncoding::Br]), Some(HttpEncoding::Br));
        assert_eq!(decide_encoding(&[]), None);
    }

    #[test]
    fn test_get_mime() {
        assert_eq!(get_mime(OsStr::new("css")), "text/css;charset=utf-8");
        assert_eq!(get_mime(OsStr::new("JS")), "text/javascript;charset=utf-8");
        assert_eq!(get_mime(OsStr::new("png")), "image/png");
        assert_eq!(get_mime(OsStr::new("unknown")), "application/octet-stream");
    }

    #[test]
    fn test_should_skip_compression() {
        assert!(should_skip_compression("image/png"));
        assert!(should_skip_compression("font/woff2"));
        assert!(!should_skip_compression("image/svg+xml"));
        assert!(!should_skip_compression("text/css;charset=utf-8"));
    }

    #[test]
    fn test_from_html_plain() {
        let response = Response::from_html(b"<p>hi</p>".to_vec(), &[], 0, false);
        let bytes = String::from_utf8(response.as_bytes()).unwrap();

        assert!(bytes.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(bytes.contains("Content-Type: text/html;charset=utf-8\r\n"));
        assert!(bytes.contains("Content-Length: 9\r\n"));
        assert!(bytes.contains("Server: payterm\r\n"));
        assert!(bytes.ends_with("\r\n\r\n<p>hi</p>"));
    }

    #[test]
    fn test_from_html_gzip() {
        let response = Response::from_html(b"<p>hi</p>".to_vec(), &[HttpEncoding::Gzip], 0, false);
        assert_eq!(response.content_encoding(), Some(HttpEncoding::Gzip));
        assert_eq!(gunzip(response.content().unwrap()), "<p>hi</p>");
        let bytes = response.as_bytes();
        assert!(String::from_utf8_lossy(&bytes).contains("Content-Encoding: gzip\r\n"));
    }

    #[test]
    fn test_head_keeps_length_without_body() {
        let response = Response::from_html(b"<p>hi</p>".to_vec(), &[], 0, true);
        assert_eq!(response.content_length(), 9);
        assert!(response.content().is_none());
        assert!(response.as_bytes().ends_with(b"\r\n\r\n"));
    }

    #[test]
    fn test_status_pages() {
        let not_found = Response::from_status_code(404, &[], 0, false);
        assert_eq!(not_found.status_code(), 404);
        assert_eq!(not_found.information(), "Not Found");
        let text = String::from_utf8(not_found.as_bytes()).unwrap();
        assert!(text.contains("你指定的网页无法找到"));

        let not_allowed = Response::from_status_code(405, &[], 0, false);
        let text = String::from_utf8(not_allowed.as_bytes()).unwrap();
        assert!(text.contains("Allow: GET, HEAD, POST, OPTIONS\r\n"));

        let options = Response::from_status_code(204, &[], 0, false);
        assert_eq!(options.content_length(), 0);
        assert!(options.content().is_none());
    }

    #[test]
    fn test_from_json() {
        let value = serde_json::json!({"status": "available"});
        let response = Response::from_json(&value, 200, false);
        let text = String::from_utf8(response.as_bytes()).unwrap();
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.ends_with(r#"{"status":"available"}"#));
    }

    #[test]
    fn test_from_static_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("styles.css");
        fs::write(&path, "body { color: red; }").unwrap();
        let cache = Mutex::new(StaticCache::with_capacity(4));

        let first = Response::from_static(&path, &[], 0, &cache, false).unwrap();
        assert_eq!(first.content().unwrap(), &Bytes::from("body { color: red; }"));
        assert_eq!(cache.lock().unwrap().len(), 1);

        let modified = fs::metadata(&path).unwrap().modified().unwrap();
        assert!(cache
            .lock()
            .unwrap()
            .fetch(&path.to_string_lossy(), modified)
            .is_some());
        assert!(cache
            .lock()
            .unwrap()
            .fetch(&path.to_string_lossy(), SystemTime::UNIX_EPOCH)
            .is_none());
    }

    #[test]
    fn test_from_static_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Mutex::new(StaticCache::with_capacity(4));
        let result = Response::from_static(&dir.path().join("nope.css"), &[], 0, &cache, false);
        assert!(matches!(result, Err(Exception::FileNotFound)));

        let result = Response::from_static(dir.path(), &[], 0, &cache, false);
        assert!(matches!(result, Err(Exception::FileNotFound)));
    }
}
