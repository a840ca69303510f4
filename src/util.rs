use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
};

use crate::{exception::Exception, param::STATUS_CODES};

/// 简单的状态页生成器（404、405、500 等），不经过模板引擎
pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let description = match note {
            Some(n) => n,
            None => STATUS_CODES.get(&code).copied().unwrap_or("Unknown Status"),
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code, description
        );
        Self { title, css, body }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <html>
                <head>
                    <meta charset="utf-8">
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.title, self.css, self.body
        )
    }
}

/// 解析 `application/x-www-form-urlencoded` 请求体。
///
/// 同名字段保留第一个值；`+` 视为空格。
pub fn parse_form(body: &str) -> Result<HashMap<String, String>, Exception> {
    let mut form = HashMap::new();
    for pair in body.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key)?;
        let value = decode_component(value)?;
        form.entry(key).or_insert(value);
    }
    Ok(form)
}

fn decode_component(raw: &str) -> Result<String, Exception> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|_| Exception::MalformedRequest(format!("bad form encoding: {}", raw)))
}

/// 把 URL 路径安全地拼接到根目录下，拒绝 `..`、绝对路径等越权写法
pub fn safe_join(root: &str, relative: &str) -> Result<PathBuf, Exception> {
    let decoded = urlencoding::decode(relative).map_err(|_| Exception::InvalidPath)?;
    if decoded.contains('\0') || decoded.contains('\\') {
        return Err(Exception::InvalidPath);
    }
    let mut full = PathBuf::from(root);
    for component in Path::new(decoded.as_ref()).components() {
        match component {
            Component::Normal(part) => full.push(part),
            Component::CurDir => {}
            _ => return Err(Exception::InvalidPath),
        }
    }
    Ok(full)
}
