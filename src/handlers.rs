// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 页面处理函数
//!
//! 每个处理函数负责收集页面所需的数据，然后交给渲染器生成 HTML。

use log::error;
use serde_json::Value;

use crate::{
    param::CSS_VERSION,
    request::Request,
    response::Response,
    server::WebApp,
    template::TemplateData,
};

/// 支付成功页读取的表单字段及其在模板中的键名
const PAYMENT_FIELDS: [(&str, &str); 6] = [
    ("cardholder_name", "cardholder"),
    ("cardholder_email", "email"),
    ("payment_intent", "pi"),
    ("payment_method", "pm"),
    ("payment_amount", "pa"),
    ("payment_currency", "pc"),
];

/// 虚拟终端页面，需要 Stripe 的可公开密钥
pub fn virtual_terminal(app: &WebApp, request: &Request, id: u128) -> Response {
    let mut data = TemplateData::new()
        .with_string("publishable_key", &app.config().stripe().key)
        .with_css_version(CSS_VERSION);

    app.render_page(request, id, "terminal", Some(&mut data), &["stripe-js"])
}

/// 支付成功页：把支付表单回传的字段原样展示给收银员
pub fn payment_succeeded(app: &WebApp, request: &Request, id: u128) -> Response {
    let form = match request.form() {
        Ok(form) => form,
        Err(e) => {
            error!("[ID{}]解析支付表单失败：{}", id, e);
            return Response::from_status_code(e.status_code(), request.accept_encoding(), id, false);
        }
    };

    let mut data = TemplateData::new().with_css_version(CSS_VERSION);
    for (field, key) in PAYMENT_FIELDS {
        let value = form.get(field).cloned().unwrap_or_default();
        data.data.insert(key.to_string(), Value::String(value));
    }

    app.render_page(request, id, "succeeded", Some(&mut data), &[])
}
