pub mod api;
pub mod cache;
pub mod config;
pub mod exception;
pub mod handlers;
pub mod logging;
pub mod param;
pub mod request;
pub mod response;
pub mod server;
pub mod template;
pub mod util;

pub use api::ApiApp;
pub use cache::StaticCache;
pub use config::{AppEnv, Config};
pub use exception::Exception;
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use request::Request;
pub use response::Response;
pub use server::{Handler, WebApp};
pub use template::{Renderer, TemplateData, TemplateError};
pub use util::HtmlBuilder;
