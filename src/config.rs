// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 配置
//!
//! 配置来源按优先级从低到高：内置默认值 < TOML 配置文件 < 命令行参数。
//! Stripe 密钥只从环境变量 `STRIPE_KEY` / `STRIPE_SECRET` 读取，不出现在文件和命令行中。
//! 启动后配置不再修改，以 `Arc<Config>` 传入服务器。

use std::{
    fmt,
    fs::File,
    io::{self, prelude::*},
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{Parser, ValueEnum};
use log::{error, warn};
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

use crate::param::{DEFAULT_API_PORT, DEFAULT_API_URL, DEFAULT_DSN, DEFAULT_WEB_PORT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Config serialization error")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation error: {0}")]
    Validation(String),
}

/// 运行模式
#[derive(Serialize, Deserialize, ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    #[default]
    Development,
    Production,
    /// 仅后端 API 使用
    Maintenance,
}

impl AppEnv {
    /// 只有生产模式复用已编译的模板
    pub fn caches_templates(self) -> bool {
        self == AppEnv::Production
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppEnv::Development => write!(f, "development"),
            AppEnv::Production => write!(f, "production"),
            AppEnv::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// Stripe 密钥对
#[derive(Clone, Default)]
pub struct StripeConfig {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeConfig")
            .field("key", &self.key)
            .field("secret", &"***")
            .finish()
    }
}

/// 前端服务命令行参数
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Virtual terminal front end", long_about = None)]
pub struct WebCli {
    /// Server port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Application environment
    #[arg(long, value_enum)]
    pub env: Option<AppEnv>,

    /// URL to api
    #[arg(long)]
    pub api: Option<String>,

    /// Config file
    #[arg(short = 'C', long, default_value = "config/web.toml")]
    pub config: PathBuf,
}

/// 后端 API 命令行参数
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Virtual terminal back-end API", long_about = None)]
pub struct ApiCli {
    /// Server port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Application environment
    #[arg(long, value_enum)]
    pub env: Option<AppEnv>,

    /// Database DSN
    #[arg(long)]
    pub dsn: Option<String>,

    /// Config file
    #[arg(short = 'C', long, default_value = "config/api.toml")]
    pub config: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    port: u16,
    env: AppEnv,
    api: String,
    dsn: String,
    static_root: String,
    worker_threads: usize,
    static_cache_size: usize,
    local: bool,
    /// 读取完整请求（含请求体）的超时秒数
    read_timeout: u64,
    read_header_timeout: u64,
    write_timeout: u64,
    max_request_size: usize,
    #[serde(skip)]
    stripe: StripeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_WEB_PORT,
            env: AppEnv::Development,
            api: DEFAULT_API_URL.to_string(),
            dsn: DEFAULT_DSN.to_string(),
            static_root: "static".to_string(),
            worker_threads: 0,
            static_cache_size: 16,
            local: false,
            read_timeout: 10,
            read_header_timeout: 5,
            write_timeout: 5,
            max_request_size: 1024 * 1024,
            stripe: StripeConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// 后端 API 的默认配置，仅端口不同
    pub fn api_defaults() -> Self {
        Self {
            port: DEFAULT_API_PORT,
            ..Self::default()
        }
    }

    /// 从 TOML 文件读取配置，文件中的键覆盖 `fallback` 的同名字段。文件不存在时返回 `fallback`。
    pub fn from_toml(filename: &Path, fallback: Config) -> Result<Self, ConfigError> {
        let mut file = match File::open(filename) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("配置文件{}不存在，使用默认配置", filename.display());
                return Ok(fallback.normalized());
            }
            Err(e) => return Err(ConfigError::Io(filename.to_path_buf(), e)),
        };
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)
            .map_err(|e| ConfigError::Io(filename.to_path_buf(), e))?;

        let overrides: toml::Table = match toml::from_str(&str_val) {
            Ok(t) => t,
            Err(e) => {
                error!("无法解析配置文件{}：{}", filename.display(), e);
                return Err(e.into());
            }
        };
        // 文件中未出现的键沿用 fallback，而不是 `Config::default()`
        let mut merged = match toml::Value::try_from(&fallback)? {
            toml::Value::Table(table) => table,
            _ => toml::Table::new(),
        };
        merged.extend(overrides);

        let raw_config: Config = match toml::Value::Table(merged).try_into() {
            Ok(c) => c,
            Err(e) => {
                error!("无法从配置文件{}构建配置对象：{}", filename.display(), e);
                return Err(e.into());
            }
        };
        Ok(raw_config.with_stripe_of(fallback).normalized())
    }

    /// 前端服务：文件 + 命令行 + 环境变量
    pub fn load_web(cli: &WebCli) -> Result<Self, ConfigError> {
        let mut config = Self::from_toml(&cli.config, Self::default())?;
        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(env) = cli.env {
            config.env = env;
        }
        if let Some(api) = &cli.api {
            config.api = api.clone();
        }
        config.stripe = stripe_from_env();
        config.validate_web()?;
        Ok(config)
    }

    /// 后端 API：文件 + 命令行 + 环境变量
    pub fn load_api(cli: &ApiCli) -> Result<Self, ConfigError> {
        let mut config = Self::from_toml(&cli.config, Self::api_defaults())?;
        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(env) = cli.env {
            config.env = env;
        }
        if let Some(dsn) = &cli.dsn {
            config.dsn = dsn.clone();
        }
        config.stripe = stripe_from_env();
        Ok(config)
    }

    /// 前端只接受 development / production
    pub fn validate_web(&self) -> Result<(), ConfigError> {
        if self.env == AppEnv::Maintenance {
            return Err(ConfigError::Validation(
                "front end environment must be development or production".to_string(),
            ));
        }
        if self.api.is_empty() {
            return Err(ConfigError::Validation("api url must not be empty".to_string()));
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.static_cache_size == 0 {
            warn!("static_cache_size被设置为0，但目前尚不支持禁用缓存，因此该值将被改为16。");
            self.static_cache_size = 16;
        }
        self
    }

    pub fn with_env(mut self, env: AppEnv) -> Self {
        self.env = env;
        self
    }

    pub fn with_static_root(mut self, root: &str) -> Self {
        self.static_root = root.to_string();
        self
    }

    fn with_stripe_of(mut self, other: Config) -> Self {
        self.stripe = other.stripe;
        self
    }

    pub fn with_stripe(mut self, key: &str, secret: &str) -> Self {
        self.stripe = StripeConfig {
            key: key.to_string(),
            secret: secret.to_string(),
        };
        self
    }
}

fn stripe_from_env() -> StripeConfig {
    StripeConfig {
        key: std::env::var("STRIPE_KEY").unwrap_or_default(),
        secret: std::env::var("STRIPE_SECRET").unwrap_or_default(),
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn env(&self) -> AppEnv {
        self.env
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn static_root(&self) -> &str {
        &self.static_root
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn static_cache_size(&self) -> usize {
        self.static_cache_size
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    pub fn read_header_timeout(&self) -> Duration {
        Duration::from_secs(self.read_header_timeout)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout)
    }

    pub fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    pub fn stripe(&self) -> &StripeConfig {
        &self.stripe
    }
}
