// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 前端服务
//!
//! 提供虚拟终端页面、支付成功页面与静态资源。
//! 启动顺序：日志 → 配置 → 运行时 → 监听端口 → 主循环，Ctrl-C 后停止接受新连接。

use std::{process, sync::Arc};

use clap::Parser;
use log::{error, info};
use tokio::runtime::Builder;

use payterm::{
    config::{Config, WebCli},
    logging,
    server::{self, WebApp},
};

fn main() {
    logging::init(logging::LOG_CONFIG);

    let cli = WebCli::parse();
    let config = match Config::load_web(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("配置载入失败：{}", e);
            process::exit(1);
        }
    };
    info!("配置文件已载入");
    if config.stripe().key.is_empty() {
        info!("未设置STRIPE_KEY，虚拟终端页面将无法初始化支付表单");
    }

    let worker_threads = config.worker_threads();
    let runtime = match Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            process::exit(1);
        }
    };
    info!("工作线程数量：{}", worker_threads);

    let config = Arc::new(config);
    runtime.block_on(async move {
        let listener = match server::bind(&config).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("无法绑定端口：{}，错误：{}", config.port(), e);
                process::exit(1);
            }
        };
        info!(
            "Starting HTTP server in {} mode on port {}",
            config.env(),
            config.port()
        );

        let app = Arc::new(WebApp::new(Arc::clone(&config)));
        server::serve(listener, app, config, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("无法监听停机信号：{}", e);
            }
        })
        .await;
        info!("服务器已停止");
    });
}
