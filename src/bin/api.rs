// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 后端 API 服务

use std::{process, sync::Arc};

use clap::Parser;
use log::{error, info};
use tokio::runtime::Builder;

use payterm::{
    api::{redact_dsn, ApiApp},
    config::{ApiCli, Config},
    logging, server,
};

fn main() {
    logging::init(logging::LOG_CONFIG);

    let cli = ApiCli::parse();
    let config = match Config::load_api(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("配置载入失败：{}", e);
            process::exit(1);
        }
    };
    info!("数据库连接串：{}", redact_dsn(config.dsn()));

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            process::exit(1);
        }
    };

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
            "Starting Back end server in {} mode on port {}",
            config.env(),
            config.port()
        );

        let app = Arc::new(ApiApp::new(Arc::clone(&config)));
        server::serve(listener, app, config, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("无法监听停机信号：{}", e);
            }
        })
        .await;
        info!("服务器已停止");
    });
}
