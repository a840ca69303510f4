// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 日志初始化：优先读取 YAML 配置，失败时退回到只输出到控制台的内置配置。

use log::{warn, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

pub const LOG_CONFIG: &str = "config/log4rs.yaml";

const CONSOLE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}";

pub fn init(path: &str) {
    let file_error = match log4rs::init_file(path, Default::default()) {
        Ok(()) => return,
        Err(e) => e,
    };

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));
    match config.map(log4rs::init_config) {
        Ok(Ok(_)) => warn!("无法载入日志配置{}：{}，改用控制台日志", path, file_error),
        Ok(Err(e)) => eprintln!("日志系统初始化失败：{}", e),
        Err(e) => eprintln!("内置日志配置无效：{}", e),
    }
}
