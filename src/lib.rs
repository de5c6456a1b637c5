//! localhost-manager 核心
//!
//! 本地 Web 开发栈（Apache / MySQL / PHP）控制面板的后端：
//! 提权执行系统命令、控制服务、生成并应用虚拟主机配置、管理运行时版本。

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;
pub mod state;

pub use api::Api;
pub use config::AppConfig;
pub use error::{CoreError, CoreResult, ErrorResponse};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// 日志输出到 stderr，stdout 只留给 JSON 结果
pub fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
