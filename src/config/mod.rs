//! 配置模块
//!
//! 环境变量解析与 settings.json

pub mod env;
pub mod settings;

pub use env::{constants, AppConfig};
pub use settings::Settings;
