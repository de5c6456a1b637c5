//! 领域模型模块
//!
//! 纯数据结构，不依赖 tokio

pub mod database;
pub mod host;
pub mod log;
pub mod package;
pub mod platform;
pub mod service;
pub mod stack;

// Re-exports for convenience
pub use database::MysqlUser;
pub use host::{HostAlias, HostMap, RuntimeSelector, VirtualHost};
pub use log::LogLine;
pub use package::{DetectedStack, PackageVersion, PhpConfig, PhpExtension};
pub use platform::{Platform, PlatformInfo};
pub use service::{ServiceAction, ServiceKind, ServicesStatus};
pub use stack::{CommandTemplate, InstallLayout, ManagedFile, StackConfig, StackKey, TemplateVars};
