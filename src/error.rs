//! 统一错误处理
//!
//! `CoreError` 覆盖命令执行、服务控制、配置生成/写入与包管理的全部失败场景。
//! 每个变体都携带原始 stderr / 退出码 / OS 错误，调用方拿到的永远不是
//! "operation failed" 这种没有细节的信息。本层不做任何自动重试。

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// 返回给 UI 的错误结构
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// 核心层错误类型
#[derive(Debug, Error)]
pub enum CoreError {
    /// 程序无法启动（不存在、无权限）
    #[error("Failed to spawn `{program}`: {source}")]
    Execution {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// 超时后进程已被杀死
    #[error("`{program}` timed out after {timeout_ms} ms")]
    ExecutionTimeout { program: String, timeout_ms: u64 },

    /// 用户取消或拒绝了提权
    #[error("Privilege elevation denied for `{program}`: {detail}")]
    PrivilegeDenied { program: String, detail: String },

    /// 服务控制命令返回非零退出码
    #[error("Failed to {action} {service} (exit {}): {stderr}", describe_exit(.exit_code))]
    ServiceControl {
        service: String,
        action: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{package} {version} is not installed")]
    VersionNotInstalled { package: String, version: String },

    /// 应用配置时的文件系统失败，已写入的文件会被回滚
    #[error("Failed to write {}: {detail}", .path.display())]
    ConfigWrite { path: PathBuf, detail: String },

    /// host 条目不合法（空 docroot / 域名等）
    #[error("Invalid host '{domain}': {reason}")]
    ConfigGeneration { domain: String, reason: String },

    /// 通用命令返回非零退出码（execute_with_privileges、mysql 客户端）
    #[error("`{program}` exited with {}: {stderr}", describe_exit(.exit_code))]
    CommandFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// 包管理器 install / uninstall 失败
    #[error("Failed to {operation} {package} {version} (exit {}): {stderr}", describe_exit(.exit_code))]
    PackageCommandFailed {
        package: String,
        version: String,
        operation: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{0} not found")]
    NotInstalled(String),

    #[error("Unknown stack '{0}'")]
    UnknownStack(String),

    #[error("Unknown service '{0}'")]
    UnknownService(String),

    #[error("{0}")]
    UnsupportedAction(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Host '{0}' not found")]
    HostNotFound(String),

    /// 域名 / 别名冲突
    #[error("Invalid host map: {0}")]
    InvalidHost(String),

    /// hosts.json / settings.json 读写失败
    #[error("{context} ({}): {detail}", .path.display())]
    Store {
        context: String,
        path: PathBuf,
        detail: String,
    },

    #[error("php.ini error at {}: {detail}", .path.display())]
    Ini { path: PathBuf, detail: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

impl CoreError {
    pub fn store(context: impl Into<String>, path: impl Into<PathBuf>, detail: impl ToString) -> Self {
        Self::Store {
            context: context.into(),
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    pub fn config_write(path: impl Into<PathBuf>, detail: impl ToString) -> Self {
        Self::ConfigWrite {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    pub fn generation(domain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigGeneration {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// 稳定的 snake_case 错误码，UI 据此分支
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Execution { .. } => "execution_error",
            CoreError::ExecutionTimeout { .. } => "execution_timeout",
            CoreError::PrivilegeDenied { .. } => "privilege_denied",
            CoreError::ServiceControl { .. } => "service_control_error",
            CoreError::VersionNotInstalled { .. } => "version_not_installed",
            CoreError::ConfigWrite { .. } => "config_write_error",
            CoreError::ConfigGeneration { .. } => "config_generation_error",
            CoreError::CommandFailed { .. } => "command_failed",
            CoreError::PackageCommandFailed { .. } => "package_command_failed",
            CoreError::NotInstalled(_) => "not_installed",
            CoreError::UnknownStack(_) => "unknown_stack",
            CoreError::UnknownService(_) => "unknown_service",
            CoreError::UnsupportedAction(_) => "unsupported_action",
            CoreError::InvalidArgument(_) => "invalid_argument",
            CoreError::HostNotFound(_) => "host_not_found",
            CoreError::InvalidHost(_) => "invalid_host",
            CoreError::Store { .. } => "store_error",
            CoreError::Ini { .. } => "ini_error",
        }
    }

    /// 被捕获的原始输出（如有）
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            CoreError::ServiceControl { stderr, .. }
            | CoreError::CommandFailed { stderr, .. }
            | CoreError::PackageCommandFailed { stderr, .. } => Some(stderr),
            CoreError::PrivilegeDenied { detail, .. } | CoreError::ConfigWrite { detail, .. } => {
                Some(detail)
            }
            _ => None,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let response = ErrorResponse::new(self.kind(), self.to_string());
        match self.captured_output() {
            Some(output) if !output.trim().is_empty() => response.with_details(output.trim()),
            _ => response,
        }
    }
}

/// 便捷类型别名
pub type CoreResult<T> = Result<T, CoreError>;
