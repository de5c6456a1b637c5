//! 服务运行状态探测
//!
//! 只读进程表，不执行任何命令。

use async_trait::async_trait;
use std::sync::Arc;
use sysinfo::{ProcessRefreshKind, RefreshKind, System};
use tracing::warn;

use crate::domain::service::{ServiceKind, ServicesStatus};
use crate::domain::stack::StackConfig;

/// 状态来源（轮询器依赖这个 trait）
#[async_trait]
pub trait StatusProbe: Send + Sync + 'static {
    async fn probe(&self) -> ServicesStatus;
}

/// 基于 sysinfo 进程表的探测
#[derive(Clone, Debug)]
pub struct ProcessTableProbe {
    stack: Arc<StackConfig>,
}

impl ProcessTableProbe {
    pub fn new(stack: Arc<StackConfig>) -> Self {
        Self { stack }
    }
}

#[async_trait]
impl StatusProbe for ProcessTableProbe {
    async fn probe(&self) -> ServicesStatus {
        let stack = self.stack.clone();
        match tokio::task::spawn_blocking(move || {
            status_from_process_names(&stack, &running_process_names())
        })
        .await
        {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Process table probe failed");
                ServicesStatus::default()
            }
        }
    }
}

/// 当前所有进程名
fn running_process_names() -> Vec<String> {
    let sys = System::new_with_specifics(
        RefreshKind::new().with_processes(ProcessRefreshKind::new()),
    );
    sys.processes()
        .values()
        .map(|p| p.name().to_string_lossy().into_owned())
        .collect()
}

/// 进程名以候选前缀开头（不区分大小写）即视为运行中，
/// `php-fpm` 可匹配 `php-fpm8.2`，`httpd` 可匹配 `httpd.exe`
pub fn status_from_process_names(stack: &StackConfig, names: &[String]) -> ServicesStatus {
    let lowered: Vec<String> = names.iter().map(|n| n.to_ascii_lowercase()).collect();
    let running = |service: ServiceKind| {
        stack.process_candidates(service).iter().any(|candidate| {
            let candidate = candidate.to_ascii_lowercase();
            lowered.iter().any(|name| name.starts_with(&candidate))
        })
    };

    ServicesStatus::new(
        running(ServiceKind::Apache),
        running(ServiceKind::Mysql),
        running(ServiceKind::Php),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::platform::Platform;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_native_linux_matching() {
        let stack = StackConfig::lookup("native", Platform::Linux).unwrap();
        let status = status_from_process_names(
            &stack,
            &names(&["systemd", "apache2", "php-fpm8.2", "bash"]),
        );

        assert_eq!(status, ServicesStatus::new(true, false, true));
        assert!(!status.all_running);
    }

    #[test]
    fn test_windows_exe_names() {
        let stack = StackConfig::lookup("native", Platform::Windows).unwrap();
        let status = status_from_process_names(
            &stack,
            &names(&["HTTPD.EXE", "mysqld.exe", "php-cgi.exe"]),
        );
        assert!(status.all_running);
    }

    #[test]
    fn test_mod_php_follows_apache() {
        let stack = StackConfig::lookup("xampp", Platform::Linux).unwrap();
        let status = status_from_process_names(&stack, &names(&["httpd", "mysqld"]));
        assert!(status.php);

        let status = status_from_process_names(&stack, &names(&["mysqld"]));
        assert_eq!(status, ServicesStatus::new(false, true, false));
    }

    #[tokio::test]
    async fn test_probe_reads_live_process_table() {
        let stack = Arc::new(StackConfig::lookup("native", Platform::current()).unwrap());
        // 结果依赖宿主环境，只验证派生字段一致
        let status = ProcessTableProbe::new(stack).probe().await;
        assert_eq!(status.all_running, status.apache && status.mysql && status.php);
    }
}
