//! 服务控制器
//!
//! start / stop / restart / switch 全部来自栈的命令模板，经由执行器运行。
//! restart 即 stop 后 start；stop 失败时不会执行 start。
//! 控制器本身不轮询，状态由调用方持有的 `StatusPoller` 定期探测。

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::package::PackageVersion;
use crate::domain::service::{ServiceAction, ServiceKind, ServicesStatus};
use crate::domain::stack::{CommandTemplate, ServiceCommands, StackConfig, TemplateVars};
use crate::error::{CoreError, CoreResult};
use crate::infra::command::{CommandExecutor, ExecOptions};

use super::packages::PackageBridge;
use super::status::{ProcessTableProbe, StatusProbe};

pub struct ServiceController {
    executor: Arc<dyn CommandExecutor>,
    stack: Arc<StackConfig>,
    packages: Arc<PackageBridge>,
    timeout: Duration,
}

impl ServiceController {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        stack: Arc<StackConfig>,
        packages: Arc<PackageBridge>,
        timeout: Duration,
    ) -> Self {
        Self {
            executor,
            stack,
            packages,
            timeout,
        }
    }

    /// 执行控制动作，返回给 UI 的成功消息
    pub async fn control(
        &self,
        action: ServiceAction,
        service: ServiceKind,
        target_version: Option<&str>,
    ) -> CoreResult<String> {
        info!(service = %service, action = %action, target_version = ?target_version, "Service control requested");

        match action {
            ServiceAction::Start => self.start(service).await?,
            ServiceAction::Stop => self.stop(service).await?,
            ServiceAction::Restart => {
                self.stop(service).await?;
                self.start(service).await?;
            }
            ServiceAction::Switch => return self.switch(service, target_version).await,
        }

        Ok(format!(
            "Service {} {} successfully",
            service,
            action.past_tense()
        ))
    }

    /// 进程表快照
    pub async fn status(&self) -> ServicesStatus {
        ProcessTableProbe::new(self.stack.clone()).probe().await
    }

    async fn start(&self, service: ServiceKind) -> CoreResult<()> {
        let template = self
            .commands(service, ServiceAction::Start)?
            .start
            .as_ref()
            .ok_or_else(|| self.unsupported(service, ServiceAction::Start))?;
        let vars = self.active_vars(service, template).await?;
        self.run_step(service, ServiceAction::Start, template, &vars).await
    }

    async fn stop(&self, service: ServiceKind) -> CoreResult<()> {
        let template = self
            .commands(service, ServiceAction::Stop)?
            .stop
            .as_ref()
            .ok_or_else(|| self.unsupported(service, ServiceAction::Stop))?;
        let vars = self.active_vars(service, template).await?;
        self.run_step(service, ServiceAction::Stop, template, &vars).await
    }

    /// 模板带版本占位符（如 `php{major_minor}-fpm`）时，用当前生效的版本填充
    async fn active_vars(&self, service: ServiceKind, template: &CommandTemplate) -> CoreResult<TemplateVars> {
        if !template.uses_version() {
            return Ok(TemplateVars::default());
        }
        let current = self.packages.current_version(service).await?;
        TemplateVars::for_version(service, &current)
    }

    /// 切换到已安装的版本；目标不在已安装列表中时不执行任何命令
    async fn switch(&self, service: ServiceKind, target_version: Option<&str>) -> CoreResult<String> {
        if !service.supports_switch() {
            return Err(CoreError::UnsupportedAction(format!(
                "{} does not support version switching",
                service.display_name()
            )));
        }
        let requested = target_version.ok_or_else(|| {
            CoreError::UnsupportedAction("switch requires a target version".to_string())
        })?;
        if PackageVersion::parse(requested).is_none() {
            return Err(CoreError::InvalidArgument(format!(
                "'{}' is not a version number",
                requested
            )));
        }

        let steps = self
            .stack
            .service_commands(service)
            .map(|c| c.switch.as_slice())
            .unwrap_or_default();
        if steps.is_empty() {
            return Err(self.unsupported(service, ServiceAction::Switch));
        }

        let installed = self.packages.list_installed(service).await?;
        let Some(target) = installed.iter().find(|v| v.matches(requested)) else {
            warn!(service = %service, version = %requested, "Switch target is not installed");
            return Err(CoreError::VersionNotInstalled {
                package: service.display_name().to_string(),
                version: requested.to_string(),
            });
        };

        let mut vars = TemplateVars::for_version(service, &target.version)?;
        if let Some(path) = &target.install_path {
            vars = vars.with_install_path(path);
        }
        for step in steps {
            self.run_step(service, ServiceAction::Switch, step, &vars).await?;
        }

        info!(service = %service, version = %target.version, "Switched version");
        Ok(format!(
            "{} switched to {}",
            service.display_name(),
            target.version
        ))
    }

    async fn run_step(
        &self,
        service: ServiceKind,
        action: ServiceAction,
        template: &CommandTemplate,
        vars: &TemplateVars,
    ) -> CoreResult<()> {
        let (program, args) = template.render(vars);
        let options = ExecOptions::with_timeout(self.timeout).elevated(template.elevated);

        let output = self.executor.execute(&program, &args, &options).await?;
        if !output.success() {
            warn!(
                service = %service,
                action = %action,
                exit_code = ?output.exit_code,
                "Service control command failed"
            );
            return Err(CoreError::ServiceControl {
                service: service.to_string(),
                action: action.to_string(),
                exit_code: output.exit_code,
                stderr: output.error_detail(),
            });
        }

        info!(service = %service, action = %action, program = %program, "Service control step succeeded");
        Ok(())
    }

    fn commands(&self, service: ServiceKind, action: ServiceAction) -> CoreResult<&ServiceCommands> {
        self.stack
            .service_commands(service)
            .ok_or_else(|| self.unsupported(service, action))
    }

    fn unsupported(&self, service: ServiceKind, action: ServiceAction) -> CoreError {
        CoreError::UnsupportedAction(format!(
            "{} cannot {} {}",
            self.stack.name,
            action,
            service.display_name()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::platform::Platform;
    use crate::domain::stack::InstallLayout;
    use crate::infra::command::fake::{failed, ok, ScriptedExecutor};
    use std::path::Path;

    fn controller(executor: Arc<ScriptedExecutor>, stack: StackConfig) -> ServiceController {
        let stack = Arc::new(stack);
        let packages = Arc::new(PackageBridge::new(
            executor.clone(),
            stack.clone(),
            Duration::from_secs(60),
        ));
        ServiceController::new(executor, stack, packages, Duration::from_secs(30))
    }

    fn linux_stack_with_php_dir(dir: &Path) -> StackConfig {
        let mut stack = StackConfig::lookup("native", Platform::Linux).unwrap();
        stack.layouts.insert(
            ServiceKind::Php,
            InstallLayout::VersionedBinaries {
                dir: dir.to_path_buf(),
                prefix: "php".to_string(),
            },
        );
        stack
    }

    #[tokio::test]
    async fn test_restart_is_stop_then_start() {
        let executor = Arc::new(ScriptedExecutor::succeeding());
        let controller = controller(executor.clone(), StackConfig::lookup("native", Platform::Linux).unwrap());

        let message = controller
            .control(ServiceAction::Restart, ServiceKind::Apache, None)
            .await
            .unwrap();

        assert_eq!(message, "Service apache restarted successfully");
        assert_eq!(
            executor.command_lines(),
            vec!["systemctl stop apache2", "systemctl start apache2"]
        );
        assert!(executor.calls().iter().all(|c| c.elevated));
    }

    #[tokio::test]
    async fn test_failed_stop_never_starts() {
        let executor = Arc::new(ScriptedExecutor::new(|call| {
            if call.args.first().map(String::as_str) == Some("stop") {
                Ok(failed(5, "Failed to stop apache2.service: Unit apache2.service not loaded."))
            } else {
                Ok(ok(""))
            }
        }));
        let controller = controller(executor.clone(), StackConfig::lookup("native", Platform::Linux).unwrap());

        let err = controller
            .control(ServiceAction::Restart, ServiceKind::Apache, None)
            .await
            .unwrap_err();

        match err {
            CoreError::ServiceControl {
                service,
                action,
                exit_code,
                stderr,
            } => {
                assert_eq!(service, "apache");
                assert_eq!(action, "stop");
                assert_eq!(exit_code, Some(5));
                assert_eq!(stderr, "Failed to stop apache2.service: Unit apache2.service not loaded.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(executor.command_lines(), vec!["systemctl stop apache2"]);
    }

    #[tokio::test]
    async fn test_php_start_targets_active_fpm_unit() {
        let executor = Arc::new(ScriptedExecutor::new(|call| {
            if call.args == ["-v"] {
                Ok(ok("PHP 8.3.14 (cli) (built: Nov 25 2024 18:07:16) (NTS)"))
            } else {
                Ok(ok(""))
            }
        }));
        let controller = controller(executor.clone(), StackConfig::lookup("native", Platform::Linux).unwrap());

        controller
            .control(ServiceAction::Restart, ServiceKind::Php, None)
            .await
            .unwrap();

        let lines = executor.command_lines();
        assert!(lines.contains(&"systemctl stop php8.3-fpm".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("systemctl start php8.3-fpm"));
    }

    #[tokio::test]
    async fn test_php_start_without_php_is_not_installed() {
        let executor = Arc::new(ScriptedExecutor::new(|call| {
            if call.args == ["-v"] {
                Ok(failed(127, "php: command not found"))
            } else {
                Ok(ok(""))
            }
        }));
        let controller = controller(executor.clone(), StackConfig::lookup("native", Platform::Linux).unwrap());

        assert!(matches!(
            controller.control(ServiceAction::Start, ServiceKind::Php, None).await,
            Err(CoreError::NotInstalled(_))
        ));
        assert!(executor.calls().iter().all(|c| c.program != "systemctl"));
    }

    #[tokio::test]
    async fn test_switch_to_absent_version_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("php8.3"), "").unwrap();
        let executor = Arc::new(ScriptedExecutor::succeeding());
        let controller = controller(executor.clone(), linux_stack_with_php_dir(dir.path()));

        let result = controller
            .control(ServiceAction::Switch, ServiceKind::Php, Some("8.1"))
            .await;

        assert!(matches!(
            result,
            Err(CoreError::VersionNotInstalled { ref package, ref version }) if package == "PHP" && version == "8.1"
        ));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_switch_runs_template_for_installed_version() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("php8.2"), "").unwrap();
        std::fs::write(dir.path().join("php8.3"), "").unwrap();
        let executor = Arc::new(ScriptedExecutor::succeeding());
        let controller = controller(executor.clone(), linux_stack_with_php_dir(dir.path()));

        let message = controller
            .control(ServiceAction::Switch, ServiceKind::Php, Some("8.2.26"))
            .await
            .unwrap();

        assert_eq!(message, "PHP switched to 8.2");
        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].command_line(),
            "update-alternatives --set php /usr/bin/php8.2"
        );
        assert!(calls[0].elevated);
    }

    #[tokio::test]
    async fn test_switch_mysql_is_unsupported() {
        let executor = Arc::new(ScriptedExecutor::succeeding());
        let controller = controller(executor.clone(), StackConfig::lookup("native", Platform::Linux).unwrap());

        assert!(matches!(
            controller
                .control(ServiceAction::Switch, ServiceKind::Mysql, Some("8.0"))
                .await,
            Err(CoreError::UnsupportedAction(_))
        ));
        assert!(matches!(
            controller
                .control(ServiceAction::Switch, ServiceKind::Php, None)
                .await,
            Err(CoreError::UnsupportedAction(_))
        ));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stack_without_switch_template() {
        let executor = Arc::new(ScriptedExecutor::succeeding());
        let controller = controller(executor.clone(), StackConfig::lookup("native", Platform::Linux).unwrap());

        assert!(matches!(
            controller
                .control(ServiceAction::Switch, ServiceKind::Apache, Some("2.4.62"))
                .await,
            Err(CoreError::UnsupportedAction(_))
        ));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stack_without_service_commands() {
        let executor = Arc::new(ScriptedExecutor::succeeding());
        let controller = controller(executor.clone(), StackConfig::lookup("laragon", Platform::Windows).unwrap());

        assert!(matches!(
            controller
                .control(ServiceAction::Start, ServiceKind::Apache, None)
                .await,
            Err(CoreError::UnsupportedAction(_))
        ));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_privilege_denial_propagates() {
        let executor = Arc::new(ScriptedExecutor::new(|call| {
            Err(CoreError::PrivilegeDenied {
                program: call.program.clone(),
                detail: "Not authorized".to_string(),
            })
        }));
        let controller = controller(executor, StackConfig::lookup("native", Platform::Linux).unwrap());

        assert!(matches!(
            controller
                .control(ServiceAction::Start, ServiceKind::Mysql, None)
                .await,
            Err(CoreError::PrivilegeDenied { .. })
        ));
    }
}
