//! 系统接口
//!
//! 提权执行任意命令、探测已安装的栈与平台信息、切换栈

use std::sync::Arc;
use tracing::info;

use crate::config::Settings;
use crate::domain::package::DetectedStack;
use crate::domain::platform::PlatformInfo;
use crate::domain::stack::{StackConfig, StackKey};
use crate::error::{CoreError, CoreResult};
use crate::infra::command::ExecOptions;
use crate::state::AppState;

use super::Api;

impl Api {
    /// 提权运行一条命令，成功时返回 stdout
    pub async fn execute_with_privileges(&self, command: &str, args: &[String]) -> CoreResult<String> {
        info!(command = %command, args = ?args, "Executing command with privileges");

        let options = ExecOptions::with_timeout(self.state.config.command_timeout).elevated(true);
        let output = self.state.executor.execute(command, args, &options).await?;
        if !output.success() {
            return Err(CoreError::CommandFailed {
                program: command.to_string(),
                exit_code: output.exit_code,
                stderr: output.error_detail(),
            });
        }
        Ok(output.stdout)
    }

    /// 当前平台上可用的栈，以及是否在磁盘上找到
    pub async fn detect_installed_stacks(&self) -> Vec<DetectedStack> {
        let platform = self.state.platform;
        let mut stacks = Vec::new();

        for key in StackKey::ALL.into_iter().filter(|k| k.is_available_on(platform)) {
            let candidates = key.detection_paths(platform);
            let mut found = None;
            for path in &candidates {
                if tokio::fs::try_exists(path).await.unwrap_or(false) {
                    found = Some(path.clone());
                    break;
                }
            }
            stacks.push(DetectedStack {
                key: key.as_str().to_string(),
                name: key.display_name(platform).to_string(),
                detected: found.is_some(),
                path: found
                    .or_else(|| candidates.into_iter().next())
                    .unwrap_or_default(),
            });
        }
        stacks
    }

    pub fn detect_platform(&self) -> PlatformInfo {
        PlatformInfo::detect()
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    /// 切换栈：写入 settings.json 并重新组装状态
    pub async fn set_stack(&mut self, key: &str) -> CoreResult<()> {
        let stack = StackConfig::lookup(key, self.state.platform)?;

        let mut settings = self.state.settings.clone();
        settings.stack = Some(stack.key.as_str().to_string());
        settings.save(&self.state.config.settings_json()).await?;

        let mut config = self.state.config.clone();
        config.stack = settings.stack.clone();
        self.state = AppState::with_executor(
            config,
            settings,
            self.state.platform,
            Arc::clone(&self.state.executor),
        )?;

        info!(stack = %stack.key, "Switched stack");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::test_api;
    use crate::infra::command::fake::failed;

    #[tokio::test]
    async fn test_execute_with_privileges() {
        let dir = tempfile::tempdir().unwrap();
        let (api, executor) = test_api(dir.path());

        let args = vec!["-l".to_string(), "/etc".to_string()];
        api.execute_with_privileges("ls", &args).await.unwrap();

        let calls = executor.calls();
        assert_eq!(calls[0].command_line(), "ls -l /etc");
        assert!(calls[0].elevated);
    }

    #[tokio::test]
    async fn test_execute_with_privileges_failure_keeps_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let (api, _) = crate::api::test_support::test_api_with(dir.path(), |_| {
            Ok(failed(2, "ls: cannot access '/nope': No such file or directory"))
        });

        match api.execute_with_privileges("ls", &["/nope".to_string()]).await {
            Err(CoreError::CommandFailed { exit_code, stderr, .. }) => {
                assert_eq!(exit_code, Some(2));
                assert!(stderr.contains("No such file or directory"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_set_stack_persists_and_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        let (mut api, _) = test_api(dir.path());

        api.set_stack("xampp").await.unwrap();
        assert_eq!(api.state().stack.key, StackKey::Xampp);
        assert_eq!(api.settings().stack.as_deref(), Some("xampp"));
        assert_eq!(
            api.state().stack.vhost_file.path,
            dir.path().join("vhosts.conf")
        );

        let saved = Settings::load(&dir.path().join("conf").join("settings.json"))
            .await
            .unwrap();
        assert_eq!(saved.stack.as_deref(), Some("xampp"));

        assert!(matches!(
            api.set_stack("laragon").await,
            Err(CoreError::UnknownStack(_))
        ));
        assert_eq!(api.state().stack.key, StackKey::Xampp);
    }

    #[tokio::test]
    async fn test_detect_installed_stacks_lists_platform_stacks() {
        let dir = tempfile::tempdir().unwrap();
        let (api, _) = test_api(dir.path());

        let stacks = api.detect_installed_stacks().await;
        let keys: Vec<&str> = stacks.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["native", "xampp"]);
    }
}
