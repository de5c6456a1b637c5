//! 应用状态
//!
//! 按配置组装执行器、栈配置与各个服务。栈的选择顺序：
//! 命令行参数 > `LHM_STACK` > settings.json > `native`（前两者由调用方写入 `AppConfig`）。

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::{constants, AppConfig, Settings};
use crate::domain::platform::Platform;
use crate::domain::stack::StackConfig;
use crate::error::CoreResult;
use crate::infra::command::{CommandExecutor, CommandRunner};
use crate::services::{
    apply::ConfigApplier, controller::ServiceController, mysql_admin::MysqlAdmin,
    packages::PackageBridge, php_ini::PhpIniManager, status::ProcessTableProbe,
};

use super::host_store::HostStore;

/// 应用状态
pub struct AppState {
    // ========== 配置 ==========
    pub config: AppConfig,
    /// settings.json 的内容（加载时的快照）
    pub settings: Settings,
    pub platform: Platform,
    pub stack: Arc<StackConfig>,
    /// 证书目录
    pub ssl_dir: PathBuf,

    // ========== 服务 ==========
    pub executor: Arc<dyn CommandExecutor>,
    pub host_store: HostStore,
    pub packages: Arc<PackageBridge>,
    pub controller: Arc<ServiceController>,
    pub applier: ConfigApplier,
    pub php_ini: PhpIniManager,
    pub mysql: MysqlAdmin,
}

impl AppState {
    /// 读取 settings.json 并使用系统执行器
    pub async fn load(config: AppConfig) -> CoreResult<Self> {
        let settings = Settings::load(&config.settings_json()).await?;
        let platform = Platform::current();
        Self::with_executor(
            config,
            settings,
            platform,
            Arc::new(CommandRunner::for_platform(platform)),
        )
    }

    pub fn with_executor(
        config: AppConfig,
        settings: Settings,
        platform: Platform,
        executor: Arc<dyn CommandExecutor>,
    ) -> CoreResult<Self> {
        let stack_key = config
            .stack
            .clone()
            .or_else(|| settings.stack.clone())
            .unwrap_or_else(|| constants::DEFAULT_STACK.to_string());

        let mut stack = StackConfig::lookup(&stack_key, platform)?;
        if let Some(path) = &config.hosts_file {
            stack = stack.with_hosts_file(path.clone());
        }
        if let Some(path) = &config.vhost_file {
            stack = stack.with_vhost_file(path.clone());
        }
        let stack = Arc::new(stack);

        let ssl_dir = config
            .ssl_dir
            .clone()
            .or_else(|| settings.ssl_path.clone())
            .unwrap_or_else(|| config.default_ssl_dir());

        info!(
            stack = %stack.key,
            platform = %platform.name(),
            data_dir = %config.data_dir.display(),
            vhost_file = %stack.vhost_file.path.display(),
            hosts_file = %stack.hosts_file.path.display(),
            "Loaded configuration"
        );

        let packages = Arc::new(PackageBridge::new(
            executor.clone(),
            stack.clone(),
            config.install_timeout,
        ));
        let controller = Arc::new(ServiceController::new(
            executor.clone(),
            stack.clone(),
            packages.clone(),
            config.command_timeout,
        ));
        let applier = ConfigApplier::new(
            executor.clone(),
            controller.clone(),
            platform,
            config.staging_dir(),
            config.command_timeout,
        );
        let php_ini = PhpIniManager::new(packages.clone(), stack.clone());
        let mysql = MysqlAdmin::new(executor.clone(), stack.clone(), config.command_timeout);

        Ok(Self {
            host_store: HostStore::new(config.hosts_json()),
            config,
            settings,
            platform,
            stack,
            ssl_dir,
            executor,
            packages,
            controller,
            applier,
            php_ini,
            mysql,
        })
    }

    /// 当前栈的进程表探测器，供轮询器使用
    pub fn status_probe(&self) -> ProcessTableProbe {
        ProcessTableProbe::new(self.stack.clone())
    }
}
