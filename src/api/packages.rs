//! 包管理与 php.ini 接口

use tokio::sync::broadcast;

use crate::domain::log::LogLine;
use crate::domain::package::{PackageVersion, PhpConfig};
use crate::domain::service::ServiceKind;
use crate::error::CoreResult;

use super::Api;

impl Api {
    pub async fn get_available_versions(&self, package: ServiceKind) -> CoreResult<Vec<PackageVersion>> {
        self.state.packages.list_available(package).await
    }

    pub async fn get_installed_versions(&self, package: ServiceKind) -> CoreResult<Vec<PackageVersion>> {
        self.state.packages.list_installed(package).await
    }

    /// 安装输出可以实时推送给订阅者
    pub async fn install_package(
        &self,
        package: ServiceKind,
        version: &str,
        log_tx: Option<broadcast::Sender<LogLine>>,
    ) -> CoreResult<String> {
        self.state.packages.install(package, version, log_tx).await
    }

    pub async fn uninstall_package(
        &self,
        package: ServiceKind,
        version: &str,
        log_tx: Option<broadcast::Sender<LogLine>>,
    ) -> CoreResult<String> {
        self.state.packages.uninstall(package, version, log_tx).await
    }

    pub async fn get_current_version(&self, package: ServiceKind) -> CoreResult<String> {
        self.state.packages.current_version(package).await
    }

    // ========== PHP ==========

    pub async fn get_available_php_versions(&self) -> CoreResult<Vec<PackageVersion>> {
        self.get_available_versions(ServiceKind::Php).await
    }

    pub async fn get_installed_php_versions(&self) -> CoreResult<Vec<PackageVersion>> {
        self.get_installed_versions(ServiceKind::Php).await
    }

    pub async fn install_php_version(
        &self,
        version: &str,
        log_tx: Option<broadcast::Sender<LogLine>>,
    ) -> CoreResult<String> {
        self.install_package(ServiceKind::Php, version, log_tx).await
    }

    pub async fn uninstall_php_version(
        &self,
        version: &str,
        log_tx: Option<broadcast::Sender<LogLine>>,
    ) -> CoreResult<String> {
        self.uninstall_package(ServiceKind::Php, version, log_tx).await
    }

    pub async fn get_current_php_version(&self) -> CoreResult<String> {
        self.get_current_version(ServiceKind::Php).await
    }

    pub async fn get_current_apache_version(&self) -> CoreResult<String> {
        self.get_current_version(ServiceKind::Apache).await
    }

    pub async fn get_current_mysql_version(&self) -> CoreResult<String> {
        self.get_current_version(ServiceKind::Mysql).await
    }

    pub async fn get_php_config(&self, version: &str) -> CoreResult<PhpConfig> {
        self.state.php_ini.get_config(version).await
    }

    pub async fn update_php_ini_setting(&self, version: &str, key: &str, value: &str) -> CoreResult<()> {
        self.state.php_ini.update_setting(version, key, value).await
    }

    pub async fn toggle_php_extension(&self, version: &str, extension: &str, enable: bool) -> CoreResult<()> {
        self.state
            .php_ini
            .toggle_extension(version, extension, enable)
            .await
    }
}
