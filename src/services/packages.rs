//! 包管理桥接
//!
//! - `list_available`：静态版本目录，合并已安装状态
//! - `list_installed`：按栈的安装布局扫描文件系统，不缓存
//! - `install` / `uninstall`：执行栈的包管理命令模板，失败不重试
//! - `current_version`：依次运行二进制候选并解析版本号

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::constants::VERSION_PROBE_TIMEOUT_SECS;
use crate::domain::log::LogLine;
use crate::domain::package::{sort_newest_first, PackageVersion};
use crate::domain::platform::Platform;
use crate::domain::service::ServiceKind;
use crate::domain::stack::{
    CommandTemplate, InstallLayout, PackageCommands, StackConfig, TemplateVars,
};
use crate::error::{CoreError, CoreResult};
use crate::infra::command::{CommandExecutor, ExecOptions};

/// 支持安装的 PHP 版本
const PHP_CATALOG: &[&str] = &["8.4.1", "8.3.14", "8.2.26", "8.1.30", "8.0.30", "7.4.33"];
const APACHE_CATALOG: &[&str] = &["2.4.62"];
const MYSQL_CATALOG: &[&str] = &["8.4.3", "8.0.40"];

pub struct PackageBridge {
    executor: Arc<dyn CommandExecutor>,
    stack: Arc<StackConfig>,
    install_timeout: Duration,
}

impl PackageBridge {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        stack: Arc<StackConfig>,
        install_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            stack,
            install_timeout,
        }
    }

    /// 版本目录 + 已安装标记
    pub async fn list_available(&self, package: ServiceKind) -> CoreResult<Vec<PackageVersion>> {
        let installed = self.list_installed(package).await?;
        let catalog = match package {
            ServiceKind::Php => PHP_CATALOG,
            ServiceKind::Apache => APACHE_CATALOG,
            ServiceKind::Mysql => MYSQL_CATALOG,
        };

        let versions = catalog
            .iter()
            .filter_map(|v| PackageVersion::parse(v))
            .map(|mut version| {
                if package == ServiceKind::Php && self.stack.platform == Platform::Windows {
                    version.download_url = Some(windows_php_download_url(&version));
                }
                if let Some(found) = installed
                    .iter()
                    .find(|i| i.major_minor() == version.major_minor())
                {
                    version.installed = true;
                    version.install_path = found.install_path.clone();
                }
                version
            })
            .collect();
        Ok(versions)
    }

    /// 扫描已安装版本（新版本在前）
    ///
    /// 单一安装布局需要运行一次二进制读取版本，其它布局只读文件系统。
    pub async fn list_installed(&self, package: ServiceKind) -> CoreResult<Vec<PackageVersion>> {
        let Some(layout) = self.stack.layouts.get(&package) else {
            return Ok(Vec::new());
        };

        let mut versions = match layout {
            InstallLayout::Cellar { root, formula } => scan_cellar(root, formula).await,
            InstallLayout::VersionedBinaries { dir, prefix } => {
                scan_versioned_binaries(dir, prefix).await
            }
            InstallLayout::VersionDirs { dir, prefix } => scan_version_dirs(dir, prefix).await,
            InstallLayout::Single { binary } => self.probe_single(package, binary).await,
        };
        sort_newest_first(&mut versions);
        versions.dedup_by(|a, b| a.version == b.version);

        debug!(package = %package, count = versions.len(), "Scanned installed versions");
        Ok(versions)
    }

    pub async fn install(
        &self,
        package: ServiceKind,
        version: &str,
        log_tx: Option<broadcast::Sender<LogLine>>,
    ) -> CoreResult<String> {
        let template = &self.package_commands(package)?.install;
        self.run_package_command(package, version, "install", template, log_tx)
            .await?;
        Ok(format!(
            "{} {} installed successfully",
            package.display_name(),
            version
        ))
    }

    pub async fn uninstall(
        &self,
        package: ServiceKind,
        version: &str,
        log_tx: Option<broadcast::Sender<LogLine>>,
    ) -> CoreResult<String> {
        let template = &self.package_commands(package)?.uninstall;
        self.run_package_command(package, version, "uninstall", template, log_tx)
            .await?;
        Ok(format!(
            "{} {} uninstalled successfully",
            package.display_name(),
            version
        ))
    }

    /// 当前生效的版本
    pub async fn current_version(&self, package: ServiceKind) -> CoreResult<String> {
        for candidate in self.stack.binary_candidates(package) {
            if let Some(version) = self.probe_binary(package, candidate).await {
                return Ok(version);
            }
        }
        Err(CoreError::NotInstalled(package.display_name().to_string()))
    }

    fn package_commands(&self, package: ServiceKind) -> CoreResult<&PackageCommands> {
        self.stack.packages.get(&package).ok_or_else(|| {
            CoreError::UnsupportedAction(format!(
                "{} does not manage {} through a package manager",
                self.stack.name,
                package.display_name()
            ))
        })
    }

    async fn run_package_command(
        &self,
        package: ServiceKind,
        version: &str,
        operation: &str,
        template: &CommandTemplate,
        log_tx: Option<broadcast::Sender<LogLine>>,
    ) -> CoreResult<()> {
        let vars = TemplateVars::for_version(package, version)?;
        let (program, args) = template.render(&vars);
        let options = template.env.iter().fold(
            ExecOptions::with_timeout(self.install_timeout)
                .elevated(template.elevated)
                .stream_to(log_tx),
            |options, (key, value)| options.with_env(key.as_str(), value.as_str()),
        );

        info!(
            package = %package,
            version = %version,
            operation = %operation,
            program = %program,
            "Running package manager"
        );

        let output = self.executor.execute(&program, &args, &options).await?;
        if !output.success() {
            warn!(
                package = %package,
                version = %version,
                operation = %operation,
                exit_code = ?output.exit_code,
                "Package manager command failed"
            );
            return Err(CoreError::PackageCommandFailed {
                package: package.display_name().to_string(),
                version: version.to_string(),
                operation: operation.to_string(),
                exit_code: output.exit_code,
                stderr: output.error_detail(),
            });
        }
        Ok(())
    }

    async fn probe_single(&self, package: ServiceKind, binary: &Path) -> Vec<PackageVersion> {
        if !tokio::fs::try_exists(binary).await.unwrap_or(false) {
            return Vec::new();
        }
        let Some(version) = self
            .probe_binary(package, &binary.display().to_string())
            .await
        else {
            return Vec::new();
        };
        let install_path = binary.parent().unwrap_or(binary).to_path_buf();
        PackageVersion::parse(&version)
            .map(|v| vec![v.installed_at(install_path)])
            .unwrap_or_default()
    }

    /// 运行 `<binary> -v` 并解析版本，失败返回 None
    async fn probe_binary(&self, package: ServiceKind, binary: &str) -> Option<String> {
        let args = vec![version_flag(package).to_string()];
        let options = ExecOptions::with_timeout(Duration::from_secs(VERSION_PROBE_TIMEOUT_SECS));

        match self.executor.execute(binary, &args, &options).await {
            Ok(output) if output.success() => {
                parse_version_output(package, &format!("{}\n{}", output.stdout, output.stderr))
            }
            Ok(output) => {
                debug!(binary = %binary, exit_code = ?output.exit_code, "Version probe exited non-zero");
                None
            }
            Err(e) => {
                debug!(binary = %binary, error = %e, "Version probe failed");
                None
            }
        }
    }
}

fn version_flag(package: ServiceKind) -> &'static str {
    match package {
        ServiceKind::Php | ServiceKind::Apache => "-v",
        ServiceKind::Mysql => "--version",
    }
}

fn version_patterns(package: ServiceKind) -> &'static [Regex] {
    static PHP: OnceLock<Vec<Regex>> = OnceLock::new();
    static APACHE: OnceLock<Vec<Regex>> = OnceLock::new();
    static MYSQL: OnceLock<Vec<Regex>> = OnceLock::new();

    let (cell, sources): (&OnceLock<Vec<Regex>>, &[&str]) = match package {
        ServiceKind::Php => (&PHP, &[r"PHP (\d+\.\d+\.\d+)"]),
        ServiceKind::Apache => (&APACHE, &[r"Apache/(\d+\.\d+\.\d+)"]),
        // MariaDB 客户端输出 `Ver 15.1 Distrib 10.11.6-MariaDB`
        ServiceKind::Mysql => (&MYSQL, &[r"Distrib (\d+\.\d+\.\d+)", r"Ver (\d+\.\d+\.\d+)"]),
    };
    cell.get_or_init(|| {
        sources
            .iter()
            .map(|source| Regex::new(source).expect("version pattern is valid"))
            .collect()
    })
}

/// 从 `-v` / `--version` 输出中提取 `X.Y.Z`
pub fn parse_version_output(package: ServiceKind, output: &str) -> Option<String> {
    version_patterns(package)
        .iter()
        .find_map(|re| re.captures(output))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// windows.php.net 的 NTS x64 压缩包
fn windows_php_download_url(version: &PackageVersion) -> String {
    let toolset = match (version.major, version.minor) {
        (major, minor) if major > 8 || (major == 8 && minor >= 4) => "vs17",
        (8, _) => "vs16",
        _ => "vc15",
    };
    format!(
        "https://windows.php.net/downloads/releases/archives/php-{}-nts-Win32-{}-x64.zip",
        version.version, toolset
    )
}

/// 目录项（NotFound 视为空）
async fn dir_entries(dir: &Path) -> Vec<(String, PathBuf)> {
    let mut entries = Vec::new();
    let mut reader = match tokio::fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "Failed to scan install directory");
            }
            return entries;
        }
    };
    while let Ok(Some(entry)) = reader.next_entry().await {
        if let Some(name) = entry.file_name().to_str() {
            entries.push((name.to_string(), entry.path()));
        }
    }
    entries
}

/// `<root>/php@8.2/8.2.26_1` → 8.2.26
async fn scan_cellar(root: &Path, formula: &str) -> Vec<PackageVersion> {
    let versioned = format!("{}@", formula);
    let mut versions = Vec::new();
    for (name, keg) in dir_entries(root).await {
        if name != formula && !name.starts_with(&versioned) {
            continue;
        }
        for (version_dir, path) in dir_entries(&keg).await {
            let bare = version_dir.split('_').next().unwrap_or(&version_dir);
            if let Some(version) = PackageVersion::parse(bare) {
                versions.push(version.installed_at(path));
            }
        }
    }
    versions
}

/// `<dir>/php8.2` → 8.2
async fn scan_versioned_binaries(dir: &Path, prefix: &str) -> Vec<PackageVersion> {
    let Ok(pattern) = Regex::new(&format!(r"^{}(\d+\.\d+)$", regex::escape(prefix))) else {
        return Vec::new();
    };
    dir_entries(dir)
        .await
        .into_iter()
        .filter_map(|(name, path)| {
            let caps = pattern.captures(&name)?;
            PackageVersion::parse(caps.get(1)?.as_str()).map(|v| v.installed_at(path))
        })
        .collect()
}

/// `<dir>/php8.3.0`、`<dir>/php-8.3.0-nts-Win32-vs16-x64` → 8.3.0
async fn scan_version_dirs(dir: &Path, prefix: &str) -> Vec<PackageVersion> {
    let Ok(pattern) = Regex::new(&format!(r"^{}(\d+\.\d+(?:\.\d+)?)", regex::escape(prefix))) else {
        return Vec::new();
    };
    let mut versions = Vec::new();
    for (name, path) in dir_entries(dir).await {
        if !tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
            continue;
        }
        let parsed = pattern
            .captures(&name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| PackageVersion::parse(m.as_str()));
        if let Some(version) = parsed {
            versions.push(version.installed_at(path));
        }
    }
    versions
}
