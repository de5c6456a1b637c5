//! php.ini 读取与修改
//!
//! 解析规则：跳过空行、`;` 注释和 `[section]`，在第一个 `=` 处切分。
//! 修改只动匹配的那一行，其余内容（包括注释和换行风格）保持不变，
//! 写入使用临时文件 + 重命名。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::domain::package::{PackageVersion, PhpConfig, PhpExtension};
use crate::domain::service::ServiceKind;
use crate::domain::stack::{StackConfig, TemplateVars};
use crate::error::{CoreError, CoreResult};
use crate::infra::fs::{read_optional, write_atomic};

use super::packages::PackageBridge;

const DEVELOPMENT_INI: &str = "php.ini-development";

pub struct PhpIniManager {
    packages: Arc<PackageBridge>,
    stack: Arc<StackConfig>,
}

impl PhpIniManager {
    pub fn new(packages: Arc<PackageBridge>, stack: Arc<StackConfig>) -> Self {
        Self { packages, stack }
    }

    pub async fn get_config(&self, version: &str) -> CoreResult<PhpConfig> {
        let (installed, ini_path) = self.locate(version).await?;
        let content = read_optional(&ini_path)
            .await
            .map_err(|e| ini_error(&ini_path, e))?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();

        Ok(PhpConfig {
            version: installed.version,
            install_path: installed.install_path.unwrap_or_default(),
            php_ini_path: ini_path,
            settings: parse_settings(&content),
            extensions: parse_extensions(&content),
        })
    }

    pub async fn update_setting(&self, version: &str, key: &str, value: &str) -> CoreResult<()> {
        let key = key.trim();
        if key.is_empty() || key.contains(['=', ';', '\n', '\r']) || key.starts_with('[') {
            return Err(CoreError::InvalidArgument(format!(
                "'{}' is not a valid php.ini key",
                key
            )));
        }
        if value.contains(['\n', '\r']) {
            return Err(CoreError::InvalidArgument(
                "php.ini values cannot span lines".to_string(),
            ));
        }

        let (_, ini_path) = self.locate(version).await?;
        let content = read_ini(&ini_path).await?;
        write_ini(&ini_path, &set_value(&content, key, value.trim())).await?;

        info!(version = %version, key = %key, path = %ini_path.display(), "Updated php.ini setting");
        Ok(())
    }

    pub async fn toggle_extension(&self, version: &str, name: &str, enable: bool) -> CoreResult<()> {
        let normalized = extension_name(name);
        if name.contains(['/', '\\'])
            || normalized.is_empty()
            || !normalized.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(CoreError::InvalidArgument(format!(
                "'{}' is not a valid extension name",
                name
            )));
        }
        let name = normalized;

        let (_, ini_path) = self.locate(version).await?;
        let content = read_ini(&ini_path).await?;
        write_ini(&ini_path, &set_extension(&content, &name, enable)).await?;

        info!(version = %version, extension = %name, enable, "Toggled PHP extension");
        Ok(())
    }

    /// 已安装的版本与对应的 ini 路径；主 ini 不存在时退回 php.ini-development
    async fn locate(&self, version: &str) -> CoreResult<(PackageVersion, PathBuf)> {
        let installed = self
            .packages
            .list_installed(ServiceKind::Php)
            .await?
            .into_iter()
            .find(|v| v.matches(version))
            .ok_or_else(|| CoreError::VersionNotInstalled {
                package: ServiceKind::Php.display_name().to_string(),
                version: version.to_string(),
            })?;

        let mut vars = TemplateVars::for_version(ServiceKind::Php, &installed.version)?;
        if let Some(path) = &installed.install_path {
            vars = vars.with_install_path(path);
        }
        let mut ini_path = PathBuf::from(vars.substitute(&self.stack.php_ini));
        if !ini_path.exists() {
            let fallback = ini_path.with_file_name(DEVELOPMENT_INI);
            if fallback.exists() {
                ini_path = fallback;
            }
        }
        Ok((installed, ini_path))
    }
}

fn ini_error(path: &Path, detail: impl ToString) -> CoreError {
    CoreError::Ini {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

async fn read_ini(path: &Path) -> CoreResult<String> {
    match read_optional(path).await {
        Ok(Some(bytes)) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Ok(None) => Err(ini_error(path, "file not found")),
        Err(e) => Err(ini_error(path, e)),
    }
}

async fn write_ini(path: &Path, content: &str) -> CoreResult<()> {
    write_atomic(path, content)
        .await
        .map_err(|e| ini_error(path, e))
}

/// 生效中的 `key = value`
pub fn parse_settings(content: &str) -> BTreeMap<String, String> {
    let mut settings = BTreeMap::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('[') {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once('=') {
            settings.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    settings
}

/// `extension=` 行，注释掉的视为未启用；同名只保留一项，任一行启用即为启用
pub fn parse_extensions(content: &str) -> Vec<PhpExtension> {
    let mut extensions: Vec<PhpExtension> = Vec::new();
    for line in content.lines() {
        let Some((enabled, value)) = extension_line(line) else {
            continue;
        };
        let name = extension_name(value);
        if name.is_empty() {
            continue;
        }
        match extensions.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.enabled |= enabled,
            None => extensions.push(PhpExtension { name, enabled }),
        }
    }
    extensions
}

/// 修改或追加设置；未注释的同名行优先，其次启用被注释的那一行
pub fn set_value(content: &str, key: &str, value: &str) -> String {
    let replacement = format!("{} = {}", key, value);
    let mut lines: Vec<String> = content.lines().map(String::from).collect();

    let active = lines.iter().position(|l| setting_key(l) == Some((true, key)));
    let commented = || lines.iter().position(|l| setting_key(l) == Some((false, key)));

    match active.or_else(commented) {
        Some(index) => lines[index] = replacement,
        None => lines.push(replacement),
    }
    join_like(content, &lines)
}

pub fn set_extension(content: &str, name: &str, enable: bool) -> String {
    let mut lines: Vec<String> = content.lines().map(String::from).collect();
    let matches: Vec<(usize, bool)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, l)| {
            let (enabled, value) = extension_line(l)?;
            (extension_name(value) == name).then_some((i, enabled))
        })
        .collect();

    if enable {
        if matches.iter().any(|(_, enabled)| *enabled) {
            return content.to_string();
        }
        match matches.first() {
            Some((index, _)) => {
                let uncommented = lines[*index].trim_start().trim_start_matches(';').trim_start().to_string();
                lines[*index] = uncommented;
            }
            None => lines.push(format!("extension={}", name)),
        }
    } else {
        for (index, enabled) in matches {
            if enabled {
                lines[index] = format!(";{}", lines[index].trim_start());
            }
        }
    }
    join_like(content, &lines)
}

/// 返回 (是否生效, key)
fn setting_key(line: &str) -> Option<(bool, &str)> {
    let trimmed = line.trim_start();
    let (active, body) = match trimmed.strip_prefix(';') {
        Some(rest) => (false, rest.trim_start()),
        None => (true, trimmed),
    };
    let (key, _) = body.split_once('=')?;
    Some((active, key.trim()))
}

/// 返回 (是否生效, 原始值)
fn extension_line(line: &str) -> Option<(bool, &str)> {
    match setting_key(line)? {
        (active, "extension") => {
            let body = line.trim_start().trim_start_matches(';');
            let (_, value) = body.split_once('=')?;
            Some((active, value.trim()))
        }
        _ => None,
    }
}

/// `php_curl.dll` / `"curl.so"` / `curl` 都归一为 `curl`
fn extension_name(raw: &str) -> String {
    let raw = raw.trim().trim_matches('"').trim_matches('\'');
    let raw = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let raw = raw.strip_prefix("php_").unwrap_or(raw);
    let raw = raw
        .strip_suffix(".dll")
        .or_else(|| raw.strip_suffix(".so"))
        .unwrap_or(raw);
    raw.to_string()
}

fn join_like(original: &str, lines: &[String]) -> String {
    let newline = if original.contains("\r\n") { "\r\n" } else { "\n" };
    let mut out = lines.join(newline);
    if original.is_empty() || original.ends_with('\n') || lines.len() > original.lines().count() {
        out.push_str(newline);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::platform::Platform;
    use crate::domain::stack::InstallLayout;
    use crate::infra::command::fake::ScriptedExecutor;
    use std::time::Duration;

    const SAMPLE: &str = "[PHP]\n; memory_limit = 64M\nmemory_limit = 128M\nupload_max_filesize=2M\n;display_errors = On\n\n[extensions]\nextension=curl\n;extension=php_gd.dll\nextension=\"mbstring.so\"\n;extension=curl\n";

    fn manager(dir: &Path) -> PhpIniManager {
        let mut stack = StackConfig::lookup("native", Platform::Linux).unwrap();
        stack.layouts.insert(
            ServiceKind::Php,
            InstallLayout::VersionedBinaries {
                dir: dir.join("bin"),
                prefix: "php".to_string(),
            },
        );
        stack.php_ini = format!("{}/etc/{{major_minor}}/php.ini", dir.display());
        let stack = Arc::new(stack);
        let packages = Arc::new(PackageBridge::new(
            Arc::new(ScriptedExecutor::succeeding()),
            stack.clone(),
            Duration::from_secs(60),
        ));
        PhpIniManager::new(packages, stack)
    }

    fn install(dir: &Path, major_minor: &str, ini_name: &str, content: &str) -> PathBuf {
        std::fs::create_dir_all(dir.join("bin")).unwrap();
        std::fs::write(dir.join("bin").join(format!("php{}", major_minor)), "").unwrap();
        let etc = dir.join("etc").join(major_minor);
        std::fs::create_dir_all(&etc).unwrap();
        let path = etc.join(ini_name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_settings_and_extensions() {
        let settings = parse_settings(SAMPLE);
        assert_eq!(settings["memory_limit"], "128M");
        assert_eq!(settings["upload_max_filesize"], "2M");
        assert!(!settings.contains_key("display_errors"));

        let extensions = parse_extensions(SAMPLE);
        assert_eq!(
            extensions,
            vec![
                PhpExtension { name: "curl".into(), enabled: true },
                PhpExtension { name: "gd".into(), enabled: false },
                PhpExtension { name: "mbstring".into(), enabled: true },
            ]
        );
    }

    #[test]
    fn test_set_value_prefers_active_line() {
        let updated = set_value(SAMPLE, "memory_limit", "512M");
        assert!(updated.contains("; memory_limit = 64M\nmemory_limit = 512M\n"));

        let enabled = set_value(SAMPLE, "display_errors", "Off");
        assert!(enabled.contains("\ndisplay_errors = Off\n"));
        assert!(!enabled.contains(";display_errors"));

        let appended = set_value(SAMPLE, "max_execution_time", "60");
        assert!(appended.ends_with(";extension=curl\nmax_execution_time = 60\n"));
    }

    #[test]
    fn test_set_value_matches_exact_key() {
        let content = "session.gc_maxlifetime = 1440\nsession.gc = 1\n";
        let updated = set_value(content, "session.gc", "5");
        assert_eq!(updated, "session.gc_maxlifetime = 1440\nsession.gc = 5\n");
    }

    #[test]
    fn test_set_extension() {
        let enabled = set_extension(SAMPLE, "gd", true);
        assert!(enabled.contains("\nextension=php_gd.dll\n"));

        let disabled = set_extension(SAMPLE, "curl", false);
        assert!(disabled.contains("\n;extension=curl\n;extension=php_gd.dll"));
        assert!(!parse_extensions(&disabled)
            .iter()
            .any(|e| e.name == "curl" && e.enabled));

        let added = set_extension(SAMPLE, "intl", true);
        assert!(added.ends_with("extension=intl\n"));

        assert_eq!(set_extension(SAMPLE, "curl", true), SAMPLE);
        assert_eq!(set_extension(SAMPLE, "intl", false), SAMPLE);
    }

    #[tokio::test]
    async fn test_get_config_falls_back_to_development_ini() {
        let dir = tempfile::tempdir().unwrap();
        let ini = install(dir.path(), "8.2", DEVELOPMENT_INI, SAMPLE);

        let config = manager(dir.path()).get_config("8.2").await.unwrap();

        assert_eq!(config.version, "8.2");
        assert_eq!(config.php_ini_path, ini);
        assert_eq!(config.install_path, dir.path().join("bin").join("php8.2"));
        assert_eq!(config.settings["memory_limit"], "128M");
        assert_eq!(config.extensions.len(), 3);
    }

    #[tokio::test]
    async fn test_update_setting_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let ini = install(dir.path(), "8.3", "php.ini", SAMPLE);
        let manager = manager(dir.path());

        manager.update_setting("8.3", "memory_limit", "256M").await.unwrap();
        manager.toggle_extension("8.3", "php_gd.dll", true).await.unwrap();

        let config = manager.get_config("8.3").await.unwrap();
        assert_eq!(config.settings["memory_limit"], "256M");
        assert!(config.extensions.iter().any(|e| e.name == "gd" && e.enabled));
        assert!(std::fs::read_to_string(ini).unwrap().contains("; memory_limit = 64M"));
    }

    #[tokio::test]
    async fn test_unknown_version_and_bad_key() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path(), "8.3", "php.ini", SAMPLE);
        let manager = manager(dir.path());

        assert!(matches!(
            manager.get_config("7.4").await,
            Err(CoreError::VersionNotInstalled { .. })
        ));
        assert!(matches!(
            manager.update_setting("8.3", "a=b", "1").await,
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            manager.toggle_extension("8.3", "../evil", true).await,
            Err(CoreError::InvalidArgument(_))
        ));
    }
}
