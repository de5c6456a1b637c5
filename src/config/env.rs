//! 环境变量配置加载

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// 运行配置
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// 数据目录（hosts.json、settings.json、ssl 证书）
    pub data_dir: PathBuf,
    /// 栈标识，未设置时读取 settings.json
    pub stack: Option<String>,
    /// 覆盖系统 hosts 文件路径
    pub hosts_file: Option<PathBuf>,
    /// 覆盖生成的 vhost 配置文件路径
    pub vhost_file: Option<PathBuf>,
    /// 证书目录，未设置时读取 settings.json，再回退到 `<data>/ssl`
    pub ssl_dir: Option<PathBuf>,
    /// 服务状态轮询间隔
    pub poll_interval: Duration,
    /// 普通命令超时
    pub command_timeout: Duration,
    /// 安装 / 卸载超时
    pub install_timeout: Duration,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源加载
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let seconds = |key: &str, default: u64| {
            let value = non_empty(key);
            match value.as_deref().map(str::parse::<u64>) {
                Some(Ok(secs)) if secs > 0 => Duration::from_secs(secs),
                Some(_) => {
                    warn!(key, value = ?value, default, "Invalid duration, using default");
                    Duration::from_secs(default)
                }
                None => Duration::from_secs(default),
            }
        };

        let data_dir = non_empty("LHM_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir(&lookup));

        Self {
            data_dir,
            stack: non_empty("LHM_STACK"),
            hosts_file: non_empty("LHM_HOSTS_FILE").map(PathBuf::from),
            vhost_file: non_empty("LHM_VHOST_FILE").map(PathBuf::from),
            ssl_dir: non_empty("LHM_SSL_DIR").map(PathBuf::from),
            poll_interval: seconds("LHM_POLL_INTERVAL_SECS", constants::POLL_INTERVAL_SECS),
            command_timeout: seconds("LHM_COMMAND_TIMEOUT_SECS", constants::COMMAND_TIMEOUT_SECS),
            install_timeout: seconds("LHM_INSTALL_TIMEOUT_SECS", constants::INSTALL_TIMEOUT_SECS),
        }
    }

    pub fn conf_dir(&self) -> PathBuf {
        self.data_dir.join("conf")
    }

    /// 虚拟主机存储
    pub fn hosts_json(&self) -> PathBuf {
        self.conf_dir().join("hosts.json")
    }

    pub fn settings_json(&self) -> PathBuf {
        self.conf_dir().join("settings.json")
    }

    /// 提权复制前的暂存目录
    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join("staging")
    }

    pub fn default_ssl_dir(&self) -> PathBuf {
        self.data_dir.join("ssl")
    }
}

/// `~/localhost-manager`
fn default_data_dir(lookup: &impl Fn(&str) -> Option<String>) -> PathBuf {
    let home = load_with_fallback(lookup, "HOME", "USERPROFILE").unwrap_or_else(|| {
        if cfg!(windows) {
            "C:\\Users\\Default".to_string()
        } else {
            "/tmp".to_string()
        }
    });
    PathBuf::from(home).join(constants::DATA_DIR_NAME)
}

/// 加载环境变量，支持 fallback
fn load_with_fallback(
    lookup: &impl Fn(&str) -> Option<String>,
    primary: &str,
    fallback: &str,
) -> Option<String> {
    lookup(primary).or_else(|| lookup(fallback))
}

/// 常量
pub mod constants {
    /// 数据目录名
    pub const DATA_DIR_NAME: &str = "localhost-manager";

    /// 服务状态轮询间隔（秒）
    pub const POLL_INTERVAL_SECS: u64 = 5;

    /// 服务控制命令超时（秒）
    pub const COMMAND_TIMEOUT_SECS: u64 = 120;

    /// 包安装超时（秒）
    pub const INSTALL_TIMEOUT_SECS: u64 = 1800; // 30 分钟

    /// 读取版本号的超时（秒）
    pub const VERSION_PROBE_TIMEOUT_SECS: u64 = 10;

    /// 默认栈
    pub const DEFAULT_STACK: &str = "native";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("HOME", "/home/dev")]);

        assert_eq!(config.data_dir, PathBuf::from("/home/dev/localhost-manager"));
        assert_eq!(
            config.hosts_json(),
            PathBuf::from("/home/dev/localhost-manager/conf/hosts.json")
        );
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.command_timeout, Duration::from_secs(120));
        assert_eq!(config.install_timeout, Duration::from_secs(1800));
        assert!(config.stack.is_none());
    }

    #[test]
    fn test_userprofile_fallback() {
        let config = config_from(&[("USERPROFILE", "/users/dev")]);
        assert_eq!(config.data_dir, PathBuf::from("/users/dev/localhost-manager"));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("LHM_HOME", "/srv/lhm"),
            ("LHM_STACK", "xampp"),
            ("LHM_HOSTS_FILE", "/tmp/hosts"),
            ("LHM_POLL_INTERVAL_SECS", "2"),
            ("LHM_COMMAND_TIMEOUT_SECS", "not-a-number"),
            ("LHM_VHOST_FILE", ""),
        ]);

        assert_eq!(config.data_dir, PathBuf::from("/srv/lhm"));
        assert_eq!(config.stack.as_deref(), Some("xampp"));
        assert_eq!(config.hosts_file, Some(PathBuf::from("/tmp/hosts")));
        assert_eq!(config.vhost_file, None);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.command_timeout, Duration::from_secs(120));
        assert_eq!(config.staging_dir(), PathBuf::from("/srv/lhm/staging"));
    }
}
