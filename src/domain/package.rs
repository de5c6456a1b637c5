//! 包版本与 PHP 配置模型

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 可安装 / 已安装的包版本
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersion {
    pub version: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_path: Option<PathBuf>,
    /// Windows 二进制压缩包地址
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl PackageVersion {
    /// 解析 `X.Y[.Z]`，其它形式返回 None
    pub fn parse(version: &str) -> Option<Self> {
        let mut parts = version.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            version: version.trim().to_string(),
            major,
            minor,
            patch,
            installed: false,
            install_path: None,
            download_url: None,
        })
    }

    pub fn installed_at(mut self, path: impl Into<PathBuf>) -> Self {
        self.installed = true;
        self.install_path = Some(path.into());
        self
    }

    pub fn major_minor(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    /// 版本号只给出 `X.Y` 时按 major.minor 匹配，否则要求完全一致
    pub fn matches(&self, requested: &str) -> bool {
        let requested = requested.trim();
        if self.version == requested {
            return true;
        }
        let Some(other) = PackageVersion::parse(requested) else {
            return false;
        };
        let loose = self.version.matches('.').count() == 1 || requested.matches('.').count() == 1;
        loose && self.major == other.major && self.minor == other.minor
    }

    fn sort_key(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }
}

/// 新版本在前
pub fn sort_newest_first(versions: &mut [PackageVersion]) {
    versions.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
}

/// PHP 扩展启用状态
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhpExtension {
    pub name: String,
    pub enabled: bool,
}

/// 某个 PHP 版本的 ini 配置视图
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhpConfig {
    pub version: String,
    pub install_path: PathBuf,
    pub php_ini_path: PathBuf,
    /// 生效中的（未注释的）设置
    pub settings: BTreeMap<String, String>,
    pub extensions: Vec<PhpExtension>,
}

/// 本地 Web 栈探测结果
#[derive(Clone, Debug, Serialize)]
pub struct DetectedStack {
    pub key: String,
    pub name: String,
    pub path: PathBuf,
    pub detected: bool,
}
