//! 运行平台

use serde::{Deserialize, Serialize};

/// 支持的宿主操作系统
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(rename = "macos")]
    MacOs,
    Linux,
    Windows,
}

impl Platform {
    /// 编译目标对应的平台
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::MacOs => "macOS",
            Platform::Linux => "Linux",
            Platform::Windows => "Windows",
        }
    }

    pub fn package_manager(&self) -> &'static str {
        match self {
            Platform::MacOs => "Homebrew",
            Platform::Linux => "apt",
            Platform::Windows => "Chocolatey",
        }
    }
}

/// 平台信息（UI 展示用）
#[derive(Clone, Debug, Serialize)]
pub struct PlatformInfo {
    pub platform: Platform,
    pub name: String,
    pub package_manager: String,
    pub arch: String,
    /// 例如 "Linux (Ubuntu 24.04)"，取不到时为空
    pub os_version: Option<String>,
}

impl PlatformInfo {
    pub fn detect() -> Self {
        let platform = Platform::current();
        Self {
            platform,
            name: platform.name().to_string(),
            package_manager: platform.package_manager().to_string(),
            arch: std::env::consts::ARCH.to_string(),
            os_version: sysinfo::System::long_os_version(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Platform::MacOs).unwrap(), "\"macos\"");
        assert_eq!(serde_json::to_string(&Platform::Windows).unwrap(), "\"windows\"");
    }

    #[test]
    fn test_detect_matches_current() {
        let info = PlatformInfo::detect();
        assert_eq!(info.platform, Platform::current());
        assert_eq!(info.name, Platform::current().name());
    }
}
