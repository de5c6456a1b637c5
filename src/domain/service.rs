//! 受管服务与服务状态

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// 受管服务（同时也是包管理的包标识）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Apache,
    Mysql,
    Php,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [ServiceKind::Apache, ServiceKind::Mysql, ServiceKind::Php];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Apache => "apache",
            ServiceKind::Mysql => "mysql",
            ServiceKind::Php => "php",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceKind::Apache => "Apache",
            ServiceKind::Mysql => "MySQL",
            ServiceKind::Php => "PHP",
        }
    }

    /// 只有 PHP 与 Apache 支持多版本切换
    pub fn supports_switch(&self) -> bool {
        matches!(self, ServiceKind::Apache | ServiceKind::Php)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apache" | "httpd" | "apache2" => Ok(ServiceKind::Apache),
            "mysql" | "mysqld" => Ok(ServiceKind::Mysql),
            "php" => Ok(ServiceKind::Php),
            _ => Err(CoreError::UnknownService(s.to_string())),
        }
    }
}

/// 服务控制动作
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Switch,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
            ServiceAction::Switch => "switch",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            ServiceAction::Start => "started",
            ServiceAction::Stop => "stopped",
            ServiceAction::Restart => "restarted",
            ServiceAction::Switch => "switched",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(ServiceAction::Start),
            "stop" => Ok(ServiceAction::Stop),
            "restart" => Ok(ServiceAction::Restart),
            "switch" => Ok(ServiceAction::Switch),
            other => Err(CoreError::UnsupportedAction(format!(
                "Unknown service action '{}'",
                other
            ))),
        }
    }
}

/// 进程表探测结果
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicesStatus {
    pub apache: bool,
    pub mysql: bool,
    pub php: bool,
    /// 三者全部运行
    pub all_running: bool,
}

impl ServicesStatus {
    pub fn new(apache: bool, mysql: bool, php: bool) -> Self {
        Self {
            apache,
            mysql,
            php,
            all_running: apache && mysql && php,
        }
    }

    pub fn is_running(&self, service: ServiceKind) -> bool {
        match service {
            ServiceKind::Apache => self.apache,
            ServiceKind::Mysql => self.mysql,
            ServiceKind::Php => self.php,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_aliases() {
        assert_eq!("httpd".parse::<ServiceKind>().unwrap(), ServiceKind::Apache);
        assert_eq!("MySQL".parse::<ServiceKind>().unwrap(), ServiceKind::Mysql);
        assert!(matches!(
            "nginx".parse::<ServiceKind>(),
            Err(CoreError::UnknownService(name)) if name == "nginx"
        ));
    }

    #[test]
    fn test_unknown_action_is_unsupported() {
        assert!(matches!(
            "reload".parse::<ServiceAction>(),
            Err(CoreError::UnsupportedAction(_))
        ));
    }

    #[test]
    fn test_all_running_derived() {
        assert!(ServicesStatus::new(true, true, true).all_running);
        assert!(!ServicesStatus::new(true, false, true).all_running);
        assert!(ServicesStatus::new(true, false, true).is_running(ServiceKind::Php));
    }
}
