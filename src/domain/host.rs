//! 虚拟主机模型
//!
//! `HostMap` 以域名为键、按键排序（BTreeMap），因此生成器输出只取决于内容本身。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// 默认分组
pub const DEFAULT_GROUP: &str = "Uncategorized";
/// 默认运行时
pub const DEFAULT_HOST_TYPE: &str = "static";

/// 域名 → 虚拟主机
pub type HostMap = BTreeMap<String, VirtualHost>;

/// 主机别名
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAlias {
    pub id: String,
    pub value: String,
    pub active: bool,
}

impl HostAlias {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            id: new_alias_id(),
            value: value.into(),
            active: true,
        }
    }
}

pub fn new_alias_id() -> String {
    format!("alias_{}", Uuid::new_v4())
}

/// 虚拟主机定义
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualHost {
    pub domain: String,
    pub docroot: String,
    #[serde(default)]
    pub aliases: Vec<HostAlias>,
    /// 仅 UI 分组用，不影响生成的配置
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub ssl: bool,
    #[serde(rename = "type", default = "default_host_type")]
    pub host_type: String,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

fn default_host_type() -> String {
    DEFAULT_HOST_TYPE.to_string()
}

fn default_true() -> bool {
    true
}

impl VirtualHost {
    pub fn new(domain: impl Into<String>, docroot: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            docroot: docroot.into(),
            aliases: Vec::new(),
            group: default_group(),
            active: true,
            ssl: true,
            host_type: default_host_type(),
        }
    }

    pub fn with_type(mut self, host_type: impl Into<String>) -> Self {
        self.host_type = host_type.into();
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn with_alias(mut self, value: impl Into<String>) -> Self {
        self.aliases.push(HostAlias::new(value));
        self
    }

    /// 启用中的别名值（保持原顺序）
    pub fn active_aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases
            .iter()
            .filter(|a| a.active)
            .map(|a| a.value.as_str())
    }

    /// 生成配置前的校验，返回解析后的运行时
    pub fn validate_for_generation(&self) -> CoreResult<RuntimeSelector> {
        if self.domain.trim().is_empty() {
            return Err(CoreError::generation(&self.domain, "domain is empty"));
        }
        if !is_dns_safe(&self.domain) {
            return Err(CoreError::generation(
                &self.domain,
                "domain is not a valid DNS name",
            ));
        }
        if self.docroot.trim().is_empty() {
            return Err(CoreError::generation(&self.domain, "document root is empty"));
        }
        if self.docroot.contains(['"', '\n', '\r']) {
            return Err(CoreError::generation(
                &self.domain,
                "document root contains a quote or line break",
            ));
        }
        for alias in self.active_aliases() {
            if !is_dns_safe(alias) {
                return Err(CoreError::generation(
                    &self.domain,
                    format!("alias '{}' is not a valid DNS name", alias),
                ));
            }
        }
        RuntimeSelector::parse(&self.host_type).ok_or_else(|| {
            CoreError::generation(
                &self.domain,
                format!("unknown runtime type '{}'", self.host_type),
            )
        })
    }
}

/// host 的运行时选择
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuntimeSelector {
    Static,
    /// `version` 为 None 时使用当前激活的 PHP
    Php { version: Option<String> },
}

impl RuntimeSelector {
    /// 接受 `static`、`php`、`php8.2`、`php-8.2`、`php@8.2`
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_ascii_lowercase();
        if raw.is_empty() || raw == "static" {
            return Some(RuntimeSelector::Static);
        }
        let rest = raw.strip_prefix("php")?;
        if rest.is_empty() {
            return Some(RuntimeSelector::Php { version: None });
        }
        let version = rest
            .strip_prefix('-')
            .or_else(|| rest.strip_prefix('@'))
            .unwrap_or(rest);
        let mut parts = version.split('.');
        let valid = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(major), Some(minor), None)
                if !major.is_empty()
                    && !minor.is_empty()
                    && major.chars().all(|c| c.is_ascii_digit())
                    && minor.chars().all(|c| c.is_ascii_digit())
        );
        valid.then(|| RuntimeSelector::Php {
            version: Some(version.to_string()),
        })
    }
}

/// RFC 1123 主机名：标签 1-63 个字母数字或连字符，连字符不在首尾
pub fn is_dns_safe(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// 保存前的唯一性校验：键与域名一致，域名/别名互不冲突（大小写不敏感）
pub fn validate_host_map(hosts: &HostMap) -> CoreResult<()> {
    let mut owners: HashMap<String, &str> = HashMap::new();

    for (key, host) in hosts {
        if key != &host.domain {
            return Err(CoreError::InvalidHost(format!(
                "key '{}' does not match domain '{}'",
                key, host.domain
            )));
        }
        if let Some(owner) = owners.insert(host.domain.to_ascii_lowercase(), key) {
            return Err(CoreError::InvalidHost(format!(
                "domain '{}' is already used by '{}'",
                host.domain, owner
            )));
        }
    }

    for (key, host) in hosts {
        for alias in &host.aliases {
            let name = alias.value.to_ascii_lowercase();
            if name == host.domain.to_ascii_lowercase() {
                return Err(CoreError::InvalidHost(format!(
                    "alias '{}' repeats the domain of '{}'",
                    alias.value, key
                )));
            }
            if let Some(owner) = owners.insert(name, key) {
                return Err(CoreError::InvalidHost(format!(
                    "alias '{}' of '{}' collides with '{}'",
                    alias.value, key, owner
                )));
            }
        }
    }

    Ok(())
}
