//! 调用方持有的 host 表工作副本
//!
//! 流程：open（加载，必要时写回迁移结果）→ 修改 → persist。
//! 重命名和删除只修改表本身，不会重新生成或应用服务器配置。

use tracing::{info, warn};

use crate::domain::host::{is_dns_safe, validate_host_map, HostMap, VirtualHost};
use crate::error::{CoreError, CoreResult};

use super::host_store::HostStore;

#[derive(Clone, Debug, Default)]
pub struct HostSession {
    hosts: HostMap,
    dirty: bool,
}

impl HostSession {
    /// 加载 host 表；旧格式只迁移一次并立即写回
    pub async fn open(store: &HostStore) -> CoreResult<Self> {
        let loaded = store.load().await?;
        if loaded.migrated {
            if let Err(e) = validate_host_map(&loaded.hosts) {
                warn!(path = %store.path().display(), error = %e, "Migrated host table has conflicts");
            }
            store.save_migrated(&loaded.hosts).await?;
        }
        Ok(Self::from_map(loaded.hosts))
    }

    pub fn from_map(hosts: HostMap) -> Self {
        Self {
            hosts,
            dirty: false,
        }
    }

    pub fn hosts(&self) -> &HostMap {
        &self.hosts
    }

    pub fn into_hosts(self) -> HostMap {
        self.hosts
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// 新增或替换一个 host，冲突时保持原状
    pub fn upsert(&mut self, host: VirtualHost) -> CoreResult<()> {
        if !is_dns_safe(&host.domain) {
            return Err(CoreError::InvalidHost(format!(
                "'{}' is not a valid domain name",
                host.domain
            )));
        }
        let mut candidate = self.hosts.clone();
        candidate.insert(host.domain.clone(), host);
        validate_host_map(&candidate)?;
        self.hosts = candidate;
        self.dirty = true;
        Ok(())
    }

    pub fn remove(&mut self, domain: &str) -> CoreResult<VirtualHost> {
        let removed = self
            .hosts
            .remove(domain)
            .ok_or_else(|| CoreError::HostNotFound(domain.to_string()))?;
        self.dirty = true;
        Ok(removed)
    }

    /// 修改域名，别名与其它字段保持不变
    pub fn rename(&mut self, old: &str, new: &str) -> CoreResult<()> {
        if old == new {
            return Ok(());
        }
        if !self.hosts.contains_key(old) {
            return Err(CoreError::HostNotFound(old.to_string()));
        }
        if !is_dns_safe(new) {
            return Err(CoreError::InvalidHost(format!(
                "'{}' is not a valid domain name",
                new
            )));
        }
        if self.hosts.contains_key(new) {
            return Err(CoreError::InvalidHost(format!("'{}' already exists", new)));
        }

        let mut candidate = self.hosts.clone();
        if let Some(mut host) = candidate.remove(old) {
            host.domain = new.to_string();
            candidate.insert(new.to_string(), host);
        }
        validate_host_map(&candidate)?;

        self.hosts = candidate;
        self.dirty = true;
        info!(from = %old, to = %new, "Renamed virtual host");
        Ok(())
    }

    /// 写回（整体覆盖）
    pub async fn persist(&mut self, store: &HostStore) -> CoreResult<()> {
        store.save(&self.hosts).await?;
        self.dirty = false;
        Ok(())
    }
}
