//! 虚拟主机接口
//!
//! 增删改只修改 hosts.json；`generate_configs` 才会生成并应用服务器配置。

use tracing::info;

use crate::domain::host::{HostMap, VirtualHost};
use crate::error::CoreResult;
use crate::services::{apply::ApplyResult, vhost};
use crate::state::HostSession;

use super::Api;

impl Api {
    /// 读取 host 表，旧格式会被迁移并写回一次
    pub async fn get_virtual_hosts(&self) -> CoreResult<HostMap> {
        Ok(HostSession::open(&self.state.host_store).await?.into_hosts())
    }

    /// 整体覆盖，不合并
    pub async fn save_virtual_hosts(&self, hosts: &HostMap) -> CoreResult<()> {
        self.state.host_store.save(hosts).await
    }

    pub async fn add_host(&self, host: VirtualHost) -> CoreResult<()> {
        let mut session = HostSession::open(&self.state.host_store).await?;
        session.upsert(host)?;
        session.persist(&self.state.host_store).await
    }

    pub async fn delete_host(&self, domain: &str) -> CoreResult<()> {
        self.state.host_store.delete(domain).await
    }

    pub async fn rename_host(&self, old: &str, new: &str) -> CoreResult<()> {
        let mut session = HostSession::open(&self.state.host_store).await?;
        session.rename(old, new)?;
        if session.is_dirty() {
            session.persist(&self.state.host_store).await?;
        }
        Ok(())
    }

    /// 生成并应用，返回给 UI 的一句话结果
    pub async fn generate_configs(&self) -> CoreResult<String> {
        Ok(self.apply_configs().await?.summary())
    }

    pub async fn apply_configs(&self) -> CoreResult<ApplyResult> {
        let hosts = self.get_virtual_hosts().await?;
        let artifacts = vhost::generate(&hosts, &self.state.stack, &self.state.ssl_dir)?;
        let result = self.state.applier.apply(&artifacts).await?;
        info!(
            written = result.written.len(),
            restarted = result.restarted,
            "Applied server configuration"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::test_api;
    use crate::error::CoreError;

    #[tokio::test]
    async fn test_deleted_domain_absent_from_store_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let (api, executor) = test_api(dir.path());

        api.add_host(VirtualHost::new("a.test", "/www/a").with_ssl(false))
            .await
            .unwrap();
        api.add_host(VirtualHost::new("b.test", "/www/b")).await.unwrap();
        api.generate_configs().await.unwrap();

        api.delete_host("a.test").await.unwrap();
        let vhosts_before = std::fs::read_to_string(dir.path().join("vhosts.conf")).unwrap();
        assert!(vhosts_before.contains("a.test"));

        let summary = api.generate_configs().await.unwrap();
        assert!(summary.starts_with("Wrote 2 configuration file(s)"));

        assert!(!api.get_virtual_hosts().await.unwrap().contains_key("a.test"));
        let vhosts = std::fs::read_to_string(dir.path().join("vhosts.conf")).unwrap();
        let hosts = std::fs::read_to_string(dir.path().join("hosts")).unwrap();
        assert!(!vhosts.contains("a.test"));
        assert!(!hosts.contains("a.test"));
        assert!(hosts.contains("127.0.0.1 b.test"));
        assert_eq!(executor.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_delete_and_rename_do_not_touch_server_config() {
        let dir = tempfile::tempdir().unwrap();
        let (api, executor) = test_api(dir.path());

        api.add_host(VirtualHost::new("a.test", "/www/a")).await.unwrap();
        api.rename_host("a.test", "app.test").await.unwrap();
        assert!(api.get_virtual_hosts().await.unwrap().contains_key("app.test"));

        api.delete_host("app.test").await.unwrap();
        assert!(matches!(
            api.delete_host("app.test").await,
            Err(CoreError::HostNotFound(_))
        ));

        assert!(!dir.path().join("vhosts.conf").exists());
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_save_is_full_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let (api, _) = test_api(dir.path());
        api.add_host(VirtualHost::new("a.test", "/www/a")).await.unwrap();

        let mut replacement = HostMap::new();
        replacement.insert("c.test".into(), VirtualHost::new("c.test", "/www/c"));
        api.save_virtual_hosts(&replacement).await.unwrap();

        let hosts = api.get_virtual_hosts().await.unwrap();
        assert_eq!(hosts.keys().collect::<Vec<_>>(), vec!["c.test"]);
    }
}
