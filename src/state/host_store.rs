//! 虚拟主机持久化
//!
//! `<data>/conf/hosts.json` 以域名为键保存整张 host 表。保存是整体覆盖（不合并），
//! 调用方负责 读取-修改-写回。加载时兼容旧格式的别名并报告是否发生了迁移。

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::domain::host::{
    new_alias_id, validate_host_map, HostAlias, HostMap, VirtualHost, DEFAULT_GROUP,
    DEFAULT_HOST_TYPE,
};
use crate::error::{CoreError, CoreResult};
use crate::infra::fs::{read_optional, write_atomic};

/// 加载结果
#[derive(Clone, Debug, Default)]
pub struct LoadedHosts {
    pub hosts: HostMap,
    /// 旧格式被规范化，调用方应写回一次
    pub migrated: bool,
}

/// hosts.json 存储
#[derive(Clone, Debug)]
pub struct HostStore {
    path: PathBuf,
}

impl HostStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 文件不存在时返回空表
    pub async fn load(&self) -> CoreResult<LoadedHosts> {
        let Some(raw) = self.read_raw().await? else {
            return Ok(LoadedHosts::default());
        };
        let (hosts, migrated) = normalize_host_map(raw)
            .map_err(|detail| CoreError::store("Failed to parse hosts file", &self.path, detail))?;

        if migrated {
            info!(path = %self.path.display(), hosts = hosts.len(), "Migrated legacy host aliases");
        }
        Ok(LoadedHosts { hosts, migrated })
    }

    /// 整体覆盖写入（原子写入）
    pub async fn save(&self, hosts: &HostMap) -> CoreResult<()> {
        validate_host_map(hosts)?;
        let content = serde_json::to_string_pretty(hosts)
            .map_err(|e| CoreError::store("Failed to serialize hosts", &self.path, e))?;
        self.write(content).await?;

        info!(path = %self.path.display(), hosts = hosts.len(), "Saved virtual hosts");
        Ok(())
    }

    /// 写回迁移后的表，不做冲突检查；冲突留到下一次显式保存时报告
    pub async fn save_migrated(&self, hosts: &HostMap) -> CoreResult<()> {
        let content = serde_json::to_string_pretty(hosts)
            .map_err(|e| CoreError::store("Failed to serialize hosts", &self.path, e))?;
        self.write(content).await
    }

    /// 从持久化的表中删除一个域名，不触发配置生成
    pub async fn delete(&self, domain: &str) -> CoreResult<()> {
        let raw = self
            .read_raw()
            .await?
            .ok_or_else(|| CoreError::HostNotFound(domain.to_string()))?;
        let Value::Object(mut entries) = raw else {
            return Err(CoreError::store(
                "Failed to parse hosts file",
                &self.path,
                "top level is not an object",
            ));
        };
        if entries.remove(domain).is_none() {
            return Err(CoreError::HostNotFound(domain.to_string()));
        }

        let content = serde_json::to_string_pretty(&entries)
            .map_err(|e| CoreError::store("Failed to serialize hosts", &self.path, e))?;
        self.write(content).await?;

        info!(path = %self.path.display(), domain = %domain, "Deleted virtual host");
        Ok(())
    }

    async fn read_raw(&self) -> CoreResult<Option<Value>> {
        let Some(bytes) = read_optional(&self.path)
            .await
            .map_err(|e| CoreError::store("Failed to read hosts file", &self.path, e))?
        else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CoreError::store("Failed to parse hosts file", &self.path, e))
    }

    async fn write(&self, content: String) -> CoreResult<()> {
        write_atomic(&self.path, content)
            .await
            .map_err(|e| CoreError::store("Failed to write hosts file", &self.path, e))
    }
}

/// 把任意来源的 JSON（文件或 UI 提交）规范化为 HostMap
///
/// 兼容：别名为纯字符串、别名对象缺少 id / active、顶层旧字段 `alias`。
/// 非对象的条目被跳过。
pub fn normalize_host_map(raw: Value) -> Result<(HostMap, bool), String> {
    let Value::Object(entries) = raw else {
        return Err("top level is not an object".to_string());
    };

    let mut hosts = HostMap::new();
    let mut migrated = false;
    for (domain, entry) in entries {
        let Value::Object(fields) = entry else {
            warn!(domain = %domain, "Skipping host entry that is not an object");
            continue;
        };
        let (host, host_migrated) = normalize_host(&domain, &fields);
        migrated |= host_migrated;
        hosts.insert(domain, host);
    }
    Ok((hosts, migrated))
}

fn normalize_host(domain: &str, fields: &Map<String, Value>) -> (VirtualHost, bool) {
    let text = |key: &str, default: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };
    let flag = |key: &str| fields.get(key).and_then(Value::as_bool).unwrap_or(true);

    let mut migrated = false;
    let mut aliases = Vec::new();
    for value in fields
        .get("aliases")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        match value {
            Value::String(legacy) => {
                migrated = true;
                if !legacy.trim().is_empty() {
                    aliases.push(HostAlias::new(legacy.trim()));
                }
            }
            Value::Object(alias) => {
                let value = alias.get("value").and_then(Value::as_str).unwrap_or("");
                if value.trim().is_empty() {
                    migrated = true;
                    continue;
                }
                let id = match alias.get("id").and_then(Value::as_str) {
                    Some(id) if !id.is_empty() => id.to_string(),
                    _ => {
                        migrated = true;
                        new_alias_id()
                    }
                };
                let active = match alias.get("active").and_then(Value::as_bool) {
                    Some(active) => active,
                    None => {
                        migrated = true;
                        true
                    }
                };
                aliases.push(HostAlias {
                    id,
                    value: value.trim().to_string(),
                    active,
                });
            }
            _ => migrated = true,
        }
    }

    if let Some(legacy) = fields.get("alias") {
        migrated = true;
        if let Some(value) = legacy.as_str().map(str::trim).filter(|v| !v.is_empty()) {
            if aliases.is_empty() {
                aliases.push(HostAlias::new(value));
            }
        }
    }

    let host = VirtualHost {
        domain: domain.to_string(),
        docroot: text("docroot", ""),
        aliases,
        group: text("group", DEFAULT_GROUP),
        active: flag("active"),
        ssl: flag("ssl"),
        host_type: text("type", DEFAULT_HOST_TYPE),
    };
    (host, migrated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_in(dir: &tempfile::TempDir) -> HostStore {
        HostStore::new(dir.path().join("conf").join("hosts.json"))
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = store_in(&dir).load().await.unwrap();
        assert!(loaded.hosts.is_empty());
        assert!(!loaded.migrated);
    }

    #[test]
    fn test_defaults_applied() {
        let (hosts, migrated) = normalize_host_map(json!({
            "a.test": { "docroot": "/www/a" }
        }))
        .unwrap();

        let host = &hosts["a.test"];
        assert_eq!(host.domain, "a.test");
        assert_eq!(host.group, "Uncategorized");
        assert!(host.active);
        assert!(host.ssl);
        assert_eq!(host.host_type, "static");
        assert!(!migrated);
    }

    #[test]
    fn test_legacy_aliases_migrated() {
        let (hosts, migrated) = normalize_host_map(json!({
            "a.test": {
                "docroot": "/www/a",
                "aliases": ["www.a.test", { "value": "api.a.test" }, { "value": "" }]
            },
            "b.test": { "docroot": "/www/b", "alias": "www.b.test" },
            "c.test": "not an object"
        }))
        .unwrap();

        assert!(migrated);
        assert!(!hosts.contains_key("c.test"));

        let a = &hosts["a.test"].aliases;
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].value, "www.a.test");
        assert_eq!(a[1].value, "api.a.test");
        assert!(a.iter().all(|alias| alias.id.starts_with("alias_") && alias.active));
        assert_ne!(a[0].id, a[1].id);

        let b = &hosts["b.test"].aliases;
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].value, "www.b.test");
    }

    #[test]
    fn test_complete_aliases_untouched() {
        let (hosts, migrated) = normalize_host_map(json!({
            "a.test": {
                "docroot": "/www/a",
                "aliases": [{ "id": "alias_1", "value": "www.a.test", "active": false }]
            }
        }))
        .unwrap();

        assert!(!migrated);
        assert_eq!(
            hosts["a.test"].aliases,
            vec![HostAlias {
                id: "alias_1".to_string(),
                value: "www.a.test".to_string(),
                active: false
            }]
        );
    }

    #[tokio::test]
    async fn test_save_is_full_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut hosts = HostMap::new();
        hosts.insert("a.test".into(), VirtualHost::new("a.test", "/www/a"));
        hosts.insert("b.test".into(), VirtualHost::new("b.test", "/www/b"));
        store.save(&hosts).await.unwrap();

        hosts.remove("a.test");
        store.save(&hosts).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.hosts.keys().collect::<Vec<_>>(), vec!["b.test"]);
        assert_eq!(loaded.hosts["b.test"], hosts["b.test"]);
    }

    #[tokio::test]
    async fn test_save_rejects_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut hosts = HostMap::new();
        hosts.insert("a.test".into(), VirtualHost::new("a.test", "/www/a"));
        hosts.insert(
            "b.test".into(),
            VirtualHost::new("b.test", "/www/b").with_alias("a.test"),
        );

        assert!(matches!(store.save(&hosts).await, Err(CoreError::InvalidHost(_))));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut hosts = HostMap::new();
        hosts.insert("a.test".into(), VirtualHost::new("a.test", "/www/a"));
        hosts.insert("b.test".into(), VirtualHost::new("b.test", "/www/b"));
        store.save(&hosts).await.unwrap();

        store.delete("a.test").await.unwrap();
        let loaded = store.load().await.unwrap();
        assert!(!loaded.hosts.contains_key("a.test"));
        assert!(loaded.hosts.contains_key("b.test"));

        assert!(matches!(
            store.delete("a.test").await,
            Err(CoreError::HostNotFound(domain)) if domain == "a.test"
        ));
    }

    #[tokio::test]
    async fn test_delete_without_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            store_in(&dir).delete("a.test").await,
            Err(CoreError::HostNotFound(_))
        ));
    }
}
