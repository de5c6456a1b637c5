//! 虚拟主机配置生成
//!
//! `generate` 是纯函数：同样的 host 表和栈配置永远得到逐字节相同的输出。
//! 输出不含时间戳，host 按域名顺序（BTreeMap）渲染。
//!
//! hosts 文件只拥有 `# BEGIN localhost-manager` 与 `# END localhost-manager`
//! 之间的内容，块外的用户条目原样保留（见 [`merge_managed_block`]）。

use std::path::Path;

use crate::domain::host::{HostMap, RuntimeSelector, VirtualHost};
use crate::domain::stack::{ManagedFile, PhpHandler, StackConfig, TemplateVars};
use crate::error::CoreResult;

pub const BLOCK_BEGIN: &str = "# BEGIN localhost-manager";
pub const BLOCK_END: &str = "# END localhost-manager";

const HEADER: &str = "# Managed by localhost-manager. Manual edits are overwritten on the next apply.\n";
const LOOPBACK: &str = "127.0.0.1";

/// 生成结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedArtifacts {
    /// 完整的 vhost 配置文件内容
    pub vhost_conf: String,
    /// hosts 文件受管块（含 BEGIN/END 行）
    pub hosts_block: String,
    pub vhost_file: ManagedFile,
    pub hosts_file: ManagedFile,
}

/// 渲染 vhost 文件与 hosts 受管块
///
/// 所有 host（包括未启用的）先整体校验，任一失败即返回
/// `ConfigGeneration` 并指明是哪个 host。
pub fn generate(hosts: &HostMap, stack: &StackConfig, ssl_dir: &Path) -> CoreResult<GeneratedArtifacts> {
    let mut validated = Vec::with_capacity(hosts.len());
    for host in hosts.values() {
        let runtime = host.validate_for_generation()?;
        validated.push((host, runtime));
    }

    let mut vhost_conf = String::from(HEADER);
    let mut hosts_block = format!("{}\n", BLOCK_BEGIN);

    for (host, runtime) in validated.iter().filter(|(host, _)| host.active) {
        let handler = match runtime {
            RuntimeSelector::Static => None,
            RuntimeSelector::Php { version } => stack
                .php_handler
                .as_ref()
                .map(|h| handler_target(h, version.as_deref())),
        };

        vhost_conf.push('\n');
        vhost_conf.push_str(&render_block(host, 80, None, handler.as_deref(), &stack.log_dir));
        if host.ssl {
            vhost_conf.push('\n');
            vhost_conf.push_str(&render_block(
                host,
                443,
                Some(ssl_dir),
                handler.as_deref(),
                &stack.log_dir,
            ));
        }

        let names: Vec<&str> = std::iter::once(host.domain.as_str())
            .chain(host.active_aliases())
            .collect();
        hosts_block.push_str(&format!("{} {}\n", LOOPBACK, names.join(" ")));
    }
    hosts_block.push_str(BLOCK_END);
    hosts_block.push('\n');

    Ok(GeneratedArtifacts {
        vhost_conf,
        hosts_block,
        vhost_file: stack.vhost_file.clone(),
        hosts_file: stack.hosts_file.clone(),
    })
}

fn handler_target(handler: &PhpHandler, version: Option<&str>) -> String {
    match (version, &handler.versioned) {
        (Some(major_minor), Some(template)) => TemplateVars {
            major_minor: major_minor.to_string(),
            ..TemplateVars::default()
        }
        .substitute(template),
        _ => handler.default.clone(),
    }
}

fn render_block(
    host: &VirtualHost,
    port: u16,
    ssl_dir: Option<&Path>,
    handler: Option<&str>,
    log_dir: &Path,
) -> String {
    let docroot = apache_path(Path::new(&host.docroot));
    let log_dir = apache_path(log_dir);
    let aliases: Vec<&str> = host.active_aliases().collect();
    let log_name = if port == 443 {
        format!("{}-ssl", host.domain)
    } else {
        host.domain.clone()
    };

    let mut out = String::new();
    out.push_str(&format!("<VirtualHost *:{}>\n", port));
    out.push_str(&format!("    ServerName {}\n", host.domain));
    if !aliases.is_empty() {
        out.push_str(&format!("    ServerAlias {}\n", aliases.join(" ")));
    }
    out.push_str(&format!("    DocumentRoot \"{}\"\n", docroot));
    out.push_str(&format!("    <Directory \"{}\">\n", docroot));
    out.push_str("        Options Indexes FollowSymLinks\n");
    out.push_str("        AllowOverride All\n");
    out.push_str("        Require all granted\n");
    out.push_str("    </Directory>\n");

    if let Some(target) = handler {
        out.push_str("    <FilesMatch \\.php$>\n");
        out.push_str(&format!("        SetHandler \"{}\"\n", target));
        out.push_str("    </FilesMatch>\n");
    }

    if let Some(dir) = ssl_dir {
        let dir = apache_path(dir);
        out.push_str("    SSLEngine on\n");
        out.push_str(&format!("    SSLCertificateFile \"{}/{}.crt\"\n", dir, host.domain));
        out.push_str(&format!("    SSLCertificateKeyFile \"{}/{}.key\"\n", dir, host.domain));
    }

    out.push_str(&format!("    ErrorLog \"{}/{}-error.log\"\n", log_dir, log_name));
    out.push_str(&format!(
        "    CustomLog \"{}/{}-access.log\" combined\n",
        log_dir, log_name
    ));
    out.push_str("</VirtualHost>\n");
    out
}

/// Apache 在 Windows 上也接受正斜杠
fn apache_path(path: &Path) -> String {
    path.display()
        .to_string()
        .replace('\\', "/")
        .trim_end_matches('/')
        .to_string()
}

/// 用新的受管块替换 hosts 文件中的旧块，没有旧块时追加到末尾
///
/// 只有 BEGIN 没有 END 时，从 BEGIN 到文件末尾都视为受管内容。
/// 保留原文件的换行风格（CRLF / LF）。
pub fn merge_managed_block(existing: &str, block: &str) -> String {
    let newline = if existing.contains("\r\n") { "\r\n" } else { "\n" };
    let block_lines: Vec<&str> = block.lines().collect();
    let lines: Vec<&str> = existing.lines().collect();

    let begin = lines.iter().position(|l| l.trim() == BLOCK_BEGIN);
    let mut merged: Vec<&str> = Vec::with_capacity(lines.len() + block_lines.len());

    match begin {
        Some(begin) => {
            let end = lines[begin..]
                .iter()
                .position(|l| l.trim() == BLOCK_END)
                .map(|offset| begin + offset + 1)
                .unwrap_or(lines.len());
            merged.extend_from_slice(&lines[..begin]);
            merged.extend_from_slice(&block_lines);
            merged.extend_from_slice(&lines[end..]);
        }
        None => {
            merged.extend_from_slice(&lines);
            if merged.last().is_some_and(|l| !l.trim().is_empty()) {
                merged.push("");
            }
            merged.extend_from_slice(&block_lines);
        }
    }

    let mut out = merged.join(newline);
    out.push_str(newline);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::platform::Platform;
    use crate::error::CoreError;

    fn stack() -> StackConfig {
        StackConfig::lookup("native", Platform::Linux).unwrap()
    }

    fn scenario() -> HostMap {
        let mut hosts = HostMap::new();
        hosts.insert(
            "a.test".into(),
            VirtualHost::new("a.test", "/www/a").with_ssl(false),
        );
        let mut b = VirtualHost::new("b.test", "/www/b");
        b.active = false;
        hosts.insert("b.test".into(), b);
        hosts
    }

    #[test]
    fn test_inactive_host_and_no_ssl() {
        let out = generate(&scenario(), &stack(), Path::new("/ssl")).unwrap();

        assert_eq!(out.vhost_conf.matches("<VirtualHost").count(), 1);
        assert!(out.vhost_conf.contains("ServerName a.test"));
        assert!(!out.vhost_conf.contains("b.test"));
        assert!(!out.vhost_conf.contains("SSL"));
        assert!(!out.vhost_conf.contains("ServerAlias"));
        assert_eq!(
            out.hosts_block,
            "# BEGIN localhost-manager\n127.0.0.1 a.test\n# END localhost-manager\n"
        );
    }

    #[test]
    fn test_generation_is_byte_identical() {
        let mut hosts = scenario();
        hosts.insert(
            "c.test".into(),
            VirtualHost::new("c.test", "/www/c")
                .with_type("php8.2")
                .with_alias("www.c.test"),
        );

        let first = generate(&hosts, &stack(), Path::new("/ssl")).unwrap();
        let second = generate(&hosts.clone(), &stack(), Path::new("/ssl")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ssl_block_and_php_handler() {
        let mut hosts = HostMap::new();
        let mut host = VirtualHost::new("shop.test", "C:\\www\\shop\\")
            .with_type("php@8.2")
            .with_alias("www.shop.test")
            .with_alias("old.shop.test");
        host.aliases[1].active = false;
        hosts.insert("shop.test".into(), host);

        let out = generate(&hosts, &stack(), Path::new("C:\\lhm\\ssl")).unwrap();

        assert_eq!(out.vhost_conf.matches("<VirtualHost *:80>").count(), 1);
        assert_eq!(out.vhost_conf.matches("<VirtualHost *:443>").count(), 1);
        assert!(out.vhost_conf.contains("ServerAlias www.shop.test\n"));
        assert!(!out.vhost_conf.contains("old.shop.test"));
        assert!(out.vhost_conf.contains("DocumentRoot \"C:/www/shop\""));
        assert!(out.vhost_conf.contains("SSLCertificateFile \"C:/lhm/ssl/shop.test.crt\""));
        assert!(out.vhost_conf.contains("SSLCertificateKeyFile \"C:/lhm/ssl/shop.test.key\""));
        assert_eq!(
            out.vhost_conf
                .matches("SetHandler \"proxy:unix:/run/php/php8.2-fpm.sock|fcgi://localhost\"")
                .count(),
            2
        );
        assert!(out.hosts_block.contains("127.0.0.1 shop.test www.shop.test\n"));
    }

    #[test]
    fn test_mod_php_stack_has_no_handler() {
        let mut hosts = HostMap::new();
        hosts.insert(
            "a.test".into(),
            VirtualHost::new("a.test", "/www/a").with_type("php"),
        );
        let stack = StackConfig::lookup("xampp", Platform::Linux).unwrap();

        let out = generate(&hosts, &stack, Path::new("/ssl")).unwrap();
        assert!(!out.vhost_conf.contains("SetHandler"));
    }

    #[test]
    fn test_invalid_host_names_the_host() {
        let mut hosts = scenario();
        hosts.insert(
            "c.test".into(),
            VirtualHost::new("c.test", "/www/c").with_type("ruby"),
        );

        match generate(&hosts, &stack(), Path::new("/ssl")) {
            Err(CoreError::ConfigGeneration { domain, .. }) => assert_eq!(domain, "c.test"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_deleted_domain_absent() {
        let mut hosts = scenario();
        hosts.insert("c.test".into(), VirtualHost::new("c.test", "/www/c"));
        hosts.remove("a.test");

        let out = generate(&hosts, &stack(), Path::new("/ssl")).unwrap();
        assert!(!out.vhost_conf.contains("a.test"));
        assert!(!out.hosts_block.contains("a.test"));
    }

    #[test]
    fn test_merge_appends_block() {
        let block = "# BEGIN localhost-manager\n127.0.0.1 a.test\n# END localhost-manager\n";
        let merged = merge_managed_block("127.0.0.1 localhost\n", block);
        assert_eq!(
            merged,
            "127.0.0.1 localhost\n\n# BEGIN localhost-manager\n127.0.0.1 a.test\n# END localhost-manager\n"
        );
        assert_eq!(merge_managed_block(&merged, block), merged);
    }

    #[test]
    fn test_merge_replaces_block_and_keeps_crlf() {
        let existing = "127.0.0.1 localhost\r\n# BEGIN localhost-manager\r\n127.0.0.1 old.test\r\n# END localhost-manager\r\n10.0.0.5 nas\r\n";
        let block = "# BEGIN localhost-manager\n127.0.0.1 new.test\n# END localhost-manager\n";

        let merged = merge_managed_block(existing, block);
        assert_eq!(
            merged,
            "127.0.0.1 localhost\r\n# BEGIN localhost-manager\r\n127.0.0.1 new.test\r\n# END localhost-manager\r\n10.0.0.5 nas\r\n"
        );
    }

    #[test]
    fn test_merge_unterminated_block() {
        let existing = "127.0.0.1 localhost\n# BEGIN localhost-manager\n127.0.0.1 stale.test\n";
        let block = "# BEGIN localhost-manager\n# END localhost-manager\n";
        assert_eq!(
            merge_managed_block(existing, block),
            "127.0.0.1 localhost\n# BEGIN localhost-manager\n# END localhost-manager\n"
        );
    }
}
