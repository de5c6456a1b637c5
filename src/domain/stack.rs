//! 本地 Web 栈配置
//!
//! 每个 `(StackKey, Platform)` 组合对应一份固定的配置：二进制候选、进程名、
//! 安装布局、vhost / hosts 文件路径以及各类命令模板。
//! `StackConfig::lookup` 是纯查表，未知或不适用于当前平台的组合直接返回
//! `UnknownStack`，不做任何回退。

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::package::PackageVersion;
use crate::domain::platform::Platform;
use crate::domain::service::ServiceKind;
use crate::error::{CoreError, CoreResult};

/// 栈标识
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StackKey {
    Native,
    Xampp,
    Wamp,
    Laragon,
    Mamp,
}

impl StackKey {
    pub const ALL: [StackKey; 5] = [
        StackKey::Native,
        StackKey::Xampp,
        StackKey::Wamp,
        StackKey::Laragon,
        StackKey::Mamp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StackKey::Native => "native",
            StackKey::Xampp => "xampp",
            StackKey::Wamp => "wamp",
            StackKey::Laragon => "laragon",
            StackKey::Mamp => "mamp",
        }
    }

    pub fn display_name(&self, platform: Platform) -> &'static str {
        match self {
            StackKey::Native => match platform {
                Platform::MacOs => "Homebrew",
                Platform::Linux => "Native (apt)",
                Platform::Windows => "Native (Chocolatey)",
            },
            StackKey::Xampp => "XAMPP",
            StackKey::Wamp => "WAMP",
            StackKey::Laragon => "Laragon",
            StackKey::Mamp => "MAMP",
        }
    }

    pub fn is_available_on(&self, platform: Platform) -> bool {
        match self {
            StackKey::Native | StackKey::Xampp => true,
            StackKey::Wamp | StackKey::Laragon => platform == Platform::Windows,
            StackKey::Mamp => platform != Platform::Linux,
        }
    }

    /// 存在任一路径即视为已安装
    pub fn detection_paths(&self, platform: Platform) -> Vec<PathBuf> {
        let paths: &[&str] = match (self, platform) {
            (StackKey::Native, Platform::MacOs) => &["/opt/homebrew/bin/brew", "/usr/local/bin/brew"],
            (StackKey::Native, Platform::Linux) => &["/usr/bin/apt-get"],
            (StackKey::Native, Platform::Windows) => &["C:\\ProgramData\\chocolatey\\bin\\choco.exe"],
            (StackKey::Xampp, Platform::MacOs) => &["/Applications/XAMPP"],
            (StackKey::Xampp, Platform::Linux) => &["/opt/lampp"],
            (StackKey::Xampp, Platform::Windows) => &["C:\\xampp"],
            (StackKey::Wamp, Platform::Windows) => &["C:\\wamp64", "C:\\wamp"],
            (StackKey::Laragon, Platform::Windows) => &["C:\\laragon"],
            (StackKey::Mamp, Platform::MacOs) => &["/Applications/MAMP"],
            (StackKey::Mamp, Platform::Windows) => &["C:\\MAMP"],
            _ => &[],
        };
        paths.iter().map(PathBuf::from).collect()
    }
}

impl fmt::Display for StackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StackKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| CoreError::UnknownStack(s.to_string()))
    }
}

/// 命令模板，支持 `{version}` `{major_minor}` `{formula}` 占位符
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandTemplate {
    pub program: String,
    pub args: Vec<String>,
    pub elevated: bool,
    /// 额外的环境变量
    pub env: Vec<(String, String)>,
}

impl CommandTemplate {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            elevated: false,
            env: Vec::new(),
        }
    }

    pub fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// 是否带版本相关的占位符
    pub fn uses_version(&self) -> bool {
        std::iter::once(&self.program)
            .chain(&self.args)
            .any(|part| VERSION_PLACEHOLDERS.iter().any(|p| part.contains(p)))
    }

    pub fn render(&self, vars: &TemplateVars) -> (String, Vec<String>) {
        (
            vars.substitute(&self.program),
            self.args.iter().map(|a| vars.substitute(a)).collect(),
        )
    }
}

const VERSION_PLACEHOLDERS: [&str; 3] = ["{version}", "{major_minor}", "{formula}"];

/// 模板变量
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateVars {
    pub version: String,
    pub major_minor: String,
    /// Homebrew formula 名
    pub formula: String,
    pub install_path: String,
}

impl TemplateVars {
    /// 版本号必须是 `X.Y[.Z]`，它会被拼进命令行
    pub fn for_version(service: ServiceKind, version: &str) -> CoreResult<Self> {
        let parsed = PackageVersion::parse(version).ok_or_else(|| {
            CoreError::InvalidArgument(format!("'{}' is not a version number", version))
        })?;
        let major_minor = parsed.major_minor();
        Ok(Self {
            version: parsed.version.clone(),
            formula: brew_formula(service, &major_minor),
            major_minor,
            install_path: String::new(),
        })
    }

    pub fn with_install_path(mut self, path: &std::path::Path) -> Self {
        self.install_path = path.display().to_string();
        self
    }

    pub fn substitute(&self, raw: &str) -> String {
        raw.replace("{version}", &self.version)
            .replace("{major_minor}", &self.major_minor)
            .replace("{formula}", &self.formula)
            .replace("{install_path}", &self.install_path)
    }
}

/// Homebrew 中最新 PHP 是无后缀的 `php`，其余是 `php@X.Y`
pub fn brew_formula(service: ServiceKind, major_minor: &str) -> String {
    match service {
        ServiceKind::Php if major_minor == LATEST_BREW_PHP => "php".to_string(),
        ServiceKind::Php => format!("php@{}", major_minor),
        ServiceKind::Mysql => format!("mysql@{}", major_minor),
        ServiceKind::Apache => "httpd".to_string(),
    }
}

const LATEST_BREW_PHP: &str = "8.4";

/// 服务控制命令
#[derive(Clone, Debug, Default)]
pub struct ServiceCommands {
    pub start: Option<CommandTemplate>,
    pub stop: Option<CommandTemplate>,
    /// 依次执行，任一步失败即中止
    pub switch: Vec<CommandTemplate>,
}

impl ServiceCommands {
    fn start_stop(start: CommandTemplate, stop: CommandTemplate) -> Self {
        Self {
            start: Some(start),
            stop: Some(stop),
            switch: Vec::new(),
        }
    }

    fn with_switch(mut self, steps: Vec<CommandTemplate>) -> Self {
        self.switch = steps;
        self
    }
}

/// 包管理命令
#[derive(Clone, Debug)]
pub struct PackageCommands {
    pub install: CommandTemplate,
    pub uninstall: CommandTemplate,
}

/// 安装布局，决定 `list_installed` 如何扫描文件系统
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstallLayout {
    /// Homebrew Cellar：`<root>/<formula>[@X.Y]/<version>[_N]/`
    Cellar { root: PathBuf, formula: String },
    /// 带版本号的可执行文件：`<dir>/php8.2`
    VersionedBinaries { dir: PathBuf, prefix: String },
    /// 带版本号的目录：`<dir>/php8.3.0`、`<dir>/php-8.3.0-nts-Win32-vs16-x64`
    VersionDirs { dir: PathBuf, prefix: String },
    /// 单一安装，版本从二进制读取
    Single { binary: PathBuf },
}

/// 需要写入的受管文件
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManagedFile {
    pub path: PathBuf,
    /// 写入需要提权
    pub elevated: bool,
}

impl ManagedFile {
    fn new(path: impl Into<PathBuf>, elevated: bool) -> Self {
        Self {
            path: path.into(),
            elevated,
        }
    }
}

/// `.php` 请求的 Apache 处理器
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhpHandler {
    /// host 未指定版本时使用
    pub default: String,
    /// host 指定 `phpX.Y` 时使用，含 `{major_minor}`
    pub versioned: Option<String>,
}

/// 一个栈在某个平台上的完整配置
#[derive(Clone, Debug)]
pub struct StackConfig {
    pub key: StackKey,
    pub platform: Platform,
    pub name: String,
    /// 读取当前版本的二进制候选，按顺序尝试
    pub binaries: BTreeMap<ServiceKind, Vec<String>>,
    /// 进程名前缀（不区分大小写）
    pub process_names: BTreeMap<ServiceKind, Vec<String>>,
    pub layouts: BTreeMap<ServiceKind, InstallLayout>,
    pub services: BTreeMap<ServiceKind, ServiceCommands>,
    pub packages: BTreeMap<ServiceKind, PackageCommands>,
    pub vhost_file: ManagedFile,
    pub hosts_file: ManagedFile,
    pub log_dir: PathBuf,
    /// php.ini 路径模板，支持 `{install_path}` `{major_minor}`
    pub php_ini: String,
    /// None 表示 mod_php，无需 SetHandler
    pub php_handler: Option<PhpHandler>,
}

impl StackConfig {
    /// 纯查表
    pub fn lookup(key: &str, platform: Platform) -> CoreResult<Self> {
        let stack_key: StackKey = key.parse()?;
        if !stack_key.is_available_on(platform) {
            return Err(CoreError::UnknownStack(format!(
                "{} (not available on {})",
                key,
                platform.name()
            )));
        }
        let config = match (stack_key, platform) {
            (StackKey::Native, Platform::MacOs) => native_macos(),
            (StackKey::Native, Platform::Linux) => native_linux(),
            (StackKey::Native, Platform::Windows) => native_windows(),
            (StackKey::Xampp, Platform::Windows) => xampp_windows(),
            (StackKey::Xampp, unix) => xampp_unix(unix),
            (StackKey::Wamp, _) => wamp(),
            (StackKey::Laragon, _) => laragon(),
            (StackKey::Mamp, Platform::MacOs) => mamp_macos(),
            (StackKey::Mamp, _) => mamp_windows(),
        };
        Ok(config)
    }

    pub fn with_hosts_file(mut self, path: PathBuf) -> Self {
        self.hosts_file = ManagedFile::new(path, false);
        self
    }

    pub fn with_vhost_file(mut self, path: PathBuf) -> Self {
        self.vhost_file = ManagedFile::new(path, false);
        self
    }

    pub fn service_commands(&self, service: ServiceKind) -> Option<&ServiceCommands> {
        self.services.get(&service)
    }

    /// 各服务的进程名
    pub fn process_candidates(&self, service: ServiceKind) -> &[String] {
        self.process_names
            .get(&service)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn binary_candidates(&self, service: ServiceKind) -> &[String] {
        self.binaries
            .get(&service)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn hosts_file(platform: Platform) -> ManagedFile {
    match platform {
        Platform::Windows => ManagedFile::new("C:\\Windows\\System32\\drivers\\etc\\hosts", true),
        _ => ManagedFile::new("/etc/hosts", true),
    }
}

fn unix_processes() -> BTreeMap<ServiceKind, Vec<String>> {
    BTreeMap::from([
        (ServiceKind::Apache, names(&["httpd", "apache2"])),
        (ServiceKind::Mysql, names(&["mysqld", "mariadbd"])),
        (ServiceKind::Php, names(&["php-fpm"])),
    ])
}

/// mod_php 栈里 PHP 随 Apache 进程运行
fn mod_php_processes(apache: &[&str], mysql: &[&str]) -> BTreeMap<ServiceKind, Vec<String>> {
    BTreeMap::from([
        (ServiceKind::Apache, names(apache)),
        (ServiceKind::Mysql, names(mysql)),
        (ServiceKind::Php, names(apache)),
    ])
}

fn homebrew_prefix() -> &'static str {
    if cfg!(target_arch = "aarch64") {
        "/opt/homebrew"
    } else {
        "/usr/local"
    }
}

fn native_macos() -> StackConfig {
    let prefix = homebrew_prefix();
    let brew = |action: &str, formula: &str| CommandTemplate::new("brew", &["services", action, formula]);
    let brew_pkg = |action: &str| CommandTemplate::new("brew", &[action, "{formula}"]);
    let packages = PackageCommands {
        install: brew_pkg("install"),
        uninstall: brew_pkg("uninstall"),
    };

    StackConfig {
        key: StackKey::Native,
        platform: Platform::MacOs,
        name: StackKey::Native.display_name(Platform::MacOs).to_string(),
        binaries: BTreeMap::from([
            (ServiceKind::Apache, vec![format!("{prefix}/bin/httpd"), "httpd".to_string()]),
            (ServiceKind::Mysql, vec![format!("{prefix}/bin/mysql"), "mysql".to_string()]),
            (ServiceKind::Php, vec![format!("{prefix}/bin/php"), "php".to_string()]),
        ]),
        process_names: unix_processes(),
        layouts: [
            (ServiceKind::Apache, "httpd"),
            (ServiceKind::Mysql, "mysql"),
            (ServiceKind::Php, "php"),
        ]
        .into_iter()
        .map(|(service, formula)| {
            (
                service,
                InstallLayout::Cellar {
                    root: PathBuf::from(format!("{prefix}/Cellar")),
                    formula: formula.to_string(),
                },
            )
        })
        .collect(),
        services: BTreeMap::from([
            (ServiceKind::Apache, ServiceCommands::start_stop(brew("start", "httpd"), brew("stop", "httpd"))),
            (ServiceKind::Mysql, ServiceCommands::start_stop(brew("start", "mysql"), brew("stop", "mysql"))),
            (
                ServiceKind::Php,
                ServiceCommands::start_stop(brew("start", "php"), brew("stop", "php")).with_switch(vec![
                    CommandTemplate::new(
                        "sh",
                        &["-c", "brew list --formula | grep -E '^php(@[0-9.]+)?$' | xargs brew unlink || true"],
                    ),
                    CommandTemplate::new("brew", &["link", "--overwrite", "--force", "{formula}"]),
                ]),
            ),
        ]),
        packages: ServiceKind::ALL.into_iter().map(|s| (s, packages.clone())).collect(),
        vhost_file: ManagedFile::new(format!("{prefix}/etc/httpd/extra/httpd-vhosts.conf"), false),
        hosts_file: hosts_file(Platform::MacOs),
        log_dir: PathBuf::from(format!("{prefix}/var/log/httpd")),
        php_ini: format!("{prefix}/etc/php/{{major_minor}}/php.ini"),
        php_handler: Some(PhpHandler {
            default: "proxy:fcgi://127.0.0.1:9000".to_string(),
            versioned: None,
        }),
    }
}

fn native_linux() -> StackConfig {
    let systemctl = |action: &str, unit: &str| CommandTemplate::new("systemctl", &[action, unit]).elevated();
    let php_packages = |action: &str| {
        CommandTemplate::new(
            "apt-get",
            &[
                action,
                "-y",
                "php{major_minor}",
                "php{major_minor}-fpm",
                "php{major_minor}-mysql",
                "php{major_minor}-curl",
                "php{major_minor}-gd",
                "php{major_minor}-mbstring",
            ],
        )
        .elevated()
        .with_env("DEBIAN_FRONTEND", "noninteractive")
    };
    let apt = |action: &str, package: &str| {
        CommandTemplate::new("apt-get", &[action, "-y", package])
            .elevated()
            .with_env("DEBIAN_FRONTEND", "noninteractive")
    };

    StackConfig {
        key: StackKey::Native,
        platform: Platform::Linux,
        name: StackKey::Native.display_name(Platform::Linux).to_string(),
        binaries: BTreeMap::from([
            (ServiceKind::Apache, names(&["/usr/sbin/apache2", "/usr/sbin/httpd", "httpd"])),
            (ServiceKind::Mysql, names(&["/usr/bin/mysql", "mysql"])),
            (ServiceKind::Php, names(&["/usr/bin/php", "php"])),
        ]),
        process_names: unix_processes(),
        layouts: BTreeMap::from([
            (ServiceKind::Apache, InstallLayout::Single { binary: PathBuf::from("/usr/sbin/apache2") }),
            (ServiceKind::Mysql, InstallLayout::Single { binary: PathBuf::from("/usr/sbin/mysqld") }),
            (
                ServiceKind::Php,
                InstallLayout::VersionedBinaries {
                    dir: PathBuf::from("/usr/bin"),
                    prefix: "php".to_string(),
                },
            ),
        ]),
        services: BTreeMap::from([
            (
                ServiceKind::Apache,
                ServiceCommands::start_stop(systemctl("start", "apache2"), systemctl("stop", "apache2")),
            ),
            (
                ServiceKind::Mysql,
                ServiceCommands::start_stop(systemctl("start", "mysql"), systemctl("stop", "mysql")),
            ),
            (
                ServiceKind::Php,
                ServiceCommands::start_stop(
                    systemctl("start", "php{major_minor}-fpm"),
                    systemctl("stop", "php{major_minor}-fpm"),
                )
                    .with_switch(vec![CommandTemplate::new(
                        "update-alternatives",
                        &["--set", "php", "/usr/bin/php{major_minor}"],
                    )
                    .elevated()]),
            ),
        ]),
        packages: BTreeMap::from([
            (
                ServiceKind::Apache,
                PackageCommands {
                    install: apt("install", "apache2"),
                    uninstall: apt("remove", "apache2"),
                },
            ),
            (
                ServiceKind::Mysql,
                PackageCommands {
                    install: apt("install", "mysql-server"),
                    uninstall: apt("remove", "mysql-server"),
                },
            ),
            (
                ServiceKind::Php,
                PackageCommands {
                    install: php_packages("install"),
                    uninstall: php_packages("remove"),
                },
            ),
        ]),
        vhost_file: ManagedFile::new("/etc/apache2/sites-enabled/localhost-manager.conf", true),
        hosts_file: hosts_file(Platform::Linux),
        log_dir: PathBuf::from("/var/log/apache2"),
        php_ini: "/etc/php/{major_minor}/fpm/php.ini".to_string(),
        php_handler: Some(PhpHandler {
            default: "proxy:unix:/run/php/php-fpm.sock|fcgi://localhost".to_string(),
            versioned: Some("proxy:unix:/run/php/php{major_minor}-fpm.sock|fcgi://localhost".to_string()),
        }),
    }
}

fn net_service(name: &str) -> ServiceCommands {
    ServiceCommands::start_stop(
        CommandTemplate::new("net", &["start", name]).elevated(),
        CommandTemplate::new("net", &["stop", name]).elevated(),
    )
}

fn native_windows() -> StackConfig {
    let choco = |action: &str, package: &str| {
        CommandTemplate::new("choco", &[action, package, "--version={version}", "-y"]).elevated()
    };
    let choco_pair = |package: &str| PackageCommands {
        install: choco("install", package),
        uninstall: choco("uninstall", package),
    };

    StackConfig {
        key: StackKey::Native,
        platform: Platform::Windows,
        name: StackKey::Native.display_name(Platform::Windows).to_string(),
        binaries: BTreeMap::from([
            (ServiceKind::Apache, names(&["C:\\Apache24\\bin\\httpd.exe", "httpd"])),
            (ServiceKind::Mysql, names(&["C:\\tools\\mysql\\current\\bin\\mysql.exe", "mysql"])),
            (ServiceKind::Php, names(&["C:\\php\\php.exe", "php"])),
        ]),
        process_names: BTreeMap::from([
            (ServiceKind::Apache, names(&["httpd"])),
            (ServiceKind::Mysql, names(&["mysqld"])),
            (ServiceKind::Php, names(&["php-cgi"])),
        ]),
        layouts: BTreeMap::from([
            (ServiceKind::Apache, InstallLayout::Single { binary: PathBuf::from("C:\\Apache24\\bin\\httpd.exe") }),
            (
                ServiceKind::Mysql,
                InstallLayout::Single { binary: PathBuf::from("C:\\tools\\mysql\\current\\bin\\mysqld.exe") },
            ),
            (ServiceKind::Php, InstallLayout::Single { binary: PathBuf::from("C:\\php\\php.exe") }),
        ]),
        services: BTreeMap::from([
            (ServiceKind::Apache, net_service("Apache2.4")),
            (ServiceKind::Mysql, net_service("MySQL")),
        ]),
        packages: BTreeMap::from([
            (ServiceKind::Apache, choco_pair("apache-httpd")),
            (ServiceKind::Mysql, choco_pair("mysql")),
            (ServiceKind::Php, choco_pair("php")),
        ]),
        vhost_file: ManagedFile::new("C:\\Apache24\\conf\\extra\\httpd-vhosts.conf", true),
        hosts_file: hosts_file(Platform::Windows),
        log_dir: PathBuf::from("C:\\Apache24\\logs"),
        php_ini: "{install_path}\\php.ini".to_string(),
        php_handler: Some(PhpHandler {
            default: "proxy:fcgi://127.0.0.1:9000".to_string(),
            versioned: None,
        }),
    }
}

fn xampp_windows() -> StackConfig {
    StackConfig {
        key: StackKey::Xampp,
        platform: Platform::Windows,
        name: StackKey::Xampp.display_name(Platform::Windows).to_string(),
        binaries: BTreeMap::from([
            (ServiceKind::Apache, names(&["C:\\xampp\\apache\\bin\\httpd.exe"])),
            (ServiceKind::Mysql, names(&["C:\\xampp\\mysql\\bin\\mysql.exe"])),
            (ServiceKind::Php, names(&["C:\\xampp\\php\\php.exe"])),
        ]),
        process_names: mod_php_processes(&["httpd"], &["mysqld"]),
        layouts: BTreeMap::from([
            (
                ServiceKind::Apache,
                InstallLayout::Single { binary: PathBuf::from("C:\\xampp\\apache\\bin\\httpd.exe") },
            ),
            (
                ServiceKind::Mysql,
                InstallLayout::Single { binary: PathBuf::from("C:\\xampp\\mysql\\bin\\mysqld.exe") },
            ),
            (ServiceKind::Php, InstallLayout::Single { binary: PathBuf::from("C:\\xampp\\php\\php.exe") }),
        ]),
        services: BTreeMap::from([
            (ServiceKind::Apache, net_service("Apache2.4")),
            (ServiceKind::Mysql, net_service("mysql")),
        ]),
        packages: BTreeMap::new(),
        vhost_file: ManagedFile::new("C:\\xampp\\apache\\conf\\extra\\httpd-vhosts.conf", false),
        hosts_file: hosts_file(Platform::Windows),
        log_dir: PathBuf::from("C:\\xampp\\apache\\logs"),
        php_ini: "{install_path}\\php.ini".to_string(),
        php_handler: None,
    }
}

fn xampp_unix(platform: Platform) -> StackConfig {
    let (root, control) = match platform {
        Platform::MacOs => ("/Applications/XAMPP/xamppfiles", "/Applications/XAMPP/xamppfiles/xampp"),
        _ => ("/opt/lampp", "/opt/lampp/lampp"),
    };
    let lampp = |action: &str| CommandTemplate::new(control, &[action]).elevated();

    StackConfig {
        key: StackKey::Xampp,
        platform,
        name: StackKey::Xampp.display_name(platform).to_string(),
        binaries: BTreeMap::from([
            (ServiceKind::Apache, vec![format!("{root}/bin/httpd")]),
            (ServiceKind::Mysql, vec![format!("{root}/bin/mysql")]),
            (ServiceKind::Php, vec![format!("{root}/bin/php")]),
        ]),
        process_names: mod_php_processes(&["httpd"], &["mysqld", "mariadbd"]),
        layouts: BTreeMap::from([
            (ServiceKind::Apache, InstallLayout::Single { binary: PathBuf::from(format!("{root}/bin/httpd")) }),
            (ServiceKind::Mysql, InstallLayout::Single { binary: PathBuf::from(format!("{root}/sbin/mysqld")) }),
            (ServiceKind::Php, InstallLayout::Single { binary: PathBuf::from(format!("{root}/bin/php")) }),
        ]),
        services: BTreeMap::from([
            (ServiceKind::Apache, ServiceCommands::start_stop(lampp("startapache"), lampp("stopapache"))),
            (ServiceKind::Mysql, ServiceCommands::start_stop(lampp("startmysql"), lampp("stopmysql"))),
        ]),
        packages: BTreeMap::new(),
        vhost_file: ManagedFile::new(format!("{root}/etc/extra/httpd-vhosts.conf"), true),
        hosts_file: hosts_file(platform),
        log_dir: PathBuf::from(format!("{root}/logs")),
        php_ini: format!("{root}/etc/php.ini"),
        php_handler: None,
    }
}

fn wamp() -> StackConfig {
    let dirs = |sub: &str, prefix: &str| InstallLayout::VersionDirs {
        dir: PathBuf::from(format!("C:\\wamp64\\bin\\{sub}")),
        prefix: prefix.to_string(),
    };

    StackConfig {
        key: StackKey::Wamp,
        platform: Platform::Windows,
        name: StackKey::Wamp.display_name(Platform::Windows).to_string(),
        binaries: BTreeMap::from([
            (ServiceKind::Apache, names(&["httpd"])),
            (ServiceKind::Mysql, names(&["mysql"])),
            (ServiceKind::Php, names(&["php"])),
        ]),
        process_names: mod_php_processes(&["httpd"], &["mysqld"]),
        layouts: BTreeMap::from([
            (ServiceKind::Apache, dirs("apache", "apache")),
            (ServiceKind::Mysql, dirs("mysql", "mysql")),
            (ServiceKind::Php, dirs("php", "php")),
        ]),
        services: BTreeMap::from([
            (ServiceKind::Apache, net_service("wampapache64")),
            (ServiceKind::Mysql, net_service("wampmysqld64")),
        ]),
        packages: BTreeMap::new(),
        vhost_file: ManagedFile::new("C:\\wamp64\\alias\\localhost-manager.conf", false),
        hosts_file: hosts_file(Platform::Windows),
        log_dir: PathBuf::from("C:\\wamp64\\logs"),
        php_ini: "{install_path}\\php.ini".to_string(),
        php_handler: None,
    }
}

fn laragon() -> StackConfig {
    let dirs = |sub: &str, prefix: &str| InstallLayout::VersionDirs {
        dir: PathBuf::from(format!("C:\\laragon\\bin\\{sub}")),
        prefix: prefix.to_string(),
    };

    StackConfig {
        key: StackKey::Laragon,
        platform: Platform::Windows,
        name: StackKey::Laragon.display_name(Platform::Windows).to_string(),
        binaries: BTreeMap::from([
            (ServiceKind::Apache, names(&["httpd"])),
            (ServiceKind::Mysql, names(&["mysql"])),
            (ServiceKind::Php, names(&["php"])),
        ]),
        process_names: mod_php_processes(&["httpd"], &["mysqld"]),
        layouts: BTreeMap::from([
            (ServiceKind::Apache, dirs("apache", "httpd-")),
            (ServiceKind::Mysql, dirs("mysql", "mysql-")),
            (ServiceKind::Php, dirs("php", "php-")),
        ]),
        // Laragon 自己托管进程，不提供服务控制
        services: BTreeMap::new(),
        packages: BTreeMap::new(),
        vhost_file: ManagedFile::new("C:\\laragon\\etc\\apache2\\sites-enabled\\localhost-manager.conf", false),
        hosts_file: hosts_file(Platform::Windows),
        log_dir: PathBuf::from("C:\\laragon\\tmp"),
        php_ini: "{install_path}\\php.ini".to_string(),
        php_handler: None,
    }
}

fn mamp_macos() -> StackConfig {
    let script = |name: &str| CommandTemplate::new(&format!("/Applications/MAMP/bin/{name}.sh"), &[]);

    StackConfig {
        key: StackKey::Mamp,
        platform: Platform::MacOs,
        name: StackKey::Mamp.display_name(Platform::MacOs).to_string(),
        binaries: BTreeMap::from([
            (ServiceKind::Apache, names(&["/Applications/MAMP/Library/bin/httpd"])),
            (ServiceKind::Mysql, names(&["/Applications/MAMP/Library/bin/mysql"])),
            (ServiceKind::Php, names(&["php"])),
        ]),
        process_names: mod_php_processes(&["httpd"], &["mysqld"]),
        layouts: BTreeMap::from([
            (
                ServiceKind::Apache,
                InstallLayout::Single { binary: PathBuf::from("/Applications/MAMP/Library/bin/httpd") },
            ),
            (
                ServiceKind::Mysql,
                InstallLayout::Single { binary: PathBuf::from("/Applications/MAMP/Library/bin/mysqld") },
            ),
            (
                ServiceKind::Php,
                InstallLayout::VersionDirs {
                    dir: PathBuf::from("/Applications/MAMP/bin/php"),
                    prefix: "php".to_string(),
                },
            ),
        ]),
        services: BTreeMap::from([
            (ServiceKind::Apache, ServiceCommands::start_stop(script("startApache"), script("stopApache"))),
            (ServiceKind::Mysql, ServiceCommands::start_stop(script("startMysql"), script("stopMysql"))),
        ]),
        packages: BTreeMap::new(),
        vhost_file: ManagedFile::new("/Applications/MAMP/conf/apache/extra/httpd-vhosts.conf", false),
        hosts_file: hosts_file(Platform::MacOs),
        log_dir: PathBuf::from("/Applications/MAMP/logs"),
        php_ini: "{install_path}/conf/php.ini".to_string(),
        php_handler: None,
    }
}

fn mamp_windows() -> StackConfig {
    StackConfig {
        key: StackKey::Mamp,
        platform: Platform::Windows,
        name: StackKey::Mamp.display_name(Platform::Windows).to_string(),
        binaries: BTreeMap::from([
            (ServiceKind::Apache, names(&["C:\\MAMP\\bin\\apache\\bin\\httpd.exe"])),
            (ServiceKind::Mysql, names(&["C:\\MAMP\\bin\\mysql\\bin\\mysql.exe"])),
            (ServiceKind::Php, names(&["php"])),
        ]),
        process_names: mod_php_processes(&["httpd"], &["mysqld"]),
        layouts: BTreeMap::from([
            (
                ServiceKind::Apache,
                InstallLayout::Single { binary: PathBuf::from("C:\\MAMP\\bin\\apache\\bin\\httpd.exe") },
            ),
            (
                ServiceKind::Mysql,
                InstallLayout::Single { binary: PathBuf::from("C:\\MAMP\\bin\\mysql\\bin\\mysqld.exe") },
            ),
            (
                ServiceKind::Php,
                InstallLayout::VersionDirs {
                    dir: PathBuf::from("C:\\MAMP\\bin\\php"),
                    prefix: "php".to_string(),
                },
            ),
        ]),
        services: BTreeMap::new(),
        packages: BTreeMap::new(),
        vhost_file: ManagedFile::new("C:\\MAMP\\conf\\apache\\extra\\httpd-vhosts.conf", false),
        hosts_file: hosts_file(Platform::Windows),
        log_dir: PathBuf::from("C:\\MAMP\\logs"),
        php_ini: "{install_path}\\php.ini".to_string(),
        php_handler: None,
    }
}
