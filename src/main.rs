//! localhost-manager 命令行入口
//!
//! 每个子命令对应一个 `Api` 操作：结果以 JSON 打印到 stdout，
//! 失败时把 `{error, message, details}` 打印到 stderr 并以 1 退出。
//!
//! Usage:
//! - `localhost-manager status`
//! - `localhost-manager control restart apache`
//! - `localhost-manager --stack xampp generate`
//! - `localhost-manager install 8.3.14 --package php`
//! - `LHM_MYSQL_ROOT_PASSWORD=... localhost-manager mysql-users`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::broadcast;

use localhost_manager::domain::host::VirtualHost;
use localhost_manager::domain::log::LogLine;
use localhost_manager::domain::service::ServiceKind;
use localhost_manager::state::host_store::normalize_host_map;
use localhost_manager::{init_tracing, Api, AppConfig, CoreError, ErrorResponse};

#[derive(Debug, Parser)]
#[command(name = "localhost-manager", version, about = "Local web stack control core")]
struct Cli {
    /// 栈标识（native / xampp / wamp / laragon / mamp），优先于 LHM_STACK 与 settings.json
    #[arg(long, global = true)]
    stack: Option<String>,

    /// 数据目录
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[arg(long, global = true)]
    hosts_file: Option<PathBuf>,

    #[arg(long, global = true)]
    vhost_file: Option<PathBuf>,

    #[arg(long, global = true)]
    ssl_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliPackage {
    Php,
    Apache,
    Mysql,
}

impl From<CliPackage> for ServiceKind {
    fn from(value: CliPackage) -> Self {
        match value {
            CliPackage::Php => ServiceKind::Php,
            CliPackage::Apache => ServiceKind::Apache,
            CliPackage::Mysql => ServiceKind::Mysql,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 可安装的版本
    AvailableVersions {
        #[arg(long, value_enum, default_value = "php")]
        package: CliPackage,
    },
    /// 已安装的版本
    InstalledVersions {
        #[arg(long, value_enum, default_value = "php")]
        package: CliPackage,
    },
    /// 安装（输出逐行写到 stderr）
    Install {
        version: String,
        #[arg(long, value_enum, default_value = "php")]
        package: CliPackage,
    },
    Uninstall {
        version: String,
        #[arg(long, value_enum, default_value = "php")]
        package: CliPackage,
    },
    /// 当前生效的版本
    CurrentVersion {
        #[arg(long, value_enum, default_value = "php")]
        package: CliPackage,
    },
    PhpConfig {
        version: String,
    },
    SetIni {
        version: String,
        key: String,
        value: String,
    },
    ToggleExtension {
        version: String,
        extension: String,
        #[arg(long)]
        disable: bool,
    },
    /// 列出虚拟主机
    Hosts,
    /// 用 JSON 文件整体覆盖 host 表（`-` 读取 stdin）
    SaveHosts {
        file: PathBuf,
    },
    AddHost {
        domain: String,
        docroot: String,
        #[arg(long = "type", default_value = "static")]
        host_type: String,
        #[arg(long)]
        alias: Vec<String>,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        no_ssl: bool,
    },
    DeleteHost {
        domain: String,
    },
    RenameHost {
        old: String,
        new: String,
    },
    /// 生成并应用服务器配置
    Generate,
    Status,
    /// 持续输出状态变化，Ctrl-C 结束
    WatchStatus,
    /// start / stop / restart / switch
    Control {
        action: String,
        service: String,
        #[arg(long)]
        version: Option<String>,
    },
    /// 提权执行命令
    Exec {
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    DetectStacks,
    Platform,
    SetStack {
        stack: String,
    },
    /// MySQL 客户端是否可用
    MysqlCheck,
    MysqlUsers {
        #[command(flatten)]
        root: RootPassword,
    },
    MysqlCreateUser {
        username: String,
        #[arg(long, env = "LHM_MYSQL_USER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "localhost")]
        host: String,
        /// 授予全部权限（默认只授予 SELECT）
        #[arg(long)]
        grant_all: bool,
        #[command(flatten)]
        root: RootPassword,
    },
    MysqlDeleteUser {
        username: String,
        #[arg(long, default_value = "localhost")]
        host: String,
        #[command(flatten)]
        root: RootPassword,
    },
    MysqlRootPassword {
        #[arg(long, env = "LHM_MYSQL_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
        #[command(flatten)]
        root: RootPassword,
    },
}

/// 优先用环境变量传入，避免密码出现在 shell 历史中
#[derive(Debug, clap::Args)]
struct RootPassword {
    #[arg(long = "root-password", env = "LHM_MYSQL_ROOT_PASSWORD", hide_env_values = true, default_value = "")]
    value: String,
}

#[derive(Serialize)]
struct Message<'a> {
    message: &'a str,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_message(message: &str) -> Result<()> {
    print_json(&Message { message })
}

fn load_config(cli: &Cli) -> AppConfig {
    let mut config = AppConfig::from_env();
    if let Some(stack) = &cli.stack {
        config.stack = Some(stack.clone());
    }
    if let Some(home) = &cli.home {
        config.data_dir = home.clone();
    }
    if let Some(path) = &cli.hosts_file {
        config.hosts_file = Some(path.clone());
    }
    if let Some(path) = &cli.vhost_file {
        config.vhost_file = Some(path.clone());
    }
    if let Some(path) = &cli.ssl_dir {
        config.ssl_dir = Some(path.clone());
    }
    config
}

/// 安装输出转发到 stderr
fn spawn_log_printer() -> broadcast::Sender<LogLine> {
    let (tx, mut rx) = broadcast::channel::<LogLine>(256);
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(line) => eprintln!("[{}] {}", line.stream, line.content),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Install output lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    tx
}

fn read_host_file(file: &PathBuf) -> Result<serde_json::Value> {
    let content = if file.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read hosts from stdin")?
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?
    };
    serde_json::from_str(&content).context("Hosts file is not valid JSON")
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli);
    let mut api = Api::load(config).await?;

    match cli.command {
        Command::AvailableVersions { package } => {
            print_json(&api.get_available_versions(package.into()).await?)?
        }
        Command::InstalledVersions { package } => {
            print_json(&api.get_installed_versions(package.into()).await?)?
        }
        Command::Install { version, package } => {
            let tx = spawn_log_printer();
            let message = api.install_package(package.into(), &version, Some(tx)).await?;
            print_message(&message)?
        }
        Command::Uninstall { version, package } => {
            let tx = spawn_log_printer();
            let message = api
                .uninstall_package(package.into(), &version, Some(tx))
                .await?;
            print_message(&message)?
        }
        Command::CurrentVersion { package } => {
            print_message(&api.get_current_version(package.into()).await?)?
        }
        Command::PhpConfig { version } => print_json(&api.get_php_config(&version).await?)?,
        Command::SetIni { version, key, value } => {
            api.update_php_ini_setting(&version, &key, &value).await?;
            print_message(&format!("{} updated", key))?
        }
        Command::ToggleExtension {
            version,
            extension,
            disable,
        } => {
            api.toggle_php_extension(&version, &extension, !disable).await?;
            let state = if disable { "disabled" } else { "enabled" };
            print_message(&format!("{} {}", extension, state))?
        }
        Command::Hosts => print_json(&api.get_virtual_hosts().await?)?,
        Command::SaveHosts { file } => {
            let raw = read_host_file(&file)?;
            let (hosts, _) = normalize_host_map(raw)
                .map_err(|detail| CoreError::InvalidArgument(format!("hosts JSON: {}", detail)))?;
            api.save_virtual_hosts(&hosts).await?;
            print_message(&format!("Saved {} host(s)", hosts.len()))?
        }
        Command::AddHost {
            domain,
            docroot,
            host_type,
            alias,
            group,
            no_ssl,
        } => {
            let mut host = VirtualHost::new(&domain, docroot)
                .with_type(host_type)
                .with_ssl(!no_ssl);
            for value in alias {
                host = host.with_alias(value);
            }
            if let Some(group) = group {
                host.group = group;
            }
            api.add_host(host).await?;
            print_message(&format!("{} saved", domain))?
        }
        Command::DeleteHost { domain } => {
            api.delete_host(&domain).await?;
            print_message(&format!("{} deleted", domain))?
        }
        Command::RenameHost { old, new } => {
            api.rename_host(&old, &new).await?;
            print_message(&format!("{} renamed to {}", old, new))?
        }
        Command::Generate => print_json(&api.apply_configs().await?)?,
        Command::Status => print_json(&api.get_services_status().await)?,
        Command::WatchStatus => {
            let handle = api.watch_services_status();
            let mut status_rx = handle.subscribe();
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = status_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let status = *status_rx.borrow_and_update();
                        println!("{}", serde_json::to_string(&status)?);
                    }
                }
            }
        }
        Command::Control {
            action,
            service,
            version,
        } => {
            let message = api
                .control_service(&action, &service, version.as_deref())
                .await?;
            print_message(&message)?
        }
        Command::Exec { command, args } => {
            print_json(&api.execute_with_privileges(&command, &args).await?)?
        }
        Command::DetectStacks => print_json(&api.detect_installed_stacks().await)?,
        Command::Platform => print_json(&api.detect_platform())?,
        Command::SetStack { stack } => {
            api.set_stack(&stack).await?;
            print_message(&format!("Stack set to {}", stack))?
        }
        Command::MysqlCheck => print_json(&api.check_mysql_connection().await?)?,
        Command::MysqlUsers { root } => print_json(&api.get_mysql_users(&root.value).await?)?,
        Command::MysqlCreateUser {
            username,
            password,
            host,
            grant_all,
            root,
        } => {
            api.create_mysql_user(&root.value, &username, &password, &host, grant_all)
                .await?;
            print_message(&format!("User {}@{} created", username, host))?
        }
        Command::MysqlDeleteUser { username, host, root } => {
            api.delete_mysql_user(&root.value, &username, &host).await?;
            print_message(&format!("User {}@{} deleted", username, host))?
        }
        Command::MysqlRootPassword { new_password, root } => {
            api.change_mysql_root_password(&root.value, &new_password).await?;
            print_message("MySQL root password changed")?
        }
    }
    Ok(())
}

fn report(error: &anyhow::Error) {
    let response = match error.downcast_ref::<CoreError>() {
        Some(core) => core.to_response(),
        None => ErrorResponse::new("internal_error", format!("{:#}", error)),
    };
    match serde_json::to_string(&response) {
        Ok(json) => eprintln!("{}", json),
        Err(_) => eprintln!("{:#}", error),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report(&anyhow::Error::new(e).context("Failed to create runtime"));
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}
