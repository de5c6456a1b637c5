//! MySQL 账户管理
//!
//! 使用栈自带的 `mysql` 客户端以 root 身份执行语句。
//! root 密码经 `MYSQL_PWD` 传入，SQL 写入 stdin，两者都不会出现在进程参数和日志中。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::database::{account, quote_literal, validate_account, MysqlUser};
use crate::domain::service::ServiceKind;
use crate::domain::stack::StackConfig;
use crate::error::{CoreError, CoreResult};
use crate::infra::command::{CommandExecutor, ExecOptions};

pub struct MysqlAdmin {
    executor: Arc<dyn CommandExecutor>,
    stack: Arc<StackConfig>,
    timeout: Duration,
}

impl MysqlAdmin {
    pub fn new(executor: Arc<dyn CommandExecutor>, stack: Arc<StackConfig>, timeout: Duration) -> Self {
        Self {
            executor,
            stack,
            timeout,
        }
    }

    /// 客户端能否运行；找不到客户端时返回 false
    pub async fn check_connection(&self) -> CoreResult<bool> {
        let client = match self.client().await {
            Ok(client) => client,
            Err(CoreError::NotInstalled(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let options = ExecOptions::with_timeout(self.timeout);
        match self
            .executor
            .execute(&client, &["--version".to_string()], &options)
            .await
        {
            Ok(output) => Ok(output.success()),
            Err(CoreError::Execution { program, source }) => {
                debug!(program = %program, error = %source, "MySQL client is not runnable");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn list_users(&self, root_password: &str) -> CoreResult<Vec<MysqlUser>> {
        let stdout = self
            .run_sql(root_password, "SELECT user, host FROM mysql.user;")
            .await?;
        Ok(parse_user_rows(&stdout))
    }

    pub async fn create_user(
        &self,
        root_password: &str,
        username: &str,
        password: &str,
        host: &str,
        grant_all: bool,
    ) -> CoreResult<()> {
        validate_account(username, host)?;
        let target = account(username, host);
        let grant = if grant_all {
            format!("GRANT ALL PRIVILEGES ON *.* TO {} WITH GRANT OPTION;", target)
        } else {
            format!("GRANT SELECT ON *.* TO {};", target)
        };
        let sql = format!(
            "CREATE USER {} IDENTIFIED BY {};\n{}\nFLUSH PRIVILEGES;",
            target,
            quote_literal(password),
            grant
        );
        self.run_sql(root_password, &sql).await?;

        info!(user = %username, host = %host, grant_all, "Created MySQL user");
        Ok(())
    }

    pub async fn delete_user(&self, root_password: &str, username: &str, host: &str) -> CoreResult<()> {
        validate_account(username, host)?;
        self.run_sql(root_password, &format!("DROP USER {};", account(username, host)))
            .await?;

        info!(user = %username, host = %host, "Dropped MySQL user");
        Ok(())
    }

    pub async fn change_root_password(&self, current_password: &str, new_password: &str) -> CoreResult<()> {
        let sql = format!(
            "ALTER USER 'root'@'localhost' IDENTIFIED BY {};",
            quote_literal(new_password)
        );
        self.run_sql(current_password, &sql).await?;

        info!("Changed MySQL root password");
        Ok(())
    }

    async fn run_sql(&self, root_password: &str, sql: &str) -> CoreResult<String> {
        let client = self.client().await?;
        let args: Vec<String> = ["-u", "root", "--batch", "--skip-column-names"]
            .iter()
            .map(|a| a.to_string())
            .collect();
        let mut options = ExecOptions::with_timeout(self.timeout).with_input(sql);
        if !root_password.is_empty() {
            options = options.with_env("MYSQL_PWD", root_password);
        }

        let output = self.executor.execute(&client, &args, &options).await?;
        if !output.success() {
            warn!(exit_code = ?output.exit_code, "MySQL statement failed");
            return Err(CoreError::CommandFailed {
                program: client,
                exit_code: output.exit_code,
                stderr: output.error_detail(),
            });
        }
        Ok(output.stdout)
    }

    /// 第一个存在的客户端路径；裸命令名交给 PATH 解析
    async fn client(&self) -> CoreResult<String> {
        for candidate in self.stack.binary_candidates(ServiceKind::Mysql) {
            let bare = !candidate.contains('/') && !candidate.contains('\\');
            if bare || tokio::fs::try_exists(Path::new(candidate)).await.unwrap_or(false) {
                return Ok(candidate.clone());
            }
        }
        Err(CoreError::NotInstalled("MySQL client".to_string()))
    }
}

/// 解析 `--batch --skip-column-names` 输出：每行 `user\thost`
fn parse_user_rows(stdout: &str) -> Vec<MysqlUser> {
    stdout
        .lines()
        .filter_map(|line| {
            let (user, host) = line.split_once('\t')?;
            Some(MysqlUser {
                user: user.to_string(),
                host: host.trim_end_matches('\r').to_string(),
            })
        })
        .collect()
}
