//! MySQL 账户相关领域模型

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// `mysql.user` 中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MysqlUser {
    pub user: String,
    pub host: String,
}

/// MySQL 用户名上限
const MAX_USER_LEN: usize = 32;
const MAX_HOST_LEN: usize = 255;

/// 校验账户名与主机，拼进 SQL 之前调用
pub fn validate_account(username: &str, host: &str) -> CoreResult<()> {
    if username.is_empty() || username.chars().count() > MAX_USER_LEN {
        return Err(CoreError::InvalidArgument(format!(
            "MySQL user name must be 1 to {} characters",
            MAX_USER_LEN
        )));
    }
    if username.chars().any(char::is_control) {
        return Err(CoreError::InvalidArgument(
            "MySQL user name contains control characters".to_string(),
        ));
    }
    let host_ok = !host.is_empty()
        && host.len() <= MAX_HOST_LEN
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%:-".contains(c));
    if !host_ok {
        return Err(CoreError::InvalidArgument(format!(
            "'{}' is not a valid MySQL host",
            host
        )));
    }
    Ok(())
}

/// SQL 字符串字面量
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// `'user'@'host'`
pub fn account(username: &str, host: &str) -> String {
    format!("{}@{}", quote_literal(username), quote_literal(host))
}
