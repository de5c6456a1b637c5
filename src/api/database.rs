//! MySQL 账户接口
//!
//! root 密码为空字符串时不传密码

use crate::domain::database::MysqlUser;
use crate::error::CoreResult;

use super::Api;

impl Api {
    pub async fn check_mysql_connection(&self) -> CoreResult<bool> {
        self.state.mysql.check_connection().await
    }

    pub async fn get_mysql_users(&self, root_password: &str) -> CoreResult<Vec<MysqlUser>> {
        self.state.mysql.list_users(root_password).await
    }

    /// `grant_all` 为 false 时只授予 SELECT
    pub async fn create_mysql_user(
        &self,
        root_password: &str,
        username: &str,
        password: &str,
        host: &str,
        grant_all: bool,
    ) -> CoreResult<()> {
        self.state
            .mysql
            .create_user(root_password, username, password, host, grant_all)
            .await
    }

    pub async fn delete_mysql_user(&self, root_password: &str, username: &str, host: &str) -> CoreResult<()> {
        self.state.mysql.delete_user(root_password, username, host).await
    }

    pub async fn change_mysql_root_password(&self, current_password: &str, new_password: &str) -> CoreResult<()> {
        self.state
            .mysql
            .change_root_password(current_password, new_password)
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::test_api_with;
    use crate::infra::command::fake::ok;

    #[tokio::test]
    async fn test_mysql_users_go_through_client() {
        let dir = tempfile::tempdir().unwrap();
        let (api, executor) = test_api_with(dir.path(), |_| Ok(ok("root\tlocalhost\n")));

        let users = api.get_mysql_users("pw").await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user, "root");

        api.create_mysql_user("pw", "app", "secret", "localhost", false)
            .await
            .unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| !c.elevated && c.args.contains(&"root".to_string())));
        assert!(calls[1].input.as_deref().unwrap().starts_with("CREATE USER 'app'@'localhost'"));
    }
}
