//! 服务层模块
//!
//! 服务控制、配置生成与应用、包管理、php.ini、MySQL 账户

pub mod apply;
pub mod controller;
pub mod mysql_admin;
pub mod packages;
pub mod php_ini;
pub mod status;
pub mod vhost;

pub use apply::{ApplyResult, ConfigApplier};
pub use controller::ServiceController;
pub use mysql_admin::MysqlAdmin;
pub use packages::PackageBridge;
pub use php_ini::PhpIniManager;
pub use status::{ProcessTableProbe, StatusProbe};
pub use vhost::{generate, GeneratedArtifacts};
