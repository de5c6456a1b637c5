//! 基础设施模块
//!
//! 封装外部依赖（进程执行、文件写入）

pub mod command;
pub mod fs;

pub use command::{CommandExecutor, CommandOutput, CommandRunner, ExecOptions};
