//! 命令执行器
//!
//! 所有外部命令都经由 `CommandExecutor` 执行：
//! - stdout/stderr 分离捕获，可选逐行推送
//! - 超时覆盖等待退出与读取输出两段，到期后杀死子进程
//! - 提权执行（pkexec / osascript / PowerShell RunAs）
//!
//! 非零退出码不是错误，由调用方检查 `CommandOutput::success()`。

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::log::LogLine;
use crate::domain::platform::Platform;
use crate::error::{CoreError, CoreResult};

/// 命令执行结果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// 被信号杀死时为 None
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(exit_code: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// 失败时展示给用户的输出：优先 stderr
    pub fn error_detail(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.clone()
        } else {
            self.stderr.clone()
        }
    }
}

/// 执行选项
#[derive(Clone, Debug, Default)]
pub struct ExecOptions {
    pub elevated: bool,
    pub timeout: Option<Duration>,
    /// 提权时由包装命令转交（Windows RunAs 除外）
    pub env: Vec<(String, String)>,
    /// 写入 stdin 后关闭；为 None 时 stdin 为空
    pub input: Option<String>,
    /// 逐行输出订阅
    pub log_tx: Option<broadcast::Sender<LogLine>>,
}

impl ExecOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn stream_to(mut self, log_tx: Option<broadcast::Sender<LogLine>>) -> Self {
        self.log_tx = log_tx;
        self
    }
}

/// 命令执行抽象，服务层只依赖这个 trait
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        options: &ExecOptions,
    ) -> CoreResult<CommandOutput>;
}

/// 基于 tokio::process 的执行器，不持有可变状态
#[derive(Clone, Debug)]
pub struct CommandRunner {
    platform: Platform,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::for_platform(Platform::current())
    }

    pub fn for_platform(platform: Platform) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl CommandExecutor for CommandRunner {
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        options: &ExecOptions,
    ) -> CoreResult<CommandOutput> {
        let (spawn_program, spawn_args) = if options.elevated {
            if self.platform == Platform::Windows && !options.env.is_empty() {
                warn!(program = %program, "RunAs does not forward environment variables");
            }
            elevate(self.platform, program, args, &options.env)
        } else {
            (program.to_string(), args.to_vec())
        };

        info!(
            program = %program,
            args = ?args,
            elevated = options.elevated,
            "Executing command"
        );

        let mut cmd = Command::new(&spawn_program);
        cmd.args(&spawn_args)
            .stdin(if options.input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &options.env {
            cmd.env(key, value);
        }
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| CoreError::Execution {
            program: spawn_program.clone(),
            source,
        })?;

        if let (Some(input), Some(mut stdin)) = (options.input.clone(), child.stdin.take()) {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    debug!(error = %e, "Failed to write command input");
                }
            });
        }

        let mut stdout_task = tokio::spawn(collect_stream(
            child.stdout.take(),
            "stdout",
            options.log_tx.clone(),
        ));
        let mut stderr_task = tokio::spawn(collect_stream(
            child.stderr.take(),
            "stderr",
            options.log_tx.clone(),
        ));

        // 后台孙进程可能在子进程退出后继续持有管道，读取也要计入超时
        let finished = async {
            let status = child.wait().await;
            let stdout = (&mut stdout_task).await.unwrap_or_default();
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            (status, stdout, stderr)
        };
        let (waited, stdout, stderr) = match options.timeout {
            Some(limit) => match tokio::time::timeout(limit, finished).await {
                Ok(done) => done,
                Err(_) => {
                    warn!(program = %program, timeout_ms = limit.as_millis() as u64, "Command timed out, killing process");
                    if let Err(e) = child.kill().await {
                        debug!(program = %program, error = %e, "Process already exited before kill");
                    }
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(CoreError::ExecutionTimeout {
                        program: program.to_string(),
                        timeout_ms: limit.as_millis() as u64,
                    });
                }
            },
            None => finished.await,
        };
        let status = waited.map_err(|source| CoreError::Execution {
            program: spawn_program.clone(),
            source,
        })?;

        let output = CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        };

        info!(
            program = %program,
            exit_code = ?output.exit_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );

        if options.elevated && privilege_denied(self.platform, &output) {
            warn!(program = %program, "Privilege elevation was denied");
            return Err(CoreError::PrivilegeDenied {
                program: program.to_string(),
                detail: output.error_detail().trim().to_string(),
            });
        }

        Ok(output)
    }
}

/// 读完整个管道；有订阅者时逐行推送
async fn collect_stream<R>(
    reader: Option<R>,
    stream: &'static str,
    log_tx: Option<broadcast::Sender<LogLine>>,
) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return String::new();
    };
    let mut reader = BufReader::new(reader);
    let mut captured = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                captured.extend_from_slice(&line);
                if let Some(tx) = &log_tx {
                    let text = String::from_utf8_lossy(&line);
                    // 没有接收者时发送失败是正常的
                    let _ = tx.send(LogLine::new(stream, text.trim_end_matches(['\r', '\n'])));
                }
            }
            Err(e) => {
                debug!(stream, error = %e, "Stopped reading command output");
                break;
            }
        }
    }

    String::from_utf8_lossy(&captured).into_owned()
}

/// 用平台提权工具包装命令，每次调用都会重新弹出授权
///
/// pkexec 与 `do shell script` 都会清空环境，`env` 通过 `env K=V` 前缀转交。
pub fn elevate(
    platform: Platform,
    program: &str,
    args: &[String],
    env: &[(String, String)],
) -> (String, Vec<String>) {
    match platform {
        Platform::Linux => {
            let mut wrapped = Vec::with_capacity(args.len() + env.len() + 2);
            if !env.is_empty() {
                wrapped.push("env".to_string());
                wrapped.extend(env.iter().map(|(k, v)| format!("{}={}", k, v)));
            }
            wrapped.push(program.to_string());
            wrapped.extend(args.iter().cloned());
            ("pkexec".to_string(), wrapped)
        }
        Platform::MacOs => {
            let assignments: Vec<String> = env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            let prefix = if env.is_empty() { None } else { Some("env") };
            let command_line = prefix
                .into_iter()
                .chain(assignments.iter().map(String::as_str))
                .chain(std::iter::once(program))
                .chain(args.iter().map(String::as_str))
                .map(shell_quote)
                .collect::<Vec<_>>()
                .join(" ");
            let script = format!(
                "do shell script \"{}\" with administrator privileges",
                applescript_escape(&command_line)
            );
            ("osascript".to_string(), vec!["-e".to_string(), script])
        }
        Platform::Windows => {
            let argument_list = if args.is_empty() {
                String::new()
            } else {
                format!(
                    " -ArgumentList {}",
                    args.iter().map(|a| powershell_arg(a)).collect::<Vec<_>>().join(",")
                )
            };
            let script = format!(
                "$p = Start-Process -FilePath {}{} -Verb RunAs -Wait -PassThru -WindowStyle Hidden; exit $p.ExitCode",
                powershell_quote(program),
                argument_list
            );
            (
                "powershell".to_string(),
                vec![
                    "-NoProfile".to_string(),
                    "-NonInteractive".to_string(),
                    "-ExecutionPolicy".to_string(),
                    "Bypass".to_string(),
                    "-Command".to_string(),
                    script,
                ],
            )
        }
    }
}

/// 提权工具报告用户取消 / 拒绝
pub fn privilege_denied(platform: Platform, output: &CommandOutput) -> bool {
    if output.success() {
        return false;
    }
    match platform {
        // pkexec: 126 = 对话框被关闭，127 = 未获授权；被包装的程序也可能以 126/127 退出
        Platform::Linux => {
            matches!(output.exit_code, Some(126) | Some(127))
                && PKEXEC_DENIALS.iter().any(|marker| output.stderr.contains(marker))
        }
        Platform::MacOs => output.stderr.contains("User canceled") || output.stderr.contains("(-128)"),
        Platform::Windows => {
            let stderr = output.stderr.to_ascii_lowercase();
            stderr.contains("canceled by the user") || stderr.contains("cancelled by the user")
        }
    }
}

const PKEXEC_DENIALS: [&str; 3] = [
    "Error executing command as another user",
    "Not authorized",
    "Request dismissed",
];

pub(crate) fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

fn applescript_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn powershell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Start-Process 用空格拼接参数，带空格的参数需要再包一层双引号
fn powershell_arg(arg: &str) -> String {
    if arg.contains(' ') {
        powershell_quote(&format!("\"{}\"", arg))
    } else {
        powershell_quote(arg)
    }
}

/// 测试用的脚本化执行器
#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    /// 一次被记录的调用
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct RecordedCall {
        pub program: String,
        pub args: Vec<String>,
        pub elevated: bool,
        pub env: Vec<(String, String)>,
        pub input: Option<String>,
    }

    impl RecordedCall {
        pub fn command_line(&self) -> String {
            std::iter::once(self.program.as_str())
                .chain(self.args.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ")
        }
    }

    type Handler = Box<dyn Fn(&RecordedCall) -> CoreResult<CommandOutput> + Send + Sync>;

    pub struct ScriptedExecutor {
        handler: Handler,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl ScriptedExecutor {
        pub fn new(
            handler: impl Fn(&RecordedCall) -> CoreResult<CommandOutput> + Send + Sync + 'static,
        ) -> Self {
            Self {
                handler: Box::new(handler),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// 所有命令都以 0 退出
        pub fn succeeding() -> Self {
            Self::new(|_| Ok(ok("")))
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn command_lines(&self) -> Vec<String> {
            self.calls().iter().map(RecordedCall::command_line).collect()
        }
    }

    pub fn ok(stdout: &str) -> CommandOutput {
        CommandOutput::new(Some(0), stdout, "")
    }

    pub fn failed(code: i32, stderr: &str) -> CommandOutput {
        CommandOutput::new(Some(code), "", stderr)
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            program: &str,
            args: &[String],
            options: &ExecOptions,
        ) -> CoreResult<CommandOutput> {
            let call = RecordedCall {
                program: program.to_string(),
                args: args.to_vec(),
                elevated: options.elevated,
                env: options.env.clone(),
                input: options.input.clone(),
            };
            self.calls.lock().unwrap().push(call.clone());
            (self.handler)(&call)
        }
    }
}
