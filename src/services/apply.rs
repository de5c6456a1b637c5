//! 将生成的配置写入磁盘
//!
//! 写入顺序：全部暂存 → 备份 → 重命名/提权复制。提权目标同样先复制到同目录的
//! `.lhm-new` 再 `mv` 覆盖，目标文件不会处于写了一半的状态。任一步失败，已替换的文件
//! 从备份恢复，返回 `ConfigWrite`，不会重启 Apache。
//! 与磁盘内容相同的文件不重写；全部未变时也不重启。

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

use crate::domain::platform::Platform;
use crate::domain::service::{ServiceAction, ServiceKind};
use crate::domain::stack::ManagedFile;
use crate::error::{CoreError, CoreResult};
use crate::infra::command::{shell_quote, CommandExecutor, ExecOptions};
use crate::infra::fs::{read_optional, sibling_path, write_atomic};

use super::controller::ServiceController;
use super::vhost::{merge_managed_block, GeneratedArtifacts};

/// 一次 apply 的结果
#[derive(Clone, Debug, Default, Serialize)]
pub struct ApplyResult {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub restarted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_message: Option<String>,
}

impl ApplyResult {
    /// 给 UI 的一句话总结
    pub fn summary(&self) -> String {
        if self.written.is_empty() {
            return "Configuration is already up to date".to_string();
        }
        let mut summary = format!("Wrote {} configuration file(s)", self.written.len());
        match (&self.restart_message, self.restarted) {
            (Some(message), true) => summary.push_str(&format!("; {}", message)),
            (Some(message), false) => summary.push_str(&format!("; Apache not restarted: {}", message)),
            (None, _) => {}
        }
        summary
    }
}

struct PendingWrite {
    target: PathBuf,
    elevated: bool,
    content: Vec<u8>,
    original: Option<Vec<u8>>,
    staged: PathBuf,
    backup: Option<PathBuf>,
}

pub struct ConfigApplier {
    executor: Arc<dyn CommandExecutor>,
    controller: Arc<ServiceController>,
    platform: Platform,
    staging_dir: PathBuf,
    timeout: Duration,
}

impl ConfigApplier {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        controller: Arc<ServiceController>,
        platform: Platform,
        staging_dir: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            executor,
            controller,
            platform,
            staging_dir,
            timeout,
        }
    }

    pub async fn apply(&self, artifacts: &GeneratedArtifacts) -> CoreResult<ApplyResult> {
        let mut pending = Vec::new();
        let mut unchanged = Vec::new();

        let vhost_original = read_target(&artifacts.vhost_file.path).await?;
        plan(
            &mut pending,
            &mut unchanged,
            &artifacts.vhost_file,
            artifacts.vhost_conf.clone().into_bytes(),
            vhost_original,
        );

        let hosts_original = read_target(&artifacts.hosts_file.path).await?;
        let existing = hosts_original
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default();
        let merged = merge_managed_block(&existing, &artifacts.hosts_block);
        plan(
            &mut pending,
            &mut unchanged,
            &artifacts.hosts_file,
            merged.into_bytes(),
            hosts_original,
        );

        if pending.is_empty() {
            info!("Configuration unchanged, nothing to write");
            return Ok(ApplyResult {
                unchanged,
                ..ApplyResult::default()
            });
        }

        if let Err(e) = self.stage(&mut pending).await {
            self.cleanup(&pending).await;
            return Err(e);
        }
        let committed = self.commit(&pending).await;
        self.cleanup(&pending).await;
        committed?;

        let written: Vec<PathBuf> = pending.iter().map(|p| p.target.clone()).collect();
        info!(files = ?written, "Configuration written");

        let (restarted, restart_message) = match self
            .controller
            .control(ServiceAction::Restart, ServiceKind::Apache, None)
            .await
        {
            Ok(message) => (true, Some(message)),
            Err(CoreError::UnsupportedAction(reason)) => {
                warn!(reason = %reason, "Apache must be restarted manually");
                (false, Some(reason))
            }
            Err(e) => return Err(e),
        };

        Ok(ApplyResult {
            written,
            unchanged,
            restarted,
            restart_message,
        })
    }

    async fn stage(&self, pending: &mut [PendingWrite]) -> CoreResult<()> {
        for (index, write) in pending.iter_mut().enumerate() {
            let name = write
                .target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string());

            write.staged = if write.elevated {
                self.staging_dir.join(format!("{}-{}", index, name))
            } else {
                sibling_path(&write.target, ".lhm-new")
            };
            if let Some(parent) = write.staged.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| CoreError::config_write(&write.target, e))?;
            }
            fs::write(&write.staged, &write.content)
                .await
                .map_err(|e| CoreError::config_write(&write.target, e))?;

            if let Some(original) = &write.original {
                let backup = self.staging_dir.join(format!("{}-{}.bak", index, name));
                fs::create_dir_all(&self.staging_dir)
                    .await
                    .map_err(|e| CoreError::config_write(&write.target, e))?;
                fs::write(&backup, original)
                    .await
                    .map_err(|e| CoreError::config_write(&write.target, e))?;
                write.backup = Some(backup);
            }
        }
        Ok(())
    }

    async fn commit(&self, pending: &[PendingWrite]) -> CoreResult<()> {
        let mut replaced: Vec<&PendingWrite> = Vec::new();

        for write in pending.iter().filter(|w| !w.elevated) {
            if let Err(e) = fs::rename(&write.staged, &write.target).await {
                restore_local(&replaced).await;
                return Err(CoreError::config_write(&write.target, e));
            }
            replaced.push(write);
        }

        let elevated: Vec<&PendingWrite> = pending.iter().filter(|w| w.elevated).collect();
        if !elevated.is_empty() {
            if let Err(e) = self.copy_elevated(&elevated).await {
                restore_local(&replaced).await;
                return Err(e);
            }
        }
        Ok(())
    }

    /// 所有需要提权的文件用一次提权调用复制，只弹一次授权
    async fn copy_elevated(&self, writes: &[&PendingWrite]) -> CoreResult<()> {
        let copies: Vec<(&Path, &Path)> = writes
            .iter()
            .map(|w| (w.staged.as_path(), w.target.as_path()))
            .collect();
        let (program, args) = copy_command(self.platform, &copies, &[]);
        let options = ExecOptions::with_timeout(self.timeout).elevated(true);
        let first_target = &writes[0].target;

        match self.executor.execute(&program, &args, &options).await {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => {
                warn!(exit_code = ?output.exit_code, "Elevated copy failed, restoring backups");
                self.restore_elevated(writes).await;
                Err(CoreError::config_write(first_target, output.error_detail()))
            }
            Err(e @ CoreError::PrivilegeDenied { .. }) => Err(e),
            Err(e) => {
                warn!(error = %e, "Elevated copy did not finish, restoring backups");
                self.restore_elevated(writes).await;
                Err(CoreError::config_write(first_target, e))
            }
        }
    }

    async fn restore_elevated(&self, writes: &[&PendingWrite]) {
        let restores: Vec<(&Path, &Path)> = writes
            .iter()
            .filter_map(|w| w.backup.as_deref().map(|b| (b, w.target.as_path())))
            .collect();
        let temps: Vec<PathBuf> = writes.iter().map(|w| replacement_path(&w.target)).collect();
        let removals: Vec<&Path> = writes
            .iter()
            .filter(|w| w.original.is_none())
            .map(|w| w.target.as_path())
            .chain(temps.iter().map(PathBuf::as_path))
            .collect();

        let (program, args) = copy_command(self.platform, &restores, &removals);
        let options = ExecOptions::with_timeout(self.timeout).elevated(true);
        match self.executor.execute(&program, &args, &options).await {
            Ok(output) if output.success() => {}
            Ok(output) => warn!(stderr = %output.error_detail(), "Failed to restore elevated files"),
            Err(e) => warn!(error = %e, "Failed to restore elevated files"),
        }
    }

    async fn cleanup(&self, pending: &[PendingWrite]) {
        for write in pending {
            for path in std::iter::once(&write.staged).chain(write.backup.as_ref()) {
                if path.as_os_str().is_empty() {
                    continue;
                }
                if let Err(e) = fs::remove_file(path).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %path.display(), error = %e, "Failed to remove staging file");
                    }
                }
            }
        }
    }
}

async fn read_target(path: &Path) -> CoreResult<Option<Vec<u8>>> {
    read_optional(path)
        .await
        .map_err(|e| CoreError::config_write(path, e))
}

fn plan(
    pending: &mut Vec<PendingWrite>,
    unchanged: &mut Vec<PathBuf>,
    file: &ManagedFile,
    content: Vec<u8>,
    original: Option<Vec<u8>>,
) {
    if original.as_deref() == Some(content.as_slice()) {
        unchanged.push(file.path.clone());
        return;
    }
    pending.push(PendingWrite {
        target: file.path.clone(),
        elevated: file.elevated,
        content,
        original,
        staged: PathBuf::new(),
        backup: None,
    });
}

async fn restore_local(replaced: &[&PendingWrite]) {
    for write in replaced {
        let restored = match &write.original {
            Some(original) => write_atomic(&write.target, original).await,
            None => fs::remove_file(&write.target).await,
        };
        match restored {
            Ok(()) => info!(path = %write.target.display(), "Restored original file"),
            Err(e) => warn!(path = %write.target.display(), error = %e, "Failed to restore original file"),
        }
    }
}

/// 提权写入时目标旁边的临时文件
fn replacement_path(target: &Path) -> PathBuf {
    sibling_path(target, ".lhm-new")
}

/// 复制 / 删除组合成一条 shell 命令
///
/// 每个目标先复制到同目录的临时文件，全部复制成功后再逐个重命名覆盖。
pub fn copy_command(platform: Platform, copies: &[(&Path, &Path)], removals: &[&Path]) -> (String, Vec<String>) {
    let temps: Vec<PathBuf> = copies.iter().map(|(_, to)| replacement_path(to)).collect();
    match platform {
        Platform::Windows => {
            let quote = |p: &Path| format!("\"{}\"", p.display());
            let steps: Vec<String> = copies
                .iter()
                .zip(&temps)
                .map(|((from, _), temp)| format!("copy /Y {} {}", quote(from), quote(temp)))
                .chain(
                    copies
                        .iter()
                        .zip(&temps)
                        .map(|((_, to), temp)| format!("move /Y {} {}", quote(temp), quote(to))),
                )
                .chain(removals.iter().map(|p| format!("del /F /Q {}", quote(p))))
                .collect();
            ("cmd".to_string(), vec!["/C".to_string(), steps.join(" && ")])
        }
        Platform::MacOs | Platform::Linux => {
            let quote = |p: &Path| shell_quote(&p.display().to_string());
            let steps: Vec<String> = copies
                .iter()
                .zip(&temps)
                .map(|((from, _), temp)| format!("cp {} {}", quote(from), quote(temp)))
                .chain(
                    copies
                        .iter()
                        .zip(&temps)
                        .map(|((_, to), temp)| format!("mv -f {} {}", quote(temp), quote(to))),
                )
                .chain(removals.iter().map(|p| format!("rm -f {}", quote(p))))
                .collect();
            ("sh".to_string(), vec!["-c".to_string(), steps.join(" && ")])
        }
    }
}
