//! 文件写入工具

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 同目录下的临时文件名：`<name>.lhm-tmp`
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("file"));
    name.push(suffix);
    path.with_file_name(name)
}

/// 原子写入：先写临时文件，再重命名覆盖
pub async fn write_atomic(path: &Path, content: impl AsRef<[u8]>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let temp_path = sibling_path(path, ".lhm-tmp");
    fs::write(&temp_path, content).await?;

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }
    Ok(())
}

/// 读取文件，不存在时返回 None
pub async fn read_optional(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
