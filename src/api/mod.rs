//! 命令接口
//!
//! UI 可调用的全部操作，挂在 `Api` 上，按领域拆分到子模块。
//! 返回值都可以直接序列化为 JSON。

pub mod database;
pub mod hosts;
pub mod packages;
pub mod services;
pub mod system;

use crate::config::AppConfig;
use crate::error::CoreResult;
use crate::state::AppState;

pub struct Api {
    state: AppState,
}

impl Api {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// 读取 settings.json 并组装状态
    pub async fn load(config: AppConfig) -> CoreResult<Self> {
        Ok(Self::new(AppState::load(config).await?))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}
