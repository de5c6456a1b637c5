//! 服务控制接口

use std::sync::Arc;

use crate::domain::service::{ServiceAction, ServicesStatus};
use crate::error::CoreResult;
use crate::state::{spawn_status_poller, PollHandle};

use super::Api;

impl Api {
    pub async fn get_services_status(&self) -> ServicesStatus {
        self.state.controller.status().await
    }

    /// `action` / `service` 使用 UI 传来的字符串，例如 `restart` + `apache`
    pub async fn control_service(
        &self,
        action: &str,
        service: &str,
        version: Option<&str>,
    ) -> CoreResult<String> {
        let action: ServiceAction = action.parse()?;
        let service = service.parse()?;
        self.state.controller.control(action, service, version).await
    }

    /// 按配置的间隔轮询，丢弃返回值即停止
    pub fn watch_services_status(&self) -> PollHandle {
        spawn_status_poller(
            Arc::new(self.state.status_probe()),
            self.state.config.poll_interval,
        )
    }
}
