//! 运行时状态模块
//!
//! 应用状态、host 表存储与服务状态轮询

pub mod app_state;
pub mod host_session;
pub mod host_store;
pub mod poller;

pub use app_state::AppState;
pub use host_session::HostSession;
pub use host_store::HostStore;
pub use poller::{spawn_status_poller, PollHandle};
