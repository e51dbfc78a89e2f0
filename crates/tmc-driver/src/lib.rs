//! 驱动层模块
//!
//! 本模块提供 TMC5161 步进电机驱动芯片的控制功能，包括：
//! - 请求/应答协调（同步读、发后即忘写、超时）
//! - 启动配置写入与回读校验
//! - 状态轮询与故障判断
//! - 链路统计
//!
//! # 使用场景
//!
//! 需要自行选择传输层、直接操作寄存器时使用本模块。
//! 大多数用户应该使用 `tmc-sdk` 提供的 `StepperMotor`。

pub mod config;
mod control;
mod coordinator;
mod error;
pub mod metrics;
pub mod power;
pub mod state;

pub use config::{ConfigError, DriverConfig, RegisterConfig};
pub use control::MotorControl;
pub use coordinator::{Coordinator, ReplyDepositor};
pub use error::{CommError, DataCorruptError, DeviceFault, DriverError, ErrorCategory};
pub use metrics::{LinkMetrics, LinkMetricsSnapshot};
pub use power::{NoPowerCycle, PowerCycle};
pub use state::{MotorSession, SessionState};
