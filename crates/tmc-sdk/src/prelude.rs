//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use tmc_sdk::prelude::*;
//! ```

// 高层接口
pub use crate::{StepperMotor, StepperMotorBuilder};

// 驱动层
pub use tmc_driver::{DriverConfig, MotorControl, SessionState};

// 传输层（常用 Trait）
pub use tmc_uart::UartTransport;

// 状态
pub use tmc_protocol::MotorStatus;

// 错误类型
pub use tmc_driver::{CommError, DataCorruptError, DeviceFault, DriverError, ErrorCategory};
pub use tmc_protocol::ProtocolError;
pub use tmc_uart::UartError;
