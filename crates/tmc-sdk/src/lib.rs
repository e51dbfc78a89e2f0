//! TMC SDK - TMC5161 步进电机驱动 Rust SDK
//!
//! 通过单线 UART 配置 TMC5161，让电机以恒定速度连续旋转，
//! 并周期性监控失速、过温、开路、对地短路和速度偏差。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): CRC8、寄存器表、数据报编解码、状态解码
//! - **传输层** (`uart`): 传输抽象、串口后端、模拟设备
//! - **驱动层** (`driver`): 请求/应答协调、配置时序、状态监控
//! - **高层接口**: [`StepperMotor`]
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use tmc_sdk::prelude::*;
//!
//! # fn main() -> Result<(), DriverError> {
//! tmc_sdk::init_logger!();
//! let mut motor = StepperMotorBuilder::new().build()?;
//! motor.start(2.5)?;
//! let status = motor.check_status()?;
//! println!("{}", status);
//! motor.close()?;
//! # Ok(())
//! # }
//! ```

mod builder;
pub mod logging;
mod motor;
pub mod prelude;

pub use tmc_driver as driver;
pub use tmc_protocol as protocol;
pub use tmc_uart as uart;

pub use builder::StepperMotorBuilder;
pub use motor::StepperMotor;

// 常用类型
pub use tmc_driver::{DriverConfig, DriverError, SessionState};
pub use tmc_protocol::MotorStatus;
