//! 电源循环能力
//!
//! 复位电机时先对芯片 VCC_IO 断电再上电，使其完全复位。
//! 硬件上没有接线时使用 [`NoPowerCycle`]，复位只做重新配置。

use crate::DriverError;
use tracing::debug;

/// 芯片电源循环
pub trait PowerCycle: Send {
    fn power_cycle(&mut self) -> Result<(), DriverError>;
}

/// 空实现：不做任何事，直接返回成功
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPowerCycle;

impl PowerCycle for NoPowerCycle {
    fn power_cycle(&mut self) -> Result<(), DriverError> {
        debug!("Power cycle not wired, skipping");
        Ok(())
    }
}

impl<F> PowerCycle for F
where
    F: FnMut() -> Result<(), DriverError> + Send,
{
    fn power_cycle(&mut self) -> Result<(), DriverError> {
        self()
    }
}
