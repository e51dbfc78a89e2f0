//! StepperMotor 构建器

use crate::StepperMotor;
use std::path::PathBuf;
use tmc_driver::{DriverConfig, DriverError};
use tmc_uart::UartTransport;
use tracing::debug;

/// StepperMotor 构建器
///
/// ```rust,no_run
/// use tmc_sdk::StepperMotorBuilder;
///
/// let motor = StepperMotorBuilder::new()
///     .port("/dev/ttyUSB0")
///     .baud_rate(115_200)
///     .build()?;
/// # Ok::<(), tmc_sdk::DriverError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct StepperMotorBuilder {
    /// 串口路径（`None` 时使用第一个可用端口）
    port: Option<String>,
    baud_rate: Option<u32>,
    strip_echo: bool,
    config: Option<DriverConfig>,
    config_file: Option<PathBuf>,
}

impl StepperMotorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }

    /// 接口会回读自己发出的字节时开启
    pub fn strip_echo(mut self, strip_echo: bool) -> Self {
        self.strip_echo = strip_echo;
        self
    }

    pub fn config(mut self, config: DriverConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 从 TOML 文件加载驱动配置（优先于 [`config`](Self::config)）
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    fn resolve_config(&self) -> Result<DriverConfig, DriverError> {
        if let Some(path) = &self.config_file {
            debug!("Loading driver configuration from {}", path.display());
            return Ok(DriverConfig::load(path)?);
        }
        let config = self.config.clone().unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// 使用给定的传输层构建
    pub fn build_with<T: UartTransport>(self, transport: T) -> Result<StepperMotor<T>, DriverError> {
        let config = self.resolve_config()?;
        Ok(StepperMotor::with_config(transport, config))
    }

    /// 使用串口构建（端口在 `start` 时才打开）
    #[cfg(feature = "serial")]
    pub fn build(self) -> Result<StepperMotor<tmc_uart::SerialTransport>, DriverError> {
        let mut serial = tmc_uart::SerialConfig::default().with_strip_echo(self.strip_echo);
        if let Some(port) = &self.port {
            serial = serial.with_port(port.clone());
        }
        if let Some(baud_rate) = self.baud_rate {
            serial = serial.with_baud_rate(baud_rate);
        }
        let transport = tmc_uart::SerialTransport::new(serial);
        self.build_with(transport)
    }

    /// 构建一个连接模拟 TMC5161 的电机
    ///
    /// 返回的 [`SimulatedDevice`](tmc_uart::SimulatedDevice) 可以用来检查写入的寄存器或注入故障。
    #[cfg(feature = "mock")]
    pub fn simulated(
        self,
    ) -> Result<(StepperMotor<tmc_uart::MockTransport>, tmc_uart::SimulatedDevice), DriverError>
    {
        let config = self.resolve_config()?;
        let device = tmc_uart::SimulatedDevice::with_slave_address(config.slave_address);
        let transport = device.transport().with_name("simulated");
        Ok((StepperMotor::with_config(transport, config), device))
    }
}
