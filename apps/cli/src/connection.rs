//! 连接参数
//!
//! 所有命令共用：选择串口或模拟设备，加载驱动配置。

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tmc_sdk::uart::{MockTransport, SerialTransport, SimulatedDevice};
use tmc_sdk::{StepperMotor, StepperMotorBuilder};

/// 连接参数
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// 串口路径（默认使用第一个可用端口）
    #[arg(short, long)]
    pub port: Option<String>,

    /// 波特率
    #[arg(short, long, default_value_t = 115_200)]
    pub baud: u32,

    /// 去掉单线接口回读的请求字节
    #[arg(long)]
    pub strip_echo: bool,

    /// 驱动配置文件（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 使用模拟的 TMC5161，不需要硬件
    #[arg(long)]
    pub simulate: bool,
}

/// 打开的电机
pub enum Connection {
    Serial(StepperMotor<SerialTransport>),
    Simulated(StepperMotor<MockTransport>, SimulatedDevice),
}

impl ConnectionArgs {
    fn builder(&self) -> StepperMotorBuilder {
        let mut builder = StepperMotorBuilder::new()
            .baud_rate(self.baud)
            .strip_echo(self.strip_echo);
        if let Some(port) = &self.port {
            builder = builder.port(port.clone());
        }
        if let Some(path) = &self.config {
            builder = builder.config_file(path.clone());
        }
        builder
    }

    /// 构建电机（端口在 `start` / `connect` 时才打开）
    pub fn open(&self) -> Result<Connection> {
        let builder = self.builder();
        if self.simulate {
            let (motor, device) = builder
                .simulated()
                .context("Failed to build simulated motor")?;
            return Ok(Connection::Simulated(motor, device));
        }
        let motor = builder.build().context("Failed to build motor")?;
        Ok(Connection::Serial(motor))
    }
}
