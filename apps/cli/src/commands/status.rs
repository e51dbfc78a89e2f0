//! status 命令
//!
//! 只打开端口并读取状态，不写配置，不做故障判断。

use crate::connection::{Connection, ConnectionArgs};
use anyhow::{Context, Result};
use clap::Args;
use std::time::Duration;
use tmc_sdk::StepperMotor;
use tmc_sdk::uart::UartTransport;

/// 状态查询参数
#[derive(Args, Debug, Clone)]
pub struct StatusCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 读取次数
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u32,

    /// 两次读取的间隔（毫秒）
    #[arg(short, long, default_value_t = 500)]
    pub interval_ms: u64,
}

impl StatusCommand {
    pub fn execute(&self) -> Result<()> {
        match self.connection.open()? {
            Connection::Serial(motor) => self.query(motor),
            Connection::Simulated(motor, _device) => self.query(motor),
        }
    }

    fn query<T: UartTransport>(&self, mut motor: StepperMotor<T>) -> Result<()> {
        motor
            .connect()
            .with_context(|| format!("Failed to open {}", motor.port_name()))?;

        for i in 0..self.count {
            if i > 0 {
                std::thread::sleep(Duration::from_millis(self.interval_ms));
            }
            match motor.read_status() {
                Ok(status) => println!("{}", status),
                Err(e) => println!("Status unavailable: {}", e),
            }
        }

        println!("{}", motor.metrics());
        Ok(())
    }
}
