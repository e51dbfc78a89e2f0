//! ports 命令
//!
//! 列出系统中的串口

use anyhow::Result;
use clap::Args;
use tmc_sdk::uart::available_ports;

/// 串口枚举参数
#[derive(Args, Debug, Clone)]
pub struct PortsCommand {}

impl PortsCommand {
    pub fn execute(&self) -> Result<()> {
        let ports = available_ports()?;
        if ports.is_empty() {
            println!("No available ports");
            return Ok(());
        }
        for port in ports {
            println!("{:<24} {}", port.name, port.description);
        }
        Ok(())
    }
}
