//! config 命令
//!
//! 打印生效的驱动配置（默认值或配置文件合并后的结果）

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tmc_sdk::DriverConfig;

/// 配置查看参数
#[derive(Args, Debug, Clone)]
pub struct ConfigCommand {
    /// 驱动配置文件（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl ConfigCommand {
    pub fn execute(&self) -> Result<()> {
        print!("{}", self.render()?);
        Ok(())
    }

    fn render(&self) -> Result<String> {
        let config = match &self.config {
            Some(path) => DriverConfig::load(path)?,
            None => DriverConfig::default(),
        };
        Ok(config.to_toml_string()?)
    }
}
