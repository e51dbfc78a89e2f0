//! run 命令
//!
//! 启动电机并进入轮询循环：
//! 检查状态 → 按恢复策略处理故障 → 位置计数器清零 → 等待下一个周期。
//! Ctrl-C 退出循环，关闭驱动级并释放端口。

use crate::connection::{Connection, ConnectionArgs};
use anyhow::{Context, Result, bail};
use clap::Args;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tmc_sdk::StepperMotor;
use tmc_sdk::uart::UartTransport;
use tracing::{debug, error, info, warn};

/// 轮询命令参数
#[derive(Args, Debug, Clone)]
pub struct RunCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 目标速度（转/秒）
    #[arg(short, long, default_value_t = 2.5)]
    pub rps: f64,

    /// 轮询周期（毫秒）
    #[arg(short, long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// 速度偏离目标时也视为故障
    #[arg(long)]
    pub velocity_check: bool,

    /// 运行指定周期数后退出（默认一直运行）
    #[arg(long)]
    pub cycles: Option<u64>,
}

/// 一次运行的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub tolerated: u64,
    pub resets: u64,
    pub failed_resets: u64,
}

impl RunCommand {
    pub fn execute(&self) -> Result<()> {
        if self.interval_ms == 0 {
            bail!("interval must be greater than 0");
        }

        let running = Arc::new(AtomicBool::new(true));
        {
            let running = Arc::clone(&running);
            ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
                .context("Failed to install Ctrl-C handler")?;
        }

        let summary = match self.connection.open()? {
            Connection::Serial(motor) => self.run_loop(motor, &running)?,
            Connection::Simulated(motor, _device) => self.run_loop(motor, &running)?,
        };

        println!(
            "Cycles: {}, tolerated faults: {}, resets: {} ({} failed)",
            summary.cycles, summary.tolerated, summary.resets, summary.failed_resets
        );
        Ok(())
    }

    pub fn run_loop<T: UartTransport>(
        &self,
        mut motor: StepperMotor<T>,
        running: &AtomicBool,
    ) -> Result<RunSummary> {
        motor
            .start(self.rps)
            .with_context(|| format!("Failed to start motor on {}", motor.port_name()))?;
        motor.enable_stall_exception(true);
        motor.enable_velocity_exception(self.velocity_check);
        println!("Motor running at {} RPS on {} (Ctrl-C to stop)", self.rps, motor.port_name());

        let started = Instant::now();
        let interval = Duration::from_millis(self.interval_ms);
        let mut summary = RunSummary::default();

        while running.load(Ordering::SeqCst) && self.cycles.is_none_or(|max| summary.cycles < max) {
            match motor.check_status() {
                Ok(status) => debug!("Status: {}", status),
                Err(e) if e.is_tolerable() => summary.tolerated += 1,
                Err(e) => {
                    warn!("{}, resetting motor", e);
                    summary.resets += 1;
                    match motor.reset(self.rps) {
                        Ok(()) => motor.enable_stall_exception(true),
                        Err(e) => {
                            error!("Reset failed: {}", e);
                            summary.failed_resets += 1;
                        },
                    }
                },
            }

            if let Err(e) = motor.reset_position_counter() {
                warn!("Failed to reset position counter: {}", e);
            }

            summary.cycles += 1;
            info!("Elapsed time: {:.1} s", started.elapsed().as_secs_f64());
            sleep_while_running(interval, running);
        }

        println!("{}", motor.metrics());
        motor.close().context("Failed to close motor")?;
        Ok(summary)
    }
}

/// 分段睡眠，收到 Ctrl-C 时尽快返回
fn sleep_while_running(duration: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmc_sdk::protocol::Register;

    fn command(cycles: u64) -> RunCommand {
        RunCommand {
            connection: ConnectionArgs {
                port: None,
                baud: 115_200,
                strip_echo: false,
                config: None,
                simulate: true,
            },
            rps: 2.5,
            interval_ms: 1,
            velocity_check: false,
            cycles: Some(cycles),
        }
    }

    #[test]
    fn test_run_loop_healthy() {
        let cmd = command(3);
        let Connection::Simulated(motor, device) = cmd.connection.open().unwrap() else {
            panic!("expected simulated connection");
        };

        let summary = cmd.run_loop(motor, &AtomicBool::new(true)).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                cycles: 3,
                ..Default::default()
            }
        );
        // 关闭时驱动级被关闭
        assert_eq!(device.register(Register::ChopConf), Some(0x0001_00C0));
        assert_eq!(device.register(Register::XActual), Some(0));
    }

    #[test]
    fn test_run_loop_resets_on_fault() {
        let cmd = command(2);
        let Connection::Simulated(motor, device) = cmd.connection.open().unwrap() else {
            panic!("expected simulated connection");
        };
        // A 相对地短路：每个周期都会复位
        device.set_register(Register::DrvStatus, 1 << 27);

        let summary = cmd.run_loop(motor, &AtomicBool::new(true)).unwrap();
        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.resets, 2);
        assert_eq!(summary.failed_resets, 0);
    }

    #[test]
    fn test_run_loop_tolerates_stall() {
        let cmd = command(2);
        let Connection::Simulated(motor, device) = cmd.connection.open().unwrap() else {
            panic!("expected simulated connection");
        };
        device.set_register(Register::DrvStatus, 0x0100_0000);

        let summary = cmd.run_loop(motor, &AtomicBool::new(true)).unwrap();
        assert_eq!(summary.tolerated, 2);
        assert_eq!(summary.resets, 0);
    }

    #[test]
    fn test_stopped_before_first_cycle() {
        let cmd = command(10);
        let Connection::Simulated(motor, _device) = cmd.connection.open().unwrap() else {
            panic!("expected simulated connection");
        };
        let summary = cmd.run_loop(motor, &AtomicBool::new(false)).unwrap();
        assert_eq!(summary.cycles, 0);
    }
}
