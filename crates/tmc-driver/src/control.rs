//! 电机控制时序
//!
//! 负责芯片配置、启动、状态轮询、速度更新和故障恢复。
//!
//! # 连续旋转
//!
//! 芯片工作在位置模式下，目标位置设为一个很远的值（默认 0x0009_9000）。
//! 调用方周期性地调用 [`MotorControl::reset_position_counter`] 把 XACTUAL 清零，
//! 电机就永远到不了目标，表现为连续旋转。通信一旦中断，
//! 电机会在目标位置按斜坡参数减速停下。

use crate::config::DriverConfig;
use crate::coordinator::Coordinator;
use crate::error::{CommError, DataCorruptError, DeviceFault, DriverError};
use crate::metrics::{LinkMetrics, LinkMetricsSnapshot};
use crate::power::{NoPowerCycle, PowerCycle};
use crate::state::{MotorSession, SessionState};
use std::sync::Arc;
use tmc_protocol::{MotorStatus, Register, StatusKind, microsteps_to_rps, rps_to_microsteps};
use tmc_uart::UartTransport;
use tracing::{debug, info, warn};

/// 电机控制器
pub struct MotorControl<T: UartTransport> {
    coordinator: Coordinator<T>,
    config: DriverConfig,
    session: MotorSession,
    state: SessionState,
    power: Box<dyn PowerCycle>,
    metrics: Arc<LinkMetrics>,
}

impl<T: UartTransport> MotorControl<T> {
    /// 使用默认配置创建
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, DriverConfig::default())
    }

    pub fn with_config(transport: T, config: DriverConfig) -> Self {
        let metrics = Arc::new(LinkMetrics::new());
        let coordinator = Coordinator::new(
            transport,
            config.slave_address,
            config.reply_timeout(),
            config.write_settle(),
            Arc::clone(&metrics),
        );

        Self {
            coordinator,
            config,
            session: MotorSession::default(),
            state: SessionState::Uninitialized,
            power: Box::new(NoPowerCycle),
            metrics,
        }
    }

    /// 设置复位时使用的电源循环实现
    pub fn with_power_cycle(mut self, power: impl PowerCycle + 'static) -> Self {
        self.power = Box::new(power);
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> MotorSession {
        self.session
    }

    pub fn metrics(&self) -> LinkMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn link_metrics(&self) -> Arc<LinkMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn port_name(&self) -> String {
        self.coordinator.port_name()
    }

    pub fn is_open(&self) -> bool {
        self.coordinator.is_open()
    }

    fn validate_velocity(&self, rps: f64) -> Result<(), DriverError> {
        let (min, max) = (self.config.min_velocity_rps, self.config.max_velocity_rps);
        // NaN 不满足任何比较，会被拒绝
        if rps >= min && rps <= max {
            Ok(())
        } else {
            Err(DeviceFault::InvalidVelocity { rps, min, max }.into())
        }
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.coordinator.is_open() {
            Ok(())
        } else {
            Err(CommError::NotOpen.into())
        }
    }

    /// 记录错误后的状态变化
    fn track<R>(&mut self, result: Result<R, DriverError>) -> Result<R, DriverError> {
        if let Err(e) = &result {
            if e.requires_reset() && self.state == SessionState::Running {
                warn!("Motor faulted: {}", e);
                self.state = SessionState::Faulted;
            }
        }
        result
    }

    /// 只打开传输，不写配置
    ///
    /// 用于查询一个已经在运行的芯片的状态。
    pub fn connect(&mut self) -> Result<(), DriverError> {
        if !self.coordinator.is_open() {
            self.coordinator.open()?;
        }
        Ok(())
    }

    /// 初始化并启动电机
    ///
    /// 1. 校验速度（`min ≤ rps ≤ max`）
    /// 2. 打开传输
    /// 3. 写入启动配置，回读校验
    /// 4. 写入目标位置，电机开始旋转
    pub fn initialize(&mut self, rps: f64) -> Result<(), DriverError> {
        self.validate_velocity(rps)?;
        self.coordinator.open()?;

        self.session.desired_rps = rps;
        self.state = SessionState::Configuring;
        info!("Initialize motor driver at {:.3} RPS on {}", rps, self.coordinator.port_name());

        let result = self
            .configure(rps)
            .and_then(|_| self.verify_configuration())
            .and_then(|_| self.rotate_to_target_position());
        self.finish_configuring(result)
    }

    /// 复位电机：电源循环，重新配置并启动
    pub fn reset(&mut self, rps: f64) -> Result<(), DriverError> {
        self.validate_velocity(rps)?;
        info!("Resetting motor ...");
        self.power.power_cycle()?;

        if !self.coordinator.is_open() {
            self.coordinator.open()?;
        }

        self.session.desired_rps = rps;
        self.state = SessionState::Configuring;

        let result = self
            .configure(rps)
            .and_then(|_| self.verify_configuration())
            .and_then(|_| self.reset_position_counter())
            .and_then(|_| self.rotate_to_target_position());
        self.finish_configuring(result)
    }

    fn finish_configuring(&mut self, result: Result<(), DriverError>) -> Result<(), DriverError> {
        match result {
            Ok(()) => {
                self.state = SessionState::Running;
                info!("Configuration ok, motor running");
                Ok(())
            },
            Err(e) => {
                warn!("Configuration failed: {}", e);
                self.state = SessionState::Faulted;
                Err(e)
            },
        }
    }

    fn configure(&self, rps: f64) -> Result<(), DriverError> {
        let vmax = rps_to_microsteps(rps);
        for (register, data) in self.config.registers.startup_sequence(vmax) {
            self.coordinator.write_register(register, data)?;
        }
        Ok(())
    }

    /// 回读可读的配置寄存器，与写入值比较
    fn verify_configuration(&self) -> Result<(), DriverError> {
        let checks = self.config.registers.readback_checks();
        for (i, (register, expected)) in checks.iter().copied().enumerate() {
            if i > 0 {
                spin_sleep::sleep(self.config.readback_gap());
            }

            let reply = match self.coordinator.read_reply(register) {
                Ok(reply) => reply,
                Err(DriverError::DataCorrupt(e)) => {
                    return Err(readback_failed(register, e.to_string()));
                },
                Err(DriverError::Communication(CommError::EmptyReply)) => {
                    return Err(readback_failed(register, "empty reply".to_string()));
                },
                Err(e) => return Err(e),
            };

            if reply.register_address != register.address() {
                return Err(readback_failed(
                    register,
                    format!("reply is for register 0x{:02X}", reply.register_address),
                ));
            }
            if reply.data != expected {
                return Err(readback_failed(
                    register,
                    format!("expected 0x{:08X}, read 0x{:08X}", expected, reply.data),
                ));
            }
            debug!("Read back {} = 0x{:08X}", register, reply.data);
        }
        Ok(())
    }

    fn rotate_to_target_position(&self) -> Result<(), DriverError> {
        info!("Rotate to target position 0x{:08X}", self.config.target_position);
        self.coordinator
            .write_register(Register::XTarget, self.config.target_position)
    }

    /// 设置新的目标速度（只写 VMAX）
    pub fn set_velocity(&mut self, rps: f64) -> Result<(), DriverError> {
        self.validate_velocity(rps)?;
        self.ensure_open()?;

        let result = self
            .coordinator
            .write_register(Register::VMax, rps_to_microsteps(rps));
        self.track(result)?;
        self.session.desired_rps = rps;
        info!("Target velocity set to {:.3} RPS", rps);
        Ok(())
    }

    /// 位置计数器清零
    ///
    /// 必须在 XACTUAL 到达目标位置之前周期性调用。
    pub fn reset_position_counter(&self) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.coordinator.write_register(Register::XActual, 0)
    }

    /// 读取状态（不做故障判断）
    ///
    /// 依次读 VACTUAL 和 DRV_STATUS，合并为一个快照。
    pub fn read_status(&mut self) -> Result<MotorStatus, DriverError> {
        self.ensure_open()?;
        let result = self.read_status_inner();
        self.track(result)
    }

    fn read_status_inner(&self) -> Result<MotorStatus, DriverError> {
        let mut status = MotorStatus {
            data_corrupt: true,
            ..Default::default()
        };

        let velocity = self.coordinator.read_reply(Register::VActual)?;
        let velocity_ok = status.apply(StatusKind::Velocity, &velocity);

        let driver = self.coordinator.read_reply(Register::DrvStatus)?;
        let driver_ok = status.apply(StatusKind::DriverError, &driver);

        if !(velocity_ok && driver_ok) {
            warn!(
                "Status replies did not match requests (VACTUAL reply 0x{:02X}, DRV_STATUS reply 0x{:02X})",
                velocity.register_address, driver.register_address
            );
            return Err(DataCorruptError::NoStatus.into());
        }
        Ok(status)
    }

    /// 读取状态并检查故障
    ///
    /// 检查顺序：速度 → 失速 → 过温预警 → 过温 → A/B 相开路 → A/B 相对地短路。
    /// 只返回第一个故障。
    pub fn check_status(&mut self) -> Result<MotorStatus, DriverError> {
        let status = self.read_status()?;
        debug!("Motor status: {}", status);

        match self.evaluate(&status) {
            Some(fault) => {
                if fault.is_tolerable() {
                    warn!("{}", fault);
                } else {
                    warn!("Motor faulted: {}", fault);
                    self.state = SessionState::Faulted;
                }
                Err(fault.into())
            },
            None => Ok(status),
        }
    }

    fn evaluate(&self, status: &MotorStatus) -> Option<DeviceFault> {
        if self.session.velocity_exception {
            let desired_rps = self.session.desired_rps;
            let actual_rps = microsteps_to_rps(status.actual_velocity);
            let lower = self.config.velocity_band_low * desired_rps;
            let upper = self.config.velocity_band_high * desired_rps;
            if actual_rps < lower {
                return Some(DeviceFault::VelocityTooLow {
                    actual_rps,
                    desired_rps,
                });
            }
            if actual_rps > upper {
                return Some(DeviceFault::VelocityTooHigh {
                    actual_rps,
                    desired_rps,
                });
            }
        }

        if status.stall && self.session.stall_exception {
            return Some(DeviceFault::Stall);
        }
        if status.over_temperature_prewarning {
            return Some(DeviceFault::OverTemperaturePrewarning);
        }
        if status.over_temperature {
            return Some(DeviceFault::OverTemperature);
        }
        if status.open_load_a {
            return Some(DeviceFault::OpenLoadA);
        }
        if status.open_load_b {
            return Some(DeviceFault::OpenLoadB);
        }
        if status.short_to_ground_a {
            return Some(DeviceFault::ShortToGroundA);
        }
        if status.short_to_ground_b {
            return Some(DeviceFault::ShortToGroundB);
        }
        None
    }

    /// 关闭驱动级（TOFF = 0），电机失去保持力矩
    ///
    /// 对地短路标志会一直保持，直到软件关闭驱动级。
    pub fn disable_driver(&self) -> Result<(), DriverError> {
        self.ensure_open()?;
        info!("Disabling driver stage");
        self.coordinator
            .write_register(Register::ChopConf, self.config.registers.chopconf_disabled)
    }

    /// 关闭驱动级并释放端口
    pub fn close(&mut self) -> Result<(), DriverError> {
        self.ensure_open()?;
        let disabled = self.disable_driver();
        let closed = self.coordinator.close();
        self.state = SessionState::Closed;

        disabled?;
        if !closed {
            return Err(CommError::CloseFailed.into());
        }
        info!("Motor closed");
        Ok(())
    }

    pub fn enable_stall_exception(&mut self, enable: bool) {
        self.session.stall_exception = enable;
    }

    pub fn enable_velocity_exception(&mut self, enable: bool) {
        self.session.velocity_exception = enable;
    }
}

fn readback_failed(register: Register, detail: String) -> DriverError {
    DeviceFault::ConfigReadbackFailed { register, detail }.into()
}
