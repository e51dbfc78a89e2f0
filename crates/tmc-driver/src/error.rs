//! 驱动层错误类型定义
//!
//! 错误分为三类：
//! - 通信错误（端口不可用、打开失败、应答超时、空应答）：可重试
//! - 数据损坏（长度错误、同步字节/地址错误、CRC 不匹配）：上报，不自动重试
//! - 设备错误（速度非法、回读不一致、失速、过温、开路、对地短路、速度超出范围）
//!
//! 失速和过温预警可以容忍，其余设备错误需要复位电机。

use crate::config::ConfigError;
use thiserror::Error;
use tmc_protocol::{DecodeError, ProtocolError, Register};
use tmc_uart::UartError;

/// 通信错误
#[derive(Error, Debug)]
pub enum CommError {
    /// 传输层错误（无可用端口、打开失败、写失败）
    #[error("{0}")]
    Transport(#[from] UartError),

    /// 等待应答超时
    #[error("Waiting time expired: {0}")]
    Timeout(&'static str),

    /// 设备没有返回任何数据（例如电源断开）
    #[error("Empty reply")]
    EmptyReply,

    #[error("Failed to close serial port")]
    CloseFailed,

    #[error("Serial port is not open")]
    NotOpen,
}

/// 数据损坏错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataCorruptError {
    #[error("Data is incomplete: expected {expected} bytes, got {actual}")]
    Incomplete { expected: usize, actual: usize },

    #[error("Data is corrupt: sync + slave address (0x{sync:02X}, 0x{address:02X})")]
    BadSyncOrAddress { sync: u8, address: u8 },

    #[error("Data is corrupt: no CRC match (computed 0x{computed:02X}, received 0x{received:02X})")]
    CrcMismatch { computed: u8, received: u8 },

    /// 应答寄存器与请求不符，状态无法解析
    #[error("No motor status available")]
    NoStatus,
}

/// 设备错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceFault {
    #[error("Unacceptable velocity value: {rps} RPS (allowed {min}..={max})")]
    InvalidVelocity { rps: f64, min: f64, max: f64 },

    #[error("Configuration values could not be read back correctly ({register}: {detail})")]
    ConfigReadbackFailed { register: Register, detail: String },

    #[error("Motor velocity too low ({actual_rps:.3} RPS, desired {desired_rps:.3} RPS)")]
    VelocityTooLow { actual_rps: f64, desired_rps: f64 },

    #[error("Motor velocity too high ({actual_rps:.3} RPS, desired {desired_rps:.3} RPS)")]
    VelocityTooHigh { actual_rps: f64, desired_rps: f64 },

    #[error("Stall detected!")]
    Stall,

    #[error("Overtemperature pre-warning threshold is exceeded")]
    OverTemperaturePrewarning,

    #[error("Overtemperature!")]
    OverTemperature,

    #[error("Open load detected on Phase A!")]
    OpenLoadA,

    #[error("Open load detected on Phase B!")]
    OpenLoadB,

    #[error("Short to ground detected on Phase A!")]
    ShortToGroundA,

    #[error("Short to ground detected on Phase B!")]
    ShortToGroundB,
}

impl DeviceFault {
    /// 可容忍的故障：电机继续运行，不需要复位
    pub fn is_tolerable(&self) -> bool {
        matches!(self, DeviceFault::Stall | DeviceFault::OverTemperaturePrewarning)
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Communication,
    DataCorrupt,
    Device,
    /// 调用方用法错误（寄存器权限、配置文件）
    Usage,
}

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Communication error: {0}")]
    Communication(#[from] CommError),

    #[error("{0}")]
    DataCorrupt(#[from] DataCorruptError),

    #[error("Driver error: {0}")]
    Device(#[from] DeviceFault),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DriverError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DriverError::Communication(_) => ErrorCategory::Communication,
            DriverError::DataCorrupt(_) => ErrorCategory::DataCorrupt,
            DriverError::Device(_) => ErrorCategory::Device,
            DriverError::Protocol(_) | DriverError::Config(_) => ErrorCategory::Usage,
        }
    }

    /// 通信错误可以直接重试（端口未打开除外）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DriverError::Communication(
                CommError::Timeout(_) | CommError::EmptyReply | CommError::Transport(_)
            )
        )
    }

    /// 可容忍的设备故障（失速、过温预警）
    pub fn is_tolerable(&self) -> bool {
        matches!(self, DriverError::Device(fault) if fault.is_tolerable())
    }

    /// 是否需要复位电机才能恢复
    ///
    /// 非法速度是调用方参数错误，复位也无法恢复，因此不在此列。
    pub fn requires_reset(&self) -> bool {
        match self {
            DriverError::Device(DeviceFault::InvalidVelocity { .. }) => false,
            DriverError::Device(fault) => !fault.is_tolerable(),
            DriverError::Communication(CommError::NotOpen) => false,
            DriverError::Communication(_) | DriverError::DataCorrupt(_) => true,
            DriverError::Protocol(_) | DriverError::Config(_) => false,
        }
    }

    /// 设备故障（如有）
    pub fn device_fault(&self) -> Option<&DeviceFault> {
        match self {
            DriverError::Device(fault) => Some(fault),
            _ => None,
        }
    }
}

impl From<DecodeError> for DriverError {
    fn from(error: DecodeError) -> Self {
        match error {
            DecodeError::NullOrEmpty => CommError::EmptyReply.into(),
            DecodeError::WrongLength { expected, actual } => {
                DataCorruptError::Incomplete { expected, actual }.into()
            }
            DecodeError::BadSyncOrAddress { sync, address } => {
                DataCorruptError::BadSyncOrAddress { sync, address }.into()
            }
            DecodeError::CrcMismatch { computed, received } => {
                DataCorruptError::CrcMismatch { computed, received }.into()
            }
        }
    }
}

impl From<UartError> for DriverError {
    fn from(error: UartError) -> Self {
        DriverError::Communication(CommError::Transport(error))
    }
}
