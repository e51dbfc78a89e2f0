//! 驱动配置
//!
//! 所有字段都有默认值（TMC5161 + 200 步电机的调试值），
//! 可以从 TOML 文件部分覆盖。配置只读，不会写回磁盘。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tmc_protocol::{DEFAULT_SLAVE_ADDRESS, RAMP_MODE_POSITION, Register};

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// 写入芯片的寄存器值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterConfig {
    /// GCONF：外部 Rsense 电流检测、使能 stealthChop
    pub gconf: u32,
    /// CHOPCONF：TOFF=3, HSTRT=4, HEND=1, TBL=2, CHM=0
    pub chopconf: u32,
    /// 关闭驱动时写入的 CHOPCONF（TOFF = 0）
    pub chopconf_disabled: u32,
    /// COOLCONF：stallGuard 配置（0 = 默认阈值）
    pub coolconf: u32,
    /// IHOLD_IRUN：IHOLD=1, IRUN=2, IHOLDDELAY=8
    pub ihold_irun: u32,
    pub tpowerdown: u32,
    pub tpwmthrs: u32,
    pub vstart: u32,
    pub a1: u32,
    pub v1: u32,
    pub amax: u32,
    pub dmax: u32,
    pub d1: u32,
    pub vstop: u32,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        Self {
            gconf: 0x0000_000C,
            chopconf: 0x0001_00C3,
            chopconf_disabled: 0x0001_00C0,
            coolconf: 0,
            ihold_irun: 0x0008_0201,
            tpowerdown: 0x0000_000A,
            tpwmthrs: 0x0000_01F4,
            vstart: 1,
            a1: 250,
            v1: 50_000,
            amax: 250,
            dmax: 250,
            d1: 250,
            vstop: 2,
        }
    }
}

impl RegisterConfig {
    /// 启动配置写入顺序
    ///
    /// 位置清零必须在斜坡参数之前，RAMPMODE 最后写入。
    pub fn startup_sequence(&self, vmax: u32) -> [(Register, u32); 17] {
        [
            (Register::Gconf, self.gconf),
            (Register::ChopConf, self.chopconf),
            (Register::CoolConf, self.coolconf),
            (Register::IholdIrun, self.ihold_irun),
            (Register::TpowerDown, self.tpowerdown),
            (Register::TpwmThrs, self.tpwmthrs),
            (Register::XTarget, 0),
            (Register::XActual, 0),
            (Register::VStart, self.vstart),
            (Register::A1, self.a1),
            (Register::V1, self.v1),
            (Register::AMax, self.amax),
            (Register::VMax, vmax),
            (Register::DMax, self.dmax),
            (Register::D1, self.d1),
            (Register::VStop, self.vstop),
            (Register::RampMode, RAMP_MODE_POSITION),
        ]
    }

    /// 配置完成后回读校验的寄存器和期望值
    ///
    /// 大部分配置寄存器只写，只能校验这四个。
    pub fn readback_checks(&self) -> [(Register, u32); 4] {
        [
            (Register::Gconf, self.gconf),
            (Register::ChopConf, self.chopconf),
            (Register::XActual, 0),
            (Register::RampMode, RAMP_MODE_POSITION),
        ]
    }
}

/// 驱动配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// 从机地址
    pub slave_address: u8,
    /// 等待应答的最长时间（毫秒）
    pub reply_timeout_ms: u64,
    /// 每个写访问帧之后的等待时间（毫秒）
    pub write_settle_ms: u64,
    /// 回读校验时两次读请求的间隔（毫秒）
    pub readback_gap_ms: u64,
    /// 旋转目标位置
    ///
    /// 调用方周期性地把 XACTUAL 清零，电机永远到不了这个位置，
    /// 从而表现为连续旋转；一旦通信中断，电机会在此处减速停下。
    pub target_position: u32,
    pub min_velocity_rps: f64,
    pub max_velocity_rps: f64,
    /// 速度下限系数（相对目标速度）
    pub velocity_band_low: f64,
    /// 速度上限系数（相对目标速度）
    pub velocity_band_high: f64,
    pub registers: RegisterConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            slave_address: DEFAULT_SLAVE_ADDRESS,
            reply_timeout_ms: 100,
            write_settle_ms: 5,
            readback_gap_ms: 3,
            target_position: 0x0009_9000,
            min_velocity_rps: 0.0,
            max_velocity_rps: 5.0,
            velocity_band_low: 0.95,
            velocity_band_high: 1.10,
            registers: RegisterConfig::default(),
        }
    }
}

impl DriverConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DriverConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reply_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "reply_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if !(self.min_velocity_rps >= 0.0 && self.min_velocity_rps <= self.max_velocity_rps) {
            return Err(ConfigError::Invalid(format!(
                "velocity limits must satisfy 0 <= min <= max (got {}..={})",
                self.min_velocity_rps, self.max_velocity_rps
            )));
        }
        if !(self.velocity_band_low > 0.0
            && self.velocity_band_low <= 1.0
            && self.velocity_band_high >= 1.0)
        {
            return Err(ConfigError::Invalid(format!(
                "velocity band must satisfy 0 < low <= 1 <= high (got {}, {})",
                self.velocity_band_low, self.velocity_band_high
            )));
        }

        let regs = &self.registers;
        if regs.vstop < regs.vstart {
            return Err(ConfigError::Invalid(format!(
                "VSTOP ({}) must be >= VSTART ({})",
                regs.vstop, regs.vstart
            )));
        }
        // TOFF = CHOPCONF[3:0]
        if regs.chopconf & 0x0F == 0 {
            return Err(ConfigError::Invalid(
                "CHOPCONF must enable the driver (TOFF != 0)".to_string(),
            ));
        }
        if regs.chopconf_disabled & 0x0F != 0 {
            return Err(ConfigError::Invalid(
                "disabled CHOPCONF must have TOFF = 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn write_settle(&self) -> Duration {
        Duration::from_millis(self.write_settle_ms)
    }

    pub fn readback_gap(&self) -> Duration {
        Duration::from_millis(self.readback_gap_ms)
    }
}
