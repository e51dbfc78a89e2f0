//! 状态寄存器解析
//!
//! 将已校验的应答帧（寄存器地址 + 32 位数据）映射为 [`MotorStatus`] 字段。
//! 只处理 VACTUAL (0x22) 和 DRV_STATUS (0x6F) 两个寄存器。

use crate::registers::Register;
use crate::{MICROSTEPS_PER_REVOLUTION, ValidatedReply};
use bilge::prelude::*;

/// 请求的状态类型
///
/// 决定应答帧按哪种语义解析；与应答中的寄存器不匹配时不做任何修改。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatusKind {
    /// 实际速度（VACTUAL）
    Velocity,
    /// 驱动错误标志（DRV_STATUS）
    DriverError,
}

impl StatusKind {
    /// 该状态类型对应的寄存器
    pub fn register(self) -> Register {
        match self {
            StatusKind::Velocity => Register::VActual,
            StatusKind::DriverError => Register::DrvStatus,
        }
    }
}

/// DRV_STATUS 寄存器位域
///
/// 数据手册第 52 页：
/// - Bit 0-9: SG_RESULT（stallGuard 测量值）
/// - Bit 12-13: 低边短路（s2vsa / s2vsb）
/// - Bit 14: stealthChop 激活
/// - Bit 15: fullstep 激活
/// - Bit 16-20: CS_ACTUAL（实际电流档位）
/// - Bit 24: stallGuard 标志
/// - Bit 25: 过温
/// - Bit 26: 过温预警
/// - Bit 27-28: A/B 相对地短路
/// - Bit 29-30: A/B 相开路
/// - Bit 31: 静止
///
/// bilge 使用 LSB first 位序，字段自 Bit 0 起依次排列。
#[bitsize(32)]
#[derive(FromBits, DebugBits, Clone, Copy, Default)]
pub struct DrvStatus {
    pub sg_result: u10,
    pub reserved_low: u2,
    pub short_to_supply_a: bool,
    pub short_to_supply_b: bool,
    pub stealth: bool,
    pub fullstep_active: bool,
    pub cs_actual: u5,
    pub reserved_high: u3,
    pub stall_guard: bool,
    pub overtemperature: bool,
    pub overtemperature_prewarning: bool,
    pub short_to_ground_a: bool,
    pub short_to_ground_b: bool,
    pub open_load_a: bool,
    pub open_load_b: bool,
    pub standstill: bool,
}

impl DrvStatus {
    /// 负载确实为零时才算失速
    ///
    /// 仅 stallGuard 标志置位不够：数据字节 2、3（低 16 位）必须全为 0。
    pub fn is_stalled(self) -> bool {
        self.stall_guard() && (u32::from(self) & 0xFFFF) == 0
    }
}

/// 电机状态快照
///
/// 每次状态查询新建；除调用方自行保存外不跨查询保留。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorStatus {
    /// 实际速度（VACTUAL 原始读数，微步/秒）
    ///
    /// 按无符号解析：反转时的负速度会变成很大的正数。
    pub actual_velocity: u32,
    pub data_corrupt: bool,
    pub stall: bool,
    pub over_temperature: bool,
    pub over_temperature_prewarning: bool,
    pub open_load_a: bool,
    pub open_load_b: bool,
    pub short_to_ground_a: bool,
    pub short_to_ground_b: bool,
}

impl MotorStatus {
    /// 按请求的状态类型解析应答帧
    ///
    /// 寄存器未知，或与 `kind` 不匹配时状态保持不变并返回 `false`。
    /// 成功解析后清除 `data_corrupt`。
    pub fn apply(&mut self, kind: StatusKind, reply: &ValidatedReply) -> bool {
        match (kind, reply.register()) {
            (StatusKind::Velocity, Some(Register::VActual)) => {
                self.actual_velocity = reply.data;
            }
            (StatusKind::DriverError, Some(Register::DrvStatus)) => {
                let drv = DrvStatus::from(reply.data);
                self.stall = drv.is_stalled();
                self.over_temperature_prewarning = drv.overtemperature_prewarning();
                self.over_temperature = drv.overtemperature();
                self.open_load_a = drv.open_load_a();
                self.open_load_b = drv.open_load_b();
                self.short_to_ground_a = drv.short_to_ground_a();
                self.short_to_ground_b = drv.short_to_ground_b();
            }
            _ => return false,
        }
        self.data_corrupt = false;
        true
    }

    /// 由单个应答帧构建新的状态快照
    pub fn from_reply(kind: StatusKind, reply: &ValidatedReply) -> Self {
        let mut status = Self::default();
        status.apply(kind, reply);
        status
    }

    /// 实际速度（转/秒）
    pub fn actual_velocity_rps(&self) -> f64 {
        self.actual_velocity as f64 / MICROSTEPS_PER_REVOLUTION as f64
    }

    /// 是否有任一驱动错误标志置位
    pub fn has_driver_error(&self) -> bool {
        self.stall
            || self.over_temperature
            || self.over_temperature_prewarning
            || self.open_load_a
            || self.open_load_b
            || self.short_to_ground_a
            || self.short_to_ground_b
    }
}

impl std::fmt::Display for MotorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "velocity={} usteps/s ({:.3} rps), stall={}, ot={}, otpw={}, ola={}, olb={}, s2ga={}, s2gb={}",
            self.actual_velocity,
            self.actual_velocity_rps(),
            self.stall,
            self.over_temperature,
            self.over_temperature_prewarning,
            self.open_load_a,
            self.open_load_b,
            self.short_to_ground_a,
            self.short_to_ground_b,
        )
    }
}
