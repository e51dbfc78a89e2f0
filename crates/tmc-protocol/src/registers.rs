//! 寄存器地址常量和枚举
//!
//! 只定义驱动实际使用到的 TMC5161 寄存器，并记录每个寄存器的读写权限。
//! 地址取自 TMC5161 数据手册寄存器映射表。

use crate::ProtocolError;

// ============================================================================
// 寄存器地址常量
// ============================================================================

/// 通用配置（RW）
pub const REG_GCONF: u8 = 0x00;

/// 驱动电流控制（W）
pub const REG_IHOLD_IRUN: u8 = 0x10;

/// 静止后电流降低延时（W）
pub const REG_TPOWERDOWN: u8 = 0x11;

/// stealthChop 上限速度阈值（W）
pub const REG_TPWMTHRS: u8 = 0x13;

/// 斜坡模式（RW）
pub const REG_RAMPMODE: u8 = 0x20;

/// 实际位置（RW）
pub const REG_XACTUAL: u8 = 0x21;

/// 实际速度（R，硬件上为有符号数）
pub const REG_VACTUAL: u8 = 0x22;

/// 斜坡参数（W）
pub const REG_VSTART: u8 = 0x23;
pub const REG_A1: u8 = 0x24;
pub const REG_V1: u8 = 0x25;
pub const REG_AMAX: u8 = 0x26;
pub const REG_VMAX: u8 = 0x27;
pub const REG_DMAX: u8 = 0x28;
pub const REG_D1: u8 = 0x2A;
pub const REG_VSTOP: u8 = 0x2B;

/// 目标位置（RW）
pub const REG_XTARGET: u8 = 0x2D;

/// 斩波器与驱动配置（RW）
pub const REG_CHOPCONF: u8 = 0x6C;

/// coolStep / stallGuard 配置（W）
pub const REG_COOLCONF: u8 = 0x6D;

/// stallGuard 状态与驱动错误标志（R）
pub const REG_DRV_STATUS: u8 = 0x6F;

/// 寄存器读写权限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// 只读
    Read,
    /// 只写
    Write,
    /// 可读可写
    ReadWrite,
}

impl Access {
    pub fn is_readable(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// 寄存器枚举
///
/// 逻辑寄存器标识不含写标志位；写标志位 (0x80) 只在构建写访问帧时加到地址字节上。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, num_enum::IntoPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Register {
    Gconf = 0x00,
    IholdIrun = 0x10,
    TpowerDown = 0x11,
    TpwmThrs = 0x13,
    RampMode = 0x20,
    XActual = 0x21,
    VActual = 0x22,
    VStart = 0x23,
    A1 = 0x24,
    V1 = 0x25,
    AMax = 0x26,
    VMax = 0x27,
    DMax = 0x28,
    D1 = 0x2A,
    VStop = 0x2B,
    XTarget = 0x2D,
    ChopConf = 0x6C,
    CoolConf = 0x6D,
    DrvStatus = 0x6F,
}

impl Register {
    /// 寄存器地址（不含写标志位）
    pub fn address(self) -> u8 {
        self.into()
    }

    /// 由地址字节解析寄存器（会先去掉写标志位）
    pub fn from_address(address: u8) -> Result<Self, ProtocolError> {
        let address = address & !crate::WRITE_BIT;
        Self::try_from(address).map_err(|_| ProtocolError::UnknownRegister { address })
    }

    /// 读写权限
    pub fn access(self) -> Access {
        match self {
            Register::Gconf
            | Register::RampMode
            | Register::XActual
            | Register::XTarget
            | Register::ChopConf => Access::ReadWrite,
            Register::VActual | Register::DrvStatus => Access::Read,
            Register::IholdIrun
            | Register::TpowerDown
            | Register::TpwmThrs
            | Register::VStart
            | Register::A1
            | Register::V1
            | Register::AMax
            | Register::VMax
            | Register::DMax
            | Register::D1
            | Register::VStop
            | Register::CoolConf => Access::Write,
        }
    }

    pub fn is_readable(self) -> bool {
        self.access().is_readable()
    }

    pub fn is_writable(self) -> bool {
        self.access().is_writable()
    }

    /// 数据手册中的寄存器名称
    pub fn name(self) -> &'static str {
        match self {
            Register::Gconf => "GCONF",
            Register::IholdIrun => "IHOLD_IRUN",
            Register::TpowerDown => "TPOWERDOWN",
            Register::TpwmThrs => "TPWMTHRS",
            Register::RampMode => "RAMPMODE",
            Register::XActual => "XACTUAL",
            Register::VActual => "VACTUAL",
            Register::VStart => "VSTART",
            Register::A1 => "A1",
            Register::V1 => "V1",
            Register::AMax => "AMAX",
            Register::VMax => "VMAX",
            Register::DMax => "DMAX",
            Register::D1 => "D1",
            Register::VStop => "VSTOP",
            Register::XTarget => "XTARGET",
            Register::ChopConf => "CHOPCONF",
            Register::CoolConf => "COOLCONF",
            Register::DrvStatus => "DRV_STATUS",
        }
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_addresses() {
        assert_eq!(Register::Gconf.address(), 0x00);
        assert_eq!(Register::VActual.address(), 0x22);
        assert_eq!(Register::D1.address(), 0x2A);
        assert_eq!(Register::XTarget.address(), 0x2D);
        assert_eq!(Register::DrvStatus.address(), 0x6F);
    }

    #[test]
    fn test_from_address_strips_write_bit() {
        assert_eq!(Register::from_address(0xA7).unwrap(), Register::VMax);
        assert_eq!(Register::from_address(0x27).unwrap(), Register::VMax);
    }

    #[test]
    fn test_from_address_unknown() {
        let err = Register::from_address(0x29).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownRegister { address: 0x29 });
    }

    #[test]
    fn test_access_rules() {
        // 回读校验用到的寄存器必须可读
        for reg in [
            Register::Gconf,
            Register::ChopConf,
            Register::XActual,
            Register::RampMode,
        ] {
            assert!(reg.is_readable(), "{} should be readable", reg);
            assert!(reg.is_writable(), "{} should be writable", reg);
        }

        assert!(Register::VActual.is_readable());
        assert!(!Register::VActual.is_writable());
        assert!(Register::DrvStatus.is_readable());
        assert!(!Register::DrvStatus.is_writable());

        assert!(Register::VMax.is_writable());
        assert!(!Register::VMax.is_readable());
        assert!(!Register::CoolConf.is_readable());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Register::ChopConf), "CHOPCONF (0x6C)");
    }
}
