//! # TMC Protocol
//!
//! TMC5161 单线 UART 数据报协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `crc`: CRC8 校验（多项式 0x07）
//! - `constants`: 协议常量定义
//! - `registers`: 寄存器地址与读写权限
//! - `datagram`: 写访问 / 读请求帧构建，应答帧解析
//! - `status`: 状态寄存器（VACTUAL / DRV_STATUS）位域解析
//!
//! ## 字节序
//!
//! 数据报中的 32 位数据使用大端字节序（MSB 在前）。
//! 本模块提供了字节序转换工具函数。

pub mod constants;
pub mod crc;
pub mod datagram;
pub mod registers;
pub mod status;

// 重新导出常用类型
pub use constants::*;
pub use crc::{crc_of, crc_of_reply, next_crc};
pub use datagram::*;
pub use registers::{Access, Register};
pub use status::*;

use thiserror::Error;

/// 协议层错误类型（帧构建阶段）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 寄存器为只读，不能构建写访问帧
    #[error("Register {register:?} (0x{address:02X}) is not writable")]
    NotWritable { register: Register, address: u8 },

    /// 寄存器为只写，不能构建读请求帧
    #[error("Register {register:?} (0x{address:02X}) is not readable")]
    NotReadable { register: Register, address: u8 },

    /// 未知寄存器地址
    #[error("Unknown register address: 0x{address:02X}")]
    UnknownRegister { address: u8 },
}

/// 应答帧解析错误
///
/// `NullOrEmpty` 表示设备没有应答（例如电源断开），属于通信层故障；
/// 其余变体表示帧在传输中被破坏。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Communication error: no reply data")]
    NullOrEmpty,

    #[error("Data is incomplete: expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("Data is corrupt: sync + master address (got 0x{sync:02X}, 0x{address:02X})")]
    BadSyncOrAddress { sync: u8, address: u8 },

    #[error("Data is corrupt: no CRC match (computed 0x{computed:02X}, received 0x{received:02X})")]
    CrcMismatch { computed: u8, received: u8 },
}

impl DecodeError {
    /// 是否为通信层故障（无应答），而非数据损坏
    pub fn is_no_reply(&self) -> bool {
        matches!(self, DecodeError::NullOrEmpty)
    }
}

/// 字节序转换工具函数
///
/// 数据报使用大端字节序，
/// 这些函数用于在协议层进行字节序转换。
///
/// 大端字节序转 u32
pub fn bytes_to_u32_be(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}

/// u32 转大端字节序
pub fn u32_to_bytes_be(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

/// 以 `0x05, 0x00, ...` 形式格式化字节序列（用于日志）
pub fn format_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02X}", b))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_u32_be() {
        let bytes = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(bytes_to_u32_be(bytes), 0x12345678);
    }

    #[test]
    fn test_bytes_to_u32_be_high_bit() {
        // 最高位为 1 时仍按无符号解析
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(bytes_to_u32_be(bytes), u32::MAX);
    }

    #[test]
    fn test_u32_to_bytes_be() {
        assert_eq!(u32_to_bytes_be(0x000100C3), [0x00, 0x01, 0x00, 0xC3]);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(&[0x05, 0xFF, 0x0A]), "0x05, 0xFF, 0x0A");
        assert_eq!(format_bytes(&[]), "");
    }

    #[test]
    fn test_decode_error_display() {
        let msg = format!("{}", DecodeError::WrongLength { expected: 8, actual: 7 });
        assert!(msg.contains("incomplete"), "message: {}", msg);

        let msg = format!(
            "{}",
            DecodeError::CrcMismatch {
                computed: 0x12,
                received: 0x34
            }
        );
        assert!(msg.contains("no CRC match"), "message: {}", msg);
        assert!(DecodeError::NullOrEmpty.is_no_reply());
        assert!(!DecodeError::WrongLength { expected: 8, actual: 0 }.is_no_reply());
    }
}
