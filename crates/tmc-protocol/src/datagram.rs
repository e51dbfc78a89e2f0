//! 数据报构建与解析
//!
//! 三种帧格式（均为 MSB 在前）：
//!
//! ```text
//! 写访问 (8 字节):  [0x05, slave, reg | 0x80, d3, d2, d1, d0, crc]
//! 读请求 (4 字节):  [0x05, slave, reg, crc]
//! 应答   (8 字节):  [0x05, 0xFF, reg, d3, d2, d1, d0, crc]
//! ```
//!
//! `crc` 总是前面所有字节的 CRC8。

use crate::crc::{crc_of, crc_of_reply};
use crate::registers::Register;
use crate::{
    DecodeError, MASTER_ADDRESS, ProtocolError, READ_REQUEST_LEN, REPLY_FRAME_LEN, SYNC_BYTE,
    WRITE_BIT, WRITE_FRAME_LEN, bytes_to_u32_be, u32_to_bytes_be,
};

/// 构建写访问帧（原始地址版本，不做权限检查）
pub fn encode_write(slave_address: u8, register_address: u8, data: u32) -> [u8; WRITE_FRAME_LEN] {
    let d = u32_to_bytes_be(data);
    let mut frame = [
        SYNC_BYTE,
        slave_address,
        register_address | WRITE_BIT,
        d[0],
        d[1],
        d[2],
        d[3],
        0,
    ];
    frame[7] = crc_of(&frame[..7]);
    frame
}

/// 构建读请求帧（原始地址版本，不做权限检查）
pub fn encode_read(slave_address: u8, register_address: u8) -> [u8; READ_REQUEST_LEN] {
    let mut frame = [SYNC_BYTE, slave_address, register_address, 0];
    frame[3] = crc_of(&frame[..3]);
    frame
}

/// 解析并校验应答帧
///
/// 检查顺序：空数据 → 长度 → 同步字节/主机地址 → CRC。
pub fn decode_reply(bytes: &[u8]) -> Result<ValidatedReply, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::NullOrEmpty);
    }

    let frame: &[u8; REPLY_FRAME_LEN] =
        bytes.try_into().map_err(|_| DecodeError::WrongLength {
            expected: REPLY_FRAME_LEN,
            actual: bytes.len(),
        })?;

    if frame[0] != SYNC_BYTE || frame[1] != MASTER_ADDRESS {
        return Err(DecodeError::BadSyncOrAddress {
            sync: frame[0],
            address: frame[1],
        });
    }

    let computed = crc_of_reply(frame);
    if computed != frame[7] {
        return Err(DecodeError::CrcMismatch {
            computed,
            received: frame[7],
        });
    }

    Ok(ValidatedReply {
        register_address: frame[2],
        data: bytes_to_u32_be([frame[3], frame[4], frame[5], frame[6]]),
    })
}

/// 构建应答帧（用于模拟设备和测试）
pub fn encode_reply(register_address: u8, data: u32) -> [u8; REPLY_FRAME_LEN] {
    let d = u32_to_bytes_be(data);
    let mut frame = [
        SYNC_BYTE,
        MASTER_ADDRESS,
        register_address,
        d[0],
        d[1],
        d[2],
        d[3],
        0,
    ];
    frame[7] = crc_of(&frame[..7]);
    frame
}

/// 写访问数据报
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteDatagram {
    pub register: Register,
    pub data: u32,
    bytes: [u8; WRITE_FRAME_LEN],
}

impl WriteDatagram {
    /// 创建写访问数据报
    ///
    /// # 错误
    /// - `ProtocolError::NotWritable`: 寄存器只读
    pub fn new(slave_address: u8, register: Register, data: u32) -> Result<Self, ProtocolError> {
        if !register.is_writable() {
            return Err(ProtocolError::NotWritable {
                register,
                address: register.address(),
            });
        }
        Ok(Self {
            register,
            data,
            bytes: encode_write(slave_address, register.address(), data),
        })
    }

    /// 待发送的字节
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn crc(&self) -> u8 {
        self.bytes[7]
    }
}

/// 读请求数据报
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub register: Register,
    bytes: [u8; READ_REQUEST_LEN],
}

impl ReadRequest {
    /// 创建读请求数据报
    ///
    /// # 错误
    /// - `ProtocolError::NotReadable`: 寄存器只写
    pub fn new(slave_address: u8, register: Register) -> Result<Self, ProtocolError> {
        if !register.is_readable() {
            return Err(ProtocolError::NotReadable {
                register,
                address: register.address(),
            });
        }
        Ok(Self {
            register,
            bytes: encode_read(slave_address, register.address()),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn crc(&self) -> u8 {
        self.bytes[3]
    }
}

/// 已通过校验的应答帧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidatedReply {
    /// 应答中的寄存器地址（第 3 个字节）
    pub register_address: u8,
    /// 32 位数据（字节 3..=6 按大端拼接）
    pub data: u32,
}

impl ValidatedReply {
    /// 解析寄存器（未知地址返回 `None`）
    pub fn register(&self) -> Option<Register> {
        Register::from_address(self.register_address).ok()
    }

    /// 数据字节（MSB 在前）
    pub fn payload(&self) -> [u8; 4] {
        u32_to_bytes_be(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_write_gconf() {
        let frame = encode_write(0x00, 0x00, 0x0000000C);
        assert_eq!(frame, [0x05, 0x00, 0x80, 0x00, 0x00, 0x00, 0x0C, 0xD9]);
    }

    #[test]
    fn test_encode_write_vmax() {
        let frame = encode_write(0x00, 0x27, 128_000);
        assert_eq!(frame, [0x05, 0x00, 0xA7, 0x00, 0x01, 0xF4, 0x00, 0x9B]);
    }

    #[test]
    fn test_encode_read() {
        assert_eq!(encode_read(0x00, 0x00), [0x05, 0x00, 0x00, 0x48]);
        assert_eq!(encode_read(0x00, 0x6F), [0x05, 0x00, 0x6F, 0x84]);
    }

    #[test]
    fn test_write_datagram_keeps_logical_register() {
        let dg = WriteDatagram::new(0x00, Register::ChopConf, 0x000100C3).unwrap();
        // 写标志只出现在帧里，逻辑寄存器保持 0x6C
        assert_eq!(dg.register.address(), 0x6C);
        assert_eq!(dg.as_bytes()[2], 0xEC);
        assert_eq!(dg.crc(), 0x18);
    }

    #[test]
    fn test_write_datagram_read_only_register() {
        let err = WriteDatagram::new(0x00, Register::DrvStatus, 0).unwrap_err();
        assert!(matches!(err, ProtocolError::NotWritable { address: 0x6F, .. }));
    }

    #[test]
    fn test_read_request_write_only_register() {
        let err = ReadRequest::new(0x00, Register::VMax).unwrap_err();
        assert!(matches!(err, ProtocolError::NotReadable { address: 0x27, .. }));
    }

    #[test]
    fn test_decode_reply_valid() {
        let reply = [0x05, 0xFF, 0x22, 0x00, 0x01, 0xF4, 0x00, 0xA5];
        let decoded = decode_reply(&reply).unwrap();
        assert_eq!(decoded.register_address, 0x22);
        assert_eq!(decoded.data, 128_000);
        assert_eq!(decoded.register(), Some(Register::VActual));
        assert_eq!(decoded.payload(), [0x00, 0x01, 0xF4, 0x00]);
    }

    #[test]
    fn test_decode_reply_empty() {
        assert_eq!(decode_reply(&[]), Err(DecodeError::NullOrEmpty));
    }

    #[test]
    fn test_decode_reply_wrong_length() {
        let reply = [0x05, 0xFF, 0x22, 0x00, 0x01, 0xF4, 0x00];
        assert_eq!(
            decode_reply(&reply),
            Err(DecodeError::WrongLength {
                expected: 8,
                actual: 7
            })
        );

        // 单线接口上可能读到自己发出的 4 字节请求
        let echo = encode_read(0x00, 0x22);
        assert!(matches!(
            decode_reply(&echo),
            Err(DecodeError::WrongLength { actual: 4, .. })
        ));
    }

    #[test]
    fn test_decode_reply_bad_sync() {
        let mut reply = encode_reply(0x22, 1234);
        reply[0] = 0x06;
        assert!(matches!(
            decode_reply(&reply),
            Err(DecodeError::BadSyncOrAddress { sync: 0x06, .. })
        ));
    }

    #[test]
    fn test_decode_reply_bad_master_address() {
        let mut reply = encode_reply(0x22, 1234);
        reply[1] = 0x00;
        assert!(matches!(
            decode_reply(&reply),
            Err(DecodeError::BadSyncOrAddress { address: 0x00, .. })
        ));
    }

    #[test]
    fn test_decode_reply_crc_mismatch() {
        let mut reply = encode_reply(0x6F, 0x2000_0000);
        reply[4] ^= 0x01;
        assert!(matches!(
            decode_reply(&reply),
            Err(DecodeError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_encode_reply_matches_known_frame() {
        assert_eq!(
            encode_reply(0x22, 128_000),
            [0x05, 0xFF, 0x22, 0x00, 0x01, 0xF4, 0x00, 0xA5]
        );
    }
}
