//! CRC8 校验
//!
//! 多项式 `x^8 + x^2 + x + 1`（0x07），初始值 0x00。
//! 每个字节按位折叠，第 `i` 次迭代取数据字节的第 `i` 位（低位在前），
//! 与 TMC5161 数据手册中的参考实现一致。

/// CRC8 生成多项式
pub const CRC8_POLYNOMIAL: u8 = 0x07;

/// 将一个数据字节折叠进 CRC 状态
///
/// 纯函数，无共享状态，可在任意线程并发调用。
#[inline]
pub fn next_crc(crc: u8, data: u8) -> u8 {
    let mut crc = crc;
    for i in 0..=7u32 {
        // 把第 i 位移到最高位，与 CRC 状态最高位比较
        let bit = data.wrapping_shl(7 - i) & 0x80;
        crc = if (crc & 0x80) ^ bit != 0 {
            (crc << 1) ^ CRC8_POLYNOMIAL
        } else {
            crc << 1
        };
    }
    crc
}

/// 计算整段字节的 CRC
pub fn crc_of(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |crc, &b| next_crc(crc, b))
}

/// 计算应答帧的 CRC
///
/// 只折叠前 7 个字节，结果应与 `reply[7]` 相等。
pub fn crc_of_reply(reply: &[u8; 8]) -> u8 {
    crc_of(&reply[..7])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_crc_zero() {
        assert_eq!(next_crc(0x00, 0x00), 0x00);
    }

    /// 数据手册示例：读取 GCONF 的读请求帧 `05 00 00 48`
    #[test]
    fn test_crc_read_gconf_request() {
        assert_eq!(crc_of(&[0x05, 0x00, 0x00]), 0x48);
    }

    #[test]
    fn test_crc_known_frames() {
        // 写 GCONF = 0x0000000C
        assert_eq!(crc_of(&[0x05, 0x00, 0x80, 0x00, 0x00, 0x00, 0x0C]), 0xD9);
        // 写 CHOPCONF = 0x000100C3
        assert_eq!(crc_of(&[0x05, 0x00, 0xEC, 0x00, 0x01, 0x00, 0xC3]), 0x18);
        // 读 DRV_STATUS / VACTUAL 请求
        assert_eq!(crc_of(&[0x05, 0x00, 0x6F]), 0x84);
        assert_eq!(crc_of(&[0x05, 0x00, 0x22]), 0x93);
    }

    #[test]
    fn test_crc_of_reply_ignores_last_byte() {
        let mut reply = [0x05, 0xFF, 0x22, 0x00, 0x01, 0xF4, 0x00, 0x00];
        assert_eq!(crc_of_reply(&reply), 0xA5);
        reply[7] = 0x77;
        assert_eq!(crc_of_reply(&reply), 0xA5);
    }

    #[test]
    fn test_crc_is_deterministic() {
        let bytes = [0x05, 0xFF, 0x6F, 0x12, 0x34, 0x56, 0x78];
        let first = crc_of(&bytes);
        for _ in 0..10 {
            assert_eq!(crc_of(&bytes), first);
        }
    }

    #[test]
    fn test_crc_fold_matches_incremental() {
        let bytes = [0x05, 0x00, 0xA7, 0x00, 0x01, 0xF4, 0x00];
        let mut crc = 0u8;
        for &b in &bytes {
            crc = next_crc(crc, b);
        }
        assert_eq!(crc, crc_of(&bytes));
        assert_eq!(crc, 0x9B);
    }
}
