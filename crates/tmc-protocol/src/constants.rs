//! 协议常量定义

/// 同步字节（低 4 位 0101，高 4 位保留为 0）
pub const SYNC_BYTE: u8 = 0x05;

/// 应答帧中的主机地址
pub const MASTER_ADDRESS: u8 = 0xFF;

/// 默认从机地址
pub const DEFAULT_SLAVE_ADDRESS: u8 = 0x00;

/// 写访问标志位（OR 到寄存器地址字节）
pub const WRITE_BIT: u8 = 0x80;

/// 写访问帧长度
pub const WRITE_FRAME_LEN: usize = 8;

/// 读请求帧长度
pub const READ_REQUEST_LEN: usize = 4;

/// 应答帧长度
pub const REPLY_FRAME_LEN: usize = 8;

/// 每转微步数（256 微步 × 200 整步）
pub const MICROSTEPS_PER_REVOLUTION: u32 = 51_200;

/// RAMPMODE：位置模式
pub const RAMP_MODE_POSITION: u32 = 0;

/// RPS 转换为 VMAX 寄存器值（微步/秒，截断小数部分）
pub fn rps_to_microsteps(rps: f64) -> u32 {
    (rps * MICROSTEPS_PER_REVOLUTION as f64) as u32
}

/// 微步/秒转换为 RPS
pub fn microsteps_to_rps(microsteps: u32) -> f64 {
    microsteps as f64 / MICROSTEPS_PER_REVOLUTION as f64
}
