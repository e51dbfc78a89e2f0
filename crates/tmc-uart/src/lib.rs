//! # TMC UART Transport Layer
//!
//! 单线 UART 传输抽象层：打开端口、发送字节、关闭端口，
//! 并通过回调把收到的字节块投递给上层。
//!
//! 上层（请求/应答协调器）不直接管理端口或接收缓冲区。
//!
//! ## 后端
//!
//! - `serial`（默认）: 基于 `serialport` 的真实串口，后台线程读取并按字节间隔切分
//! - `mock`: 无硬件依赖的模拟传输，含一个模拟 TMC5161 寄存器文件

use std::sync::Arc;
use thiserror::Error;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockHandle, MockTransport, SimulatedDevice};

#[cfg(feature = "serial")]
pub use serial::{PortInfo, SerialConfig, SerialTransport, available_ports};

/// UART 传输层统一错误类型
#[derive(Error, Debug)]
pub enum UartError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 系统中没有任何可用串口
    #[error("No available ports")]
    NoPorts,

    #[error("Failed to open COM-port {port}: {message}")]
    OpenFailed { port: String, message: String },

    #[error("Port not open")]
    NotOpen,

    /// 后端内部错误（端口枚举失败、线程创建失败等）
    #[error("Backend error: {0}")]
    Backend(String),
}

impl UartError {
    /// 是否为端口不可用类错误（重新打开前不会恢复）
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            UartError::NoPorts | UartError::OpenFailed { .. } | UartError::NotOpen
        )
    }
}

/// 接收回调
///
/// 传输层在自己的投递线程上调用 [`ReceiveCallback::deliver`]，
/// 一次传入一个完整的接收字节块（可能为空、过短或损坏，由上层校验）。
///
/// 实现必须是 `Send + Sync`，并且不能在回调里等待协调器持有的锁以外的资源。
pub trait ReceiveCallback: Send + Sync {
    /// 投递一个接收字节块
    fn deliver(&self, buffer: Vec<u8>);
}

/// 单线 UART 传输能力
///
/// 发送是"发后即忘"的：`send_bytes` 返回时字节已写出，
/// 应答（如有）稍后经 [`ReceiveCallback`] 到达，且必须来自另一个线程。
pub trait UartTransport: Send {
    /// 打开端口并开始投递接收数据
    fn open(&mut self) -> Result<(), UartError>;

    /// 写出字节（阻塞直到写入完成）
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), UartError>;

    /// 关闭端口，返回是否成功释放
    fn close(&mut self) -> bool;

    /// 注册接收回调（替换之前的回调）
    fn subscribe(&mut self, callback: Arc<dyn ReceiveCallback>);

    fn is_open(&self) -> bool;

    /// 端口名称（用于日志）
    fn port_name(&self) -> String {
        String::from("uart")
    }
}

impl<T: UartTransport + ?Sized> UartTransport for Box<T> {
    fn open(&mut self) -> Result<(), UartError> {
        (**self).open()
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), UartError> {
        (**self).send_bytes(bytes)
    }

    fn close(&mut self) -> bool {
        (**self).close()
    }

    fn subscribe(&mut self, callback: Arc<dyn ReceiveCallback>) {
        (**self).subscribe(callback)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn port_name(&self) -> String {
        (**self).port_name()
    }
}
