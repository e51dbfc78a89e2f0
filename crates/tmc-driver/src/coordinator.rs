//! 请求/应答协调器
//!
//! 把"发送读请求，然后等待回调投递应答"变成一个带超时的同步调用。
//!
//! # 并发模型
//!
//! - 调用方线程：持有传输锁完成 编码 → 发送 → 等待 → 取出 的整个过程，
//!   多个请求方在传输锁上串行化，同一时间只有一个读请求在途。
//! - 投递线程（传输层）：只通过 [`ReplyDepositor`] 写入应答槽并唤醒所有等待者。
//!
//! 应答槽由一对 `Mutex` / `Condvar` 保护。请求方在持有槽锁时发送，
//! 等待时释放锁，因此应答不会在"发送"与"开始等待"之间丢失。

use crate::error::{CommError, DriverError};
use crate::metrics::LinkMetrics;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tmc_protocol::{
    DecodeError, ReadRequest, Register, ValidatedReply, WriteDatagram, decode_reply, format_bytes,
};
use tmc_uart::{ReceiveCallback, UartTransport};
use tracing::{debug, trace, warn};

#[derive(Debug, Default)]
struct PendingReply {
    buffer: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct ReplySlot {
    pending: Mutex<PendingReply>,
    ready: Condvar,
}

/// 应答投递句柄
///
/// 注册给传输层的接收回调，是应答槽唯一的写入方。
pub struct ReplyDepositor {
    slot: Arc<ReplySlot>,
    metrics: Arc<LinkMetrics>,
}

impl ReceiveCallback for ReplyDepositor {
    fn deliver(&self, buffer: Vec<u8>) {
        self.metrics.replies_received.fetch_add(1, Ordering::Relaxed);
        trace!("Received bytes: [{}]", format_bytes(&buffer));

        let mut pending = self.slot.pending.lock();
        // 后到者覆盖先到者
        pending.buffer = Some(buffer);
        self.slot.ready.notify_all();
    }
}

/// 请求/应答协调器
pub struct Coordinator<T: UartTransport> {
    transport: Mutex<T>,
    slot: Arc<ReplySlot>,
    slave_address: u8,
    reply_timeout: Duration,
    write_settle: Duration,
    metrics: Arc<LinkMetrics>,
}

impl<T: UartTransport> Coordinator<T> {
    /// 创建协调器，并把应答投递句柄注册到传输层
    pub fn new(
        mut transport: T,
        slave_address: u8,
        reply_timeout: Duration,
        write_settle: Duration,
        metrics: Arc<LinkMetrics>,
    ) -> Self {
        let slot = Arc::new(ReplySlot::default());
        transport.subscribe(Arc::new(ReplyDepositor {
            slot: Arc::clone(&slot),
            metrics: Arc::clone(&metrics),
        }));

        Self {
            transport: Mutex::new(transport),
            slot,
            slave_address,
            reply_timeout,
            write_settle,
            metrics,
        }
    }

    pub fn open(&self) -> Result<(), CommError> {
        let mut transport = self.transport.lock();
        transport.open()?;
        debug!("Transport {} open", transport.port_name());
        Ok(())
    }

    /// 关闭传输，返回是否成功释放
    pub fn close(&self) -> bool {
        self.transport.lock().close()
    }

    pub fn is_open(&self) -> bool {
        self.transport.lock().is_open()
    }

    pub fn port_name(&self) -> String {
        self.transport.lock().port_name()
    }

    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    /// 写寄存器（发后即忘）
    ///
    /// 发送后固定等待一段时间，让芯片处理完写访问。
    pub fn write_register(&self, register: Register, data: u32) -> Result<(), DriverError> {
        let datagram = WriteDatagram::new(self.slave_address, register, data)?;
        {
            let mut transport = self.transport.lock();
            if !transport.is_open() {
                return Err(CommError::NotOpen.into());
            }
            transport.send_bytes(datagram.as_bytes())?;
        }
        self.metrics.write_frames.fetch_add(1, Ordering::Relaxed);
        debug!("Write {} = 0x{:08X}", register, data);
        trace!("Sent bytes: [{}]", format_bytes(datagram.as_bytes()));

        spin_sleep::sleep(self.write_settle);
        Ok(())
    }

    /// 读寄存器，返回投递回调收到的原始字节
    ///
    /// 超时返回 `CommError::Timeout`；返回的字节尚未校验。
    pub fn read_register(&self, register: Register) -> Result<Vec<u8>, DriverError> {
        let request = ReadRequest::new(self.slave_address, register)?;

        let mut transport = self.transport.lock();
        if !transport.is_open() {
            return Err(CommError::NotOpen.into());
        }

        let mut pending = self.slot.pending.lock();
        // 丢弃上一次迟到的应答
        pending.buffer = None;

        transport.send_bytes(request.as_bytes())?;
        self.metrics.read_requests.fetch_add(1, Ordering::Relaxed);
        trace!("Sent bytes: [{}]", format_bytes(request.as_bytes()));

        let deadline = Instant::now() + self.reply_timeout;
        loop {
            if let Some(buffer) = pending.buffer.take() {
                return Ok(buffer);
            }
            if self.slot.ready.wait_until(&mut pending, deadline).timed_out() {
                if let Some(buffer) = pending.buffer.take() {
                    return Ok(buffer);
                }
                self.metrics.read_timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "No reply for {} within {:?}",
                    register, self.reply_timeout
                );
                return Err(CommError::Timeout("no reply answer").into());
            }
        }
    }

    /// 读寄存器并校验应答帧
    pub fn read_reply(&self, register: Register) -> Result<ValidatedReply, DriverError> {
        let buffer = self.read_register(register)?;
        match decode_reply(&buffer) {
            Ok(reply) => {
                debug!("Read {} -> 0x{:08X}", register, reply.data);
                Ok(reply)
            },
            Err(e) => {
                match e {
                    DecodeError::NullOrEmpty => {
                        self.metrics.empty_replies.fetch_add(1, Ordering::Relaxed)
                    },
                    _ => self.metrics.corrupt_replies.fetch_add(1, Ordering::Relaxed),
                };
                warn!("Invalid reply for {}: {} [{}]", register, e, format_bytes(&buffer));
                Err(e.into())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataCorruptError;
    use tmc_protocol::{encode_read, encode_reply, encode_write};
    use tmc_uart::{MockTransport, SimulatedDevice};

    fn coordinator<T: UartTransport>(transport: T) -> (Coordinator<T>, Arc<LinkMetrics>) {
        let metrics = Arc::new(LinkMetrics::new());
        let coordinator = Coordinator::new(
            transport,
            0x00,
            Duration::from_millis(100),
            Duration::from_millis(0),
            Arc::clone(&metrics),
        );
        (coordinator, metrics)
    }

    #[test]
    fn test_not_open() {
        let (coordinator, _) = coordinator(MockTransport::silent());
        let err = coordinator.read_register(Register::Gconf).unwrap_err();
        assert!(matches!(err, DriverError::Communication(CommError::NotOpen)));

        let err = coordinator.write_register(Register::Gconf, 0x0C).unwrap_err();
        assert!(matches!(err, DriverError::Communication(CommError::NotOpen)));
    }

    #[test]
    fn test_write_register_frame() {
        let transport = MockTransport::silent();
        let handle = transport.handle();
        let (coordinator, metrics) = coordinator(transport);
        coordinator.open().unwrap();

        coordinator.write_register(Register::VMax, 128_000).unwrap();
        assert_eq!(
            handle.sent_frames(),
            vec![encode_write(0x00, 0x27, 128_000).to_vec()]
        );
        assert_eq!(metrics.snapshot().write_frames, 1);
    }

    #[test]
    fn test_register_access_checked() {
        let (coordinator, _) = coordinator(MockTransport::silent());
        coordinator.open().unwrap();

        let err = coordinator.write_register(Register::DrvStatus, 0).unwrap_err();
        assert!(matches!(err, DriverError::Protocol(_)));

        let err = coordinator.read_register(Register::VMax).unwrap_err();
        assert!(matches!(err, DriverError::Protocol(_)));
    }

    #[test]
    fn test_read_reply_from_simulated_device() {
        let device = SimulatedDevice::new();
        device.set_register(Register::ChopConf, 0x000100C3);
        let transport = device.transport();
        let handle = transport.handle();
        let (coordinator, metrics) = coordinator(transport);
        coordinator.open().unwrap();

        let reply = coordinator.read_reply(Register::ChopConf).unwrap();
        assert_eq!(reply.register_address, 0x6C);
        assert_eq!(reply.data, 0x000100C3);
        assert_eq!(handle.sent_frames(), vec![encode_read(0x00, 0x6C).to_vec()]);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.read_requests, 1);
        assert_eq!(snapshot.replies_received, 1);
    }

    #[test]
    fn test_timeout_when_silent() {
        let (coordinator, metrics) = coordinator(MockTransport::silent());
        coordinator.open().unwrap();

        let err = coordinator.read_register(Register::VActual).unwrap_err();
        assert!(matches!(err, DriverError::Communication(CommError::Timeout(_))));
        assert!(err.is_retryable());
        assert_eq!(metrics.snapshot().read_timeouts, 1);
    }

    #[test]
    fn test_empty_reply_is_communication_error() {
        let transport = MockTransport::new(|_| Some(Vec::new()));
        let (coordinator, metrics) = coordinator(transport);
        coordinator.open().unwrap();

        let err = coordinator.read_reply(Register::VActual).unwrap_err();
        assert!(matches!(err, DriverError::Communication(CommError::EmptyReply)));
        assert_eq!(metrics.snapshot().empty_replies, 1);
    }

    #[test]
    fn test_corrupt_reply() {
        let transport = MockTransport::new(|frame| {
            let mut reply = encode_reply(frame[2], 1234);
            reply[7] ^= 0x01;
            Some(reply.to_vec())
        });
        let (coordinator, metrics) = coordinator(transport);
        coordinator.open().unwrap();

        let err = coordinator.read_reply(Register::VActual).unwrap_err();
        assert!(matches!(
            err,
            DriverError::DataCorrupt(DataCorruptError::CrcMismatch { .. })
        ));
        assert_eq!(metrics.snapshot().corrupt_replies, 1);
    }

    #[test]
    fn test_stale_reply_is_discarded() {
        let transport = MockTransport::silent();
        let (coordinator, _) = coordinator(transport);
        coordinator.open().unwrap();

        // 模拟上一次请求超时后才到达的应答
        {
            let mut pending = coordinator.slot.pending.lock();
            pending.buffer = Some(encode_reply(0x22, 999).to_vec());
        }

        let err = coordinator.read_register(Register::VActual).unwrap_err();
        assert!(matches!(err, DriverError::Communication(CommError::Timeout(_))));
    }
}
