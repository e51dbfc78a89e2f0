//! Mock 传输与模拟 TMC5161
//!
//! [`MockTransport`] 在发送线程上调用应答函数（设备状态随发送立即更新），
//! 应答则由后台线程经回调投递，与真实串口的异步投递方式一致。
//!
//! [`SimulatedDevice`] 是一个寄存器文件：写访问帧更新寄存器，
//! 读请求帧返回 CRC 正确的应答帧，可按寄存器覆盖读出值。

use crate::{ReceiveCallback, UartError, UartTransport};
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tmc_protocol::{
    DEFAULT_SLAVE_ADDRESS, READ_REQUEST_LEN, Register, SYNC_BYTE, WRITE_BIT, WRITE_FRAME_LEN,
    bytes_to_u32_be, crc_of, encode_reply, format_bytes,
};
use tracing::{debug, trace, warn};

/// 应答函数：输入发送的帧，返回要投递的字节块（`None` 表示不应答）
pub type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

#[derive(Default)]
struct MockShared {
    sent: Mutex<Vec<Vec<u8>>>,
    reply_delay: Mutex<Duration>,
    silent: AtomicBool,
    open_count: AtomicUsize,
    close_count: AtomicUsize,
}

/// Mock 传输的观察/控制句柄
///
/// 传输被驱动层拿走后，测试仍可通过句柄查看已发送的帧、调整应答行为。
#[derive(Clone, Default)]
pub struct MockHandle {
    shared: Arc<MockShared>,
}

impl MockHandle {
    /// 已发送的所有帧（按发送顺序）
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.shared.sent.lock().clone()
    }

    pub fn clear_sent(&self) {
        self.shared.sent.lock().clear();
    }

    /// 每个应答投递前的延迟
    pub fn set_reply_delay(&self, delay: Duration) {
        *self.shared.reply_delay.lock() = delay;
    }

    /// 静默模式：照常记录发送的帧，但不投递任何应答
    pub fn set_silent(&self, silent: bool) {
        self.shared.silent.store(silent, Ordering::Release);
    }

    pub fn open_count(&self) -> usize {
        self.shared.open_count.load(Ordering::Relaxed)
    }

    pub fn close_count(&self) -> usize {
        self.shared.close_count.load(Ordering::Relaxed)
    }
}

/// Mock UART 传输
pub struct MockTransport {
    name: String,
    shared: Arc<MockShared>,
    responder: Responder,
    callback: Arc<Mutex<Option<Arc<dyn ReceiveCallback>>>>,
    tx: Option<Sender<Vec<u8>>>,
    worker: Option<JoinHandle<()>>,
    fail_open: bool,
    close_result: bool,
}

impl MockTransport {
    /// 使用自定义应答函数创建
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        Self {
            name: String::from("mock"),
            shared: Arc::new(MockShared::default()),
            responder: Box::new(responder),
            callback: Arc::new(Mutex::new(None)),
            tx: None,
            worker: None,
            fail_open: false,
            close_result: true,
        }
    }

    /// 从不应答的传输（设备断电）
    pub fn silent() -> Self {
        Self::new(|_| None)
    }

    /// `open()` 总是失败
    pub fn with_fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// `close()` 的返回值
    pub fn with_close_result(mut self, ok: bool) -> Self {
        self.close_result = ok;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn spawn_worker(&self, rx: Receiver<Vec<u8>>) -> Result<JoinHandle<()>, UartError> {
        let shared = Arc::clone(&self.shared);
        let callback = Arc::clone(&self.callback);

        thread::Builder::new()
            .name("tmc-mock-rx".to_string())
            .spawn(move || {
                for reply in rx.iter() {
                    let delay = *shared.reply_delay.lock();
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }

                    let target = callback.lock().clone();
                    match target {
                        Some(cb) => {
                            trace!("Mock delivering [{}]", format_bytes(&reply));
                            cb.deliver(reply);
                        }
                        None => warn!("Mock reply dropped: no receive callback subscribed"),
                    }
                }
            })
            .map_err(|e| UartError::Backend(format!("failed to spawn mock worker: {}", e)))
    }
}

impl UartTransport for MockTransport {
    fn open(&mut self) -> Result<(), UartError> {
        if self.fail_open {
            return Err(UartError::OpenFailed {
                port: self.name.clone(),
                message: "simulated open failure".to_string(),
            });
        }
        if self.tx.is_some() {
            return Ok(());
        }

        let (tx, rx) = unbounded();
        self.worker = Some(self.spawn_worker(rx)?);
        self.tx = Some(tx);
        self.shared.open_count.fetch_add(1, Ordering::Relaxed);
        debug!("Mock transport '{}' opened", self.name);
        Ok(())
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), UartError> {
        let Some(tx) = &self.tx else {
            return Err(UartError::NotOpen);
        };
        self.shared.sent.lock().push(bytes.to_vec());
        if self.shared.silent.load(Ordering::Acquire) {
            return Ok(());
        }

        match (self.responder)(bytes) {
            Some(reply) => tx
                .send(reply)
                .map_err(|_| UartError::Backend("mock worker stopped".to_string())),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> bool {
        let was_open = self.tx.take().is_some();
        if let Some(worker) = self.worker.take() {
            // 发送端已丢弃，worker 投递完剩余应答后退出
            if worker.join().is_err() {
                warn!("Mock worker panicked while delivering replies");
            }
        }
        if was_open {
            self.shared.close_count.fetch_add(1, Ordering::Relaxed);
        }
        was_open && self.close_result
    }

    fn subscribe(&mut self, callback: Arc<dyn ReceiveCallback>) {
        *self.callback.lock() = Some(callback);
    }

    fn is_open(&self) -> bool {
        self.tx.is_some()
    }

    fn port_name(&self) -> String {
        self.name.clone()
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.close();
        }
    }
}

#[derive(Default)]
struct DeviceState {
    registers: HashMap<u8, u32>,
    read_overrides: HashMap<u8, u32>,
    writes: Vec<(u8, u32)>,
    rejected_frames: usize,
}

/// 模拟 TMC5161
///
/// - 写访问帧：校验 CRC 后更新寄存器，不应答
/// - 读请求帧：返回寄存器值（未写过的寄存器为 0）
/// - VACTUAL：驱动使能（CHOPCONF.TOFF ≠ 0）时等于 VMAX，否则为 0
/// - 从机地址不匹配或 CRC 错误的帧被丢弃
#[derive(Clone)]
pub struct SimulatedDevice {
    slave_address: u8,
    state: Arc<Mutex<DeviceState>>,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::with_slave_address(DEFAULT_SLAVE_ADDRESS)
    }

    pub fn with_slave_address(slave_address: u8) -> Self {
        Self {
            slave_address,
            state: Arc::new(Mutex::new(DeviceState::default())),
        }
    }

    /// 创建连接到该设备的传输
    pub fn transport(&self) -> MockTransport {
        let device = self.clone();
        MockTransport::new(move |frame| device.respond(frame)).with_name("simulated-tmc5161")
    }

    /// 处理一个主机发出的帧
    pub fn respond(&self, frame: &[u8]) -> Option<Vec<u8>> {
        let mut state = self.state.lock();

        let valid_header = frame.first() == Some(&SYNC_BYTE) && frame.get(1) == Some(&self.slave_address);
        let Some((&crc, body)) = frame.split_last() else {
            state.rejected_frames += 1;
            return None;
        };
        if !valid_header || crc_of(body) != crc {
            state.rejected_frames += 1;
            return None;
        }

        match frame.len() {
            WRITE_FRAME_LEN if frame[2] & WRITE_BIT != 0 => {
                let address = frame[2] & !WRITE_BIT;
                let data = bytes_to_u32_be([frame[3], frame[4], frame[5], frame[6]]);
                state.registers.insert(address, data);
                state.writes.push((address, data));
                None
            }
            READ_REQUEST_LEN if frame[2] & WRITE_BIT == 0 => {
                let address = frame[2];
                let value = match state.read_overrides.get(&address) {
                    Some(&value) => value,
                    None => Self::current_value(&state, address),
                };
                Some(encode_reply(address, value).to_vec())
            }
            _ => {
                state.rejected_frames += 1;
                None
            }
        }
    }

    fn current_value(state: &DeviceState, address: u8) -> u32 {
        if address == Register::VActual.address() && !state.registers.contains_key(&address) {
            let chopconf = state
                .registers
                .get(&Register::ChopConf.address())
                .copied()
                .unwrap_or(0);
            // TOFF = CHOPCONF[3:0]
            if chopconf & 0x0F == 0 {
                return 0;
            }
            return state
                .registers
                .get(&Register::VMax.address())
                .copied()
                .unwrap_or(0);
        }
        state.registers.get(&address).copied().unwrap_or(0)
    }

    /// 当前寄存器值
    pub fn register(&self, register: Register) -> Option<u32> {
        self.state.lock().registers.get(&register.address()).copied()
    }

    /// 直接设置寄存器（例如预置 DRV_STATUS 错误标志）
    pub fn set_register(&self, register: Register, value: u32) {
        self.state.lock().registers.insert(register.address(), value);
    }

    /// 覆盖读出值（优先于寄存器内容）
    pub fn set_read_override(&self, register: Register, value: u32) {
        self.state.lock().read_overrides.insert(register.address(), value);
    }

    pub fn clear_read_override(&self, register: Register) {
        self.state.lock().read_overrides.remove(&register.address());
    }

    /// 全部写访问记录
    pub fn writes(&self) -> Vec<(u8, u32)> {
        self.state.lock().writes.clone()
    }

    /// 某个寄存器的写入历史
    pub fn writes_to(&self, register: Register) -> Vec<u32> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|(address, _)| *address == register.address())
            .map(|(_, data)| *data)
            .collect()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    /// 被丢弃的帧数（CRC 错误、地址不匹配、格式不对）
    pub fn rejected_frames(&self) -> usize {
        self.state.lock().rejected_frames
    }
}
