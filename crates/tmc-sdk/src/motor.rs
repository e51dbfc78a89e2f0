//! 步进电机高层接口

use tmc_driver::{
    DriverConfig, DriverError, LinkMetricsSnapshot, MotorControl, MotorSession, PowerCycle,
    SessionState,
};
use tmc_protocol::MotorStatus;
use tmc_uart::UartTransport;

/// 步进电机
///
/// 所有操作都委托给驱动层的 [`MotorControl`]。
/// 默认类型参数是类型擦除的传输层，便于在运行时选择串口或模拟设备。
///
/// # 示例
///
/// ```rust,no_run
/// use tmc_sdk::prelude::*;
///
/// # fn main() -> Result<(), DriverError> {
/// let mut motor = StepperMotorBuilder::new().port("/dev/ttyUSB0").build()?;
/// motor.start(2.5)?;
/// motor.enable_stall_exception(true);
///
/// loop {
///     if let Err(e) = motor.check_status() {
///         if e.requires_reset() {
///             motor.reset(2.5)?;
///         }
///     }
///     motor.reset_position_counter()?;
///     std::thread::sleep(std::time::Duration::from_secs(1));
/// }
/// # }
/// ```
pub struct StepperMotor<T: UartTransport = Box<dyn UartTransport>> {
    control: MotorControl<T>,
}

impl<T: UartTransport> StepperMotor<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, DriverConfig::default())
    }

    pub fn with_config(transport: T, config: DriverConfig) -> Self {
        Self {
            control: MotorControl::with_config(transport, config),
        }
    }

    /// 设置复位时使用的电源循环实现
    pub fn with_power_cycle(self, power: impl PowerCycle + 'static) -> Self {
        Self {
            control: self.control.with_power_cycle(power),
        }
    }

    /// 只打开端口，不写配置
    pub fn connect(&mut self) -> Result<(), DriverError> {
        self.control.connect()
    }

    /// 初始化芯片并以给定速度（转/秒）开始旋转
    pub fn start(&mut self, rps: f64) -> Result<(), DriverError> {
        self.control.initialize(rps)
    }

    pub fn set_velocity(&mut self, rps: f64) -> Result<(), DriverError> {
        self.control.set_velocity(rps)
    }

    /// 位置计数器清零，需要周期性调用以保持旋转
    pub fn reset_position_counter(&self) -> Result<(), DriverError> {
        self.control.reset_position_counter()
    }

    /// 读取状态并检查故障
    pub fn check_status(&mut self) -> Result<MotorStatus, DriverError> {
        self.control.check_status()
    }

    /// 读取状态，不做故障判断
    pub fn read_status(&mut self) -> Result<MotorStatus, DriverError> {
        self.control.read_status()
    }

    /// 电源循环后重新配置并启动
    pub fn reset(&mut self, rps: f64) -> Result<(), DriverError> {
        self.control.reset(rps)
    }

    pub fn enable_stall_exception(&mut self, enable: bool) {
        self.control.enable_stall_exception(enable);
    }

    pub fn enable_velocity_exception(&mut self, enable: bool) {
        self.control.enable_velocity_exception(enable);
    }

    pub fn disable_driver(&self) -> Result<(), DriverError> {
        self.control.disable_driver()
    }

    /// 关闭驱动级并释放端口
    pub fn close(&mut self) -> Result<(), DriverError> {
        self.control.close()
    }

    pub fn state(&self) -> SessionState {
        self.control.state()
    }

    pub fn session(&self) -> MotorSession {
        self.control.session()
    }

    pub fn config(&self) -> &DriverConfig {
        self.control.config()
    }

    pub fn metrics(&self) -> LinkMetricsSnapshot {
        self.control.metrics()
    }

    pub fn port_name(&self) -> String {
        self.control.port_name()
    }

    pub fn is_open(&self) -> bool {
        self.control.is_open()
    }

    /// 驱动层控制器（高级用户使用）
    pub fn control(&self) -> &MotorControl<T> {
        &self.control
    }
}

impl<T: UartTransport> std::fmt::Debug for StepperMotor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepperMotor")
            .field("port", &self.control.port_name())
            .field("state", &self.control.state())
            .field("session", &self.control.session())
            .finish()
    }
}
