//! 端到端测试
//!
//! 通过高层接口驱动一个模拟 TMC5161，覆盖启动、回读校验、速度设置、
//! 状态检查、故障恢复和关闭。

use serial_test::serial;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tmc_protocol::{Register, encode_write};
use tmc_sdk::prelude::*;
use tmc_uart::{MockTransport, SimulatedDevice};

fn fast_config() -> DriverConfig {
    DriverConfig {
        write_settle_ms: 0,
        readback_gap_ms: 0,
        ..Default::default()
    }
}

fn simulated_motor() -> (StepperMotor<MockTransport>, SimulatedDevice) {
    let device = SimulatedDevice::new();
    let motor = StepperMotorBuilder::new()
        .config(fast_config())
        .build_with(device.transport())
        .unwrap();
    (motor, device)
}

/// 启动后进入运行状态，寄存器按顺序写入
#[test]
fn test_start_configures_device() {
    let (mut motor, device) = simulated_motor();
    motor.start(2.5).unwrap();

    assert_eq!(motor.state(), SessionState::Running);
    assert!(motor.is_open());

    let writes = device.writes();
    let expected: [(u8, u32); 18] = [
        (0x00, 0x0000_000C),
        (0x6C, 0x0001_00C3),
        (0x6D, 0),
        (0x10, 0x0008_0201),
        (0x11, 0x0A),
        (0x13, 0x1F4),
        (0x2D, 0),
        (0x21, 0),
        (0x23, 1),
        (0x24, 250),
        (0x25, 50_000),
        (0x26, 250),
        (0x27, 128_000),
        (0x28, 250),
        (0x2A, 250),
        (0x2B, 2),
        (0x20, 0),
        (0x2D, 0x0009_9000),
    ];
    assert_eq!(writes, expected.to_vec());
    assert_eq!(device.rejected_frames(), 0);
}

/// 回读值被篡改时启动失败
#[test]
fn test_readback_mismatch_fails_start() {
    let (mut motor, device) = simulated_motor();
    device.set_read_override(Register::Gconf, 0x0000_0004);

    let err = motor.start(2.5).unwrap_err();
    match err.device_fault() {
        Some(DeviceFault::ConfigReadbackFailed { register, .. }) => {
            assert_eq!(*register, Register::Gconf);
        },
        other => panic!("unexpected fault: {:?}", other),
    }
    assert_eq!(
        err.to_string(),
        "Driver error: Configuration values could not be read back correctly \
         (GCONF (0x00): expected 0x0000000C, read 0x00000004)"
    );
    assert_eq!(motor.state(), SessionState::Faulted);

    // 清除篡改后复位可以恢复
    device.clear_read_override(Register::Gconf);
    motor.reset(2.5).unwrap();
    assert_eq!(motor.state(), SessionState::Running);
}

/// 非法速度被拒绝，合法速度只写 VMAX
#[test]
fn test_velocity_validation() {
    let (mut motor, device) = simulated_motor();
    motor.start(2.5).unwrap();
    device.clear_writes();

    for rps in [-1.0, 5.1, f64::INFINITY] {
        let err = motor.set_velocity(rps).unwrap_err();
        assert!(matches!(
            err.device_fault(),
            Some(DeviceFault::InvalidVelocity { .. })
        ));
        assert!(!err.requires_reset());
    }
    assert!(device.writes().is_empty());
    assert_eq!(motor.state(), SessionState::Running);

    motor.set_velocity(2.5).unwrap();
    assert_eq!(device.writes(), vec![(0x27, 128_000)]);
}

/// 地址不匹配的设备不应答，启动以超时结束
#[test]
#[serial]
fn test_wrong_slave_address_times_out() {
    let device = SimulatedDevice::with_slave_address(0x01);
    let mut motor = StepperMotor::with_config(device.transport(), fast_config());

    let err = motor.start(1.0).unwrap_err();
    assert!(matches!(err, DriverError::Communication(CommError::Timeout(_))));
    assert_eq!(err.category(), ErrorCategory::Communication);
    assert!(err.is_retryable());
    assert!(device.rejected_frames() > 0);
    assert_eq!(motor.metrics().read_timeouts, 1);
}

/// 状态应答损坏：报告数据损坏并进入故障状态
#[test]
fn test_corrupt_status_reply() {
    let device = SimulatedDevice::new();
    let corrupt = Arc::new(AtomicBool::new(false));
    let transport = {
        let device = device.clone();
        let corrupt = Arc::clone(&corrupt);
        MockTransport::new(move |frame| {
            let mut reply = device.respond(frame)?;
            if corrupt.load(Ordering::Relaxed) {
                reply[5] ^= 0x40;
            }
            Some(reply)
        })
    };
    let mut motor = StepperMotor::with_config(transport, fast_config());
    motor.start(2.5).unwrap();

    corrupt.store(true, Ordering::Relaxed);
    let err = motor.check_status().unwrap_err();
    assert!(matches!(
        err,
        DriverError::DataCorrupt(DataCorruptError::CrcMismatch { .. })
    ));
    assert!(err.requires_reset());
    assert_eq!(motor.state(), SessionState::Faulted);
    assert_eq!(motor.metrics().corrupt_replies, 1);

    corrupt.store(false, Ordering::Relaxed);
    motor.reset(2.5).unwrap();
    motor.check_status().unwrap();
}

/// 轮询循环：容忍失速和过温预警，其余故障复位
#[test]
fn test_polling_recovery_policy() {
    let (mut motor, device) = simulated_motor();
    motor.start(2.5).unwrap();
    motor.enable_stall_exception(true);

    let scenarios: [(u32, bool); 4] = [
        (0, false),
        (0x0100_0000, false), // 失速
        (1 << 26, false),     // 过温预警
        (1 << 30, true),      // B 相开路
    ];

    for (drv_status, expect_reset) in scenarios {
        device.set_register(Register::DrvStatus, drv_status);
        device.set_register(Register::XActual, 0x0004_0000);

        let mut did_reset = false;
        if let Err(e) = motor.check_status() {
            if !e.is_tolerable() {
                device.set_register(Register::DrvStatus, 0);
                motor.reset(2.5).unwrap();
                motor.enable_stall_exception(true);
                did_reset = true;
            }
        }
        motor.reset_position_counter().unwrap();

        assert_eq!(did_reset, expect_reset, "DRV_STATUS 0x{:08X}", drv_status);
        assert_eq!(device.register(Register::XActual), Some(0));
        assert_eq!(motor.state(), SessionState::Running);
    }
}

/// 速度检查开启时，实际速度超出 [0.95, 1.10] × 目标速度 报错
#[test]
fn test_velocity_exception() {
    let (mut motor, device) = simulated_motor();
    motor.start(2.0).unwrap();
    motor.enable_velocity_exception(true);

    let status = motor.check_status().unwrap();
    assert_eq!(status.actual_velocity_rps(), 2.0);

    device.set_read_override(Register::VActual, 90_000);
    let err = motor.check_status().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Driver error: Motor velocity too low (1.758 RPS, desired 2.000 RPS)"
    );

    device.set_read_override(Register::VActual, 120_000);
    let err = motor.check_status().unwrap_err();
    assert!(matches!(
        err.device_fault(),
        Some(DeviceFault::VelocityTooHigh { .. })
    ));

    motor.enable_velocity_exception(false);
    motor.reset(2.0).unwrap();
    motor.check_status().unwrap();
}

/// 关闭时先关闭驱动级
#[test]
fn test_close_disables_driver() {
    let device = SimulatedDevice::new();
    let transport = device.transport();
    let handle = transport.handle();
    let mut motor = StepperMotor::with_config(transport, fast_config());
    motor.start(2.5).unwrap();
    handle.clear_sent();

    motor.close().unwrap();
    assert_eq!(handle.sent_frames(), vec![encode_write(0x00, 0x6C, 0x0001_00C0).to_vec()]);
    assert_eq!(handle.close_count(), 1);
    assert_eq!(motor.state(), SessionState::Closed);
    // 驱动级关闭后电机停止
    assert_eq!(motor.read_status().map(|s| s.actual_velocity).ok(), None);
    assert_eq!(
        device.respond(&tmc_protocol::encode_read(0x00, 0x22)),
        Some(tmc_protocol::encode_reply(0x22, 0).to_vec())
    );

    let err = motor.close().unwrap_err();
    assert!(matches!(err, DriverError::Communication(CommError::NotOpen)));
}
