//! 会话状态

/// 电机会话生命周期
///
/// ```text
/// Uninitialized → Configuring → Running → (Faulted | Closed)
/// ```
///
/// `Faulted` 可以经 `reset` 回到 `Running`；`Closed` 可以重新初始化。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    /// 正在写入启动配置 / 回读校验
    Configuring,
    Running,
    /// 发生了需要复位的错误
    Faulted,
    Closed,
}

impl SessionState {
    pub fn is_running(self) -> bool {
        self == SessionState::Running
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Configuring => "configuring",
            SessionState::Running => "running",
            SessionState::Faulted => "faulted",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// 电机会话参数
///
/// 从初始化成功到关闭期间有效。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorSession {
    /// 目标速度（转/秒）
    pub desired_rps: f64,
    /// 失速时是否报错
    pub stall_exception: bool,
    /// 速度超出范围时是否报错
    pub velocity_exception: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(SessionState::default(), SessionState::Uninitialized);
        let session = MotorSession::default();
        assert_eq!(session.desired_rps, 0.0);
        assert!(!session.stall_exception);
        assert!(!session.velocity_exception);
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::Running.to_string(), "running");
        assert!(SessionState::Running.is_running());
        assert!(!SessionState::Faulted.is_running());
    }
}
