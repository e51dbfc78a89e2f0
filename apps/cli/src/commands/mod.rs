//! 命令定义和实现

pub mod config;
pub mod ports;
pub mod run;
pub mod status;

pub use config::ConfigCommand;
pub use ports::PortsCommand;
pub use run::RunCommand;
pub use status::StatusCommand;
