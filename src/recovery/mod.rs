//! Write-Ahead Log and ARIES-lite crash recovery (spec §4.5, §4.6).

pub mod log_manager;
pub mod log_record;
pub mod recovery_manager;

pub use log_manager::LogManager;
pub use log_record::{LogBody, LogRecord, LogType};
pub use recovery_manager::{RecoveryManager, RecoveryOps};
