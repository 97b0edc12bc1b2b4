pub mod core;
pub mod models;
pub mod platforms;
pub mod storage;

pub use crate::core::session::{Session, SessionController, SessionState};
pub use crate::platforms::{Platform, PlatformConfig};
