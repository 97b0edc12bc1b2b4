pub mod clipboard;
pub mod preview;
pub mod saver;
pub mod session;
pub mod stream;
pub mod validate;

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";
