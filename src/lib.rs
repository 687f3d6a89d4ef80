pub mod actions;
pub mod attachments;
pub mod compose;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod run;
pub mod source;
pub mod template;
pub mod transport;
pub mod validate;

pub use error::MailbatchError;
pub type Result<T> = std::result::Result<T, MailbatchError>;
