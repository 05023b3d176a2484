pub mod errors;
pub mod id;

pub use errors::{ConfigError, WardenError};
pub use id::{new_correlation_id, new_id, Mode, SessionKey, UserId};

pub type Result<T> = std::result::Result<T, WardenError>;
