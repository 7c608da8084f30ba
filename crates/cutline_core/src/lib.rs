pub mod config;
pub mod error;
pub mod fields;
pub mod types;

pub use config::EngineConfig;
pub use error::{CoreError, FieldError};
pub use fields::FormFields;
pub use types::{CodecChoice, Mode, OperationSpec, RotationPreset, TagKey, Timestamp};
