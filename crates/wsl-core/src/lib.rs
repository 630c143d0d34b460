pub mod error;
pub mod types;
pub mod value;

pub use error::{ScriptError, Severity};
pub use types::*;
pub use value::*;
