pub mod config;
pub mod error;
pub mod error_utils;
pub mod identity;
pub mod matcher;
pub mod query;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use error_utils::*;
pub use identity::*;
pub use matcher::*;
pub use query::*;
pub use traits::*;
pub use types::*;
