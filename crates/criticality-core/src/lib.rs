pub mod constants;
pub mod error;
pub mod metric;
pub mod output;
pub mod scoring;
pub mod weights;

pub use error::{ConfigError, ParseError};
pub use metric::*;
pub use output::*;
pub use scoring::*;
pub use weights::*;
