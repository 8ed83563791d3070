pub mod config;
pub mod error;
pub mod text;
pub mod types;

pub use config::{load_config, FileConfig, SelectionConfig};
pub use error::{CatalogueError, FilterParseError, LarkError, LarkResult, TaxonomyError};
pub use types::*;
