pub mod config;
pub mod data;
pub mod error;
pub mod log;
pub mod pipeline;
pub mod session;

pub use config::SessionConfig;
pub use data::esg::{open_file, parse_esg, save_file, serialize_esg};
pub use data::mask::{load_mask, parse_mask, save_mask, serialize_mask, MaskEntry, MaskRange};
pub use data::spectrum::{DataPoint, Dataset, Spectrum};
pub use error::{EsgError, Result};
pub use pipeline::processing::EditOp;
pub use session::{EditSession, Status};
