pub mod config;
pub mod convert;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod stream;

mod util;

pub use util::normalize_document_name;
