pub mod error;
pub mod memory;
pub mod reader;
pub mod sqlite;

pub use error::CacheError;
pub use reader::SeriesReader;
pub use sqlite::SeriesStore;
