pub mod detector;
pub mod types;
pub mod utils;

pub use detector::ColumnDetector;
