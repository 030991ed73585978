pub mod columns;
pub mod file_processor;
pub mod importer;
pub mod word_store;
