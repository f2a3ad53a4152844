mod catalog;
mod settings;

pub use catalog::{CatalogConfig, CatalogEntry, EntrySource};
pub use settings::Settings;
