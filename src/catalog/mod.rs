mod migrations;
mod sqlite_manager;

mod manager;
pub mod mock_catalog;

pub use manager::{CatalogManager, DatasetInfo};
pub use mock_catalog::MockCatalog;
pub use sqlite_manager::SqliteCatalogManager;
