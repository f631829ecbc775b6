//! Clients for the services the order service calls.

pub mod addresses;
pub mod catalog;
pub mod stock;

pub use addresses::{AddressDirectory, AddressRecord, HttpAddressDirectory, InMemoryAddressDirectory};
pub use catalog::{CatalogClient, HttpCatalogClient, InMemoryCatalog, ProductInfo};
pub use stock::{HttpStockLedger, InMemoryStockLedger, StockLedger};
