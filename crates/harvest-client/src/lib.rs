#[cfg(feature = "browser")]
pub mod browser;
pub mod csv_store;
pub mod proxy_source;

#[cfg(feature = "browser")]
pub use browser::ChromiumDriver;
pub use csv_store::CsvRecordStore;
pub use proxy_source::{HttpProxyProbe, ProxyScrapeSource};
