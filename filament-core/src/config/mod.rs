//! Node configuration
//!
//! Board-agnostic configuration structures. Where the blob lives (flash,
//! EEPROM, a host file) is up to the firmware; with the `serde` feature the
//! blob is postcard binary data.

pub mod types;

pub use types::*;
