//! Domain types and models

pub mod device;
pub mod environment;
pub mod token;

pub use device::DeviceAuthorization;
pub use environment::BrowserAvailability;
pub use token::{FlowLabel, TokenRecord, TokenStoreFile};
