//! Token acquisition flows

pub mod browser_flow;
pub mod device_flow;
pub mod ports;
pub mod service;

mod records;
