pub mod catalog;
pub mod connection;
pub mod dialect;
pub mod differ;
#[cfg(test)]
pub mod memory;
pub mod migrator;
pub mod provisioning;
pub mod storage;
