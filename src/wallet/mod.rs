// src/wallet/mod.rs
pub mod key_management;
pub mod transaction;

pub use key_management::Wallet;
