// src/blockchain/mod.rs
pub mod ethers_client;
pub mod gateway;

pub use gateway::{
    ChainGateway, CreateContextCall, GrantRoleCall, MinedTransaction, RegisterPolicyCall, RegisterResourceCall,
};
