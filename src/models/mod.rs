pub mod context;
pub mod did;
pub mod identifier;
pub mod policy;
pub mod proof;
pub mod session;
