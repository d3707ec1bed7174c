pub mod crypto;
pub mod first_success;
pub mod serialization;
