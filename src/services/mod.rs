// src/services/mod.rs
//! Business logic and the HTTP surface.

pub mod access_control;
pub mod api_server;
pub mod context_registrar;
pub mod did_resolver;
pub mod keystore;
pub mod policy_publisher;
pub mod presentation;
pub mod role_granter;
pub mod session_issuer;
pub mod session_verifier;
