//! Authorization engine internals

pub mod acl;
pub mod audit;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gate;
