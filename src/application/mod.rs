//! Application services: request access, render contexts and host hooks.

pub mod context;
pub mod error;
pub mod extension;
pub mod repos;
pub mod request;
