//! Cache render output by the request parameters a page declares.
//!
//! Pages declare the request parameters their content depends on; the
//! [`RequestParamsExtension`](application::extension::RequestParamsExtension)
//! persists those declarations on save and, at render time, appends the live
//! values of the declared parameters to the host's render key. Reading a
//! parameter that was never declared still works but makes the render
//! uncacheable.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
