//! HTTP bridge to the AIDA API server
//!
//! Implements [`aida_core::bridge::RemoteBridge`] over the AIDA REST API
//! (`/init_session`, `/session_status/{id}`, `/chat`, `/health`).

pub mod http;

pub use http::HttpBridge;
