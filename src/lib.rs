//! Command-line client generated at startup from an OpenAPI description.
//!
//! The flow is [`spec::load`] → [`synthesize::synthesize`] → [`cli::build_cli`]
//! → [`runtime::execute`] → [`render::render`]. The HTTP transport sits behind
//! [`client::ApiClient`] so everything above it can be driven without a network.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod operation;
pub mod render;
pub mod runtime;
pub mod spec;
pub mod synthesize;
