//! Client, mock server and acceptance-test tooling for the F5 Distributed
//! Cloud API.
pub mod acctest;
pub mod api;
pub mod config;
pub mod error;
pub mod mock;
pub mod resources;
pub mod utils;

pub use api::F5xcClient;
pub use error::{ErrorCode, F5xcError};
