/// F5 Distributed Cloud API client implementation
pub mod addon;
pub mod client;
pub mod models;
pub mod namespace;
pub mod quota;

pub use client::{with_deadline, AuthType, CertificateFiles, ClientOptions, F5xcClient};
pub use models::{ListResponse, Metadata, Resource, Spec, SystemMetadata};
