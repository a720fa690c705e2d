pub mod api;
pub mod registry;

pub use api::ResourceApi;
pub use registry::{lookup, ApiGroup, ResourceType};
