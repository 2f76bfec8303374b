pub mod api;
pub mod container;
pub mod descriptor;
pub mod gpu;
pub mod model;
pub mod validation;
pub mod volume;
pub(crate) mod wire;

pub use api::{ApiResponse, ConnectionHealth, ProviderResult};
pub use descriptor::{Framework, ModelDescriptor};
pub use validation::RequestValidationError;
