pub mod deployments;
pub mod models;
