pub mod models;
pub mod provider;
pub mod security;
