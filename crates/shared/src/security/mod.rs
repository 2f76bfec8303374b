pub mod api_key_middleware;

pub use api_key_middleware::ApiKeyMiddleware;
