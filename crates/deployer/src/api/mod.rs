pub mod routes;
pub mod server;
#[cfg(test)]
pub(crate) mod tests;
