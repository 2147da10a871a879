pub mod api;
pub mod config;
pub mod context;
pub mod host;
pub mod router;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(test)]
mod test_support;
