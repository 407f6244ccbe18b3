pub mod adapters;
pub mod app;
pub mod client;
pub mod domain;

#[cfg(test)]
pub(crate) mod test_support;
