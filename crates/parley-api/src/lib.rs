pub mod auth;
pub mod contacts;
pub mod messages;
pub mod middleware;

#[cfg(test)]
pub(crate) mod test_support;
