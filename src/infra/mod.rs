pub mod client_locator;
pub mod github_client;
pub mod store_client;
