pub mod api_client;
pub mod config_loader;
pub mod fetcher;
pub mod ranklist;
pub mod router;
pub mod selection_store;
