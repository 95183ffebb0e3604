pub mod api_client;
pub mod attempt_engine;
pub mod countdown;
pub mod progress_store;
