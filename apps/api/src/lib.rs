pub mod config;
pub mod errors;
pub mod evaluation;
pub mod interview;
pub mod llm_client;
pub mod routes;
pub mod state;
