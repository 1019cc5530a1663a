pub mod builder;
pub mod config;
pub mod errors;
pub mod evaluator;
pub mod fakes;
pub mod llm;
pub mod server;
pub mod telemetry;
