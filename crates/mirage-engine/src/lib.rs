pub mod config;
pub mod driver;
pub mod orchestrator;
pub mod poll;
pub mod postprocess;
pub mod resolution;
pub mod session;
pub mod submit;
