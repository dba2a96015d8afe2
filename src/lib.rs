pub mod app;
pub mod check;
pub mod cli;
pub mod config;
pub mod effect;
pub mod gesture;
pub mod model_download;
pub mod pipeline;
pub mod session;
pub mod stream;
pub mod types;
pub mod ui;
