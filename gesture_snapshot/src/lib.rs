mod image_utils;
mod routes;

pub mod app;
pub mod config;
pub mod gesture;
pub mod page;
pub mod prediction;
pub mod server;
pub mod session;
pub mod telemetry;

pub use app::start_app;
pub use image_utils::{CapturedImage, ImageError};
