mod app;
mod config;
mod export;
mod http;
mod mock;
mod probe;
mod validation;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use export::ExportError;
pub use http::HttpError;
pub use mock::MockError;
pub use probe::ProbeError;
pub use validation::ValidationError;
