// Library surface for the replay binary and integration tests.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod hangul;
pub mod metrics;
pub mod normalizer;
pub mod platform;
pub mod practice;
pub mod progress;
pub mod replay;
pub mod session;
pub mod states;
pub mod store;
pub mod time_series;
pub mod util;

pub use error::{Error, Result};
