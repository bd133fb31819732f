pub mod config;
pub mod error;

pub use config::{load_dotenv, SchedulerConfig};
pub use error::*;
