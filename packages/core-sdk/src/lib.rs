pub mod client;
pub mod config;
pub mod error;
pub mod fallback;
pub mod llm;
pub mod models;
pub mod relay;
pub mod server;
pub mod telemetry;

/**
 * \brief SDK prelude, re-exports the commonly used modules.
 */
pub mod prelude {
    pub use crate::client;
    pub use crate::config;
    pub use crate::error;
    pub use crate::fallback;
    pub use crate::llm;
    pub use crate::models;
    pub use crate::relay;
    pub use crate::server;
    pub use crate::telemetry;
}
