//! TeleVoltaic Runtime - Orchestration layer for the TeleVoltaic framework.
//!
//! This crate provides:
//! - Settings loading and validation (`ConfigLoader`, `TeleVoltaicConfig`)
//! - Logging configuration (`LoggingBuilder`, `init_from_config`)
//! - Runtime orchestration (`TeleVoltaic`): route compilation from
//!   `root_routes`, hot reload, and concurrent update processing with
//!   timeouts and graceful shutdown
//!
//! ```ignore
//! use televoltaic_runtime::TeleVoltaic;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = TeleVoltaic::builder()
//!         .resolver(my_app::resolver())
//!         .bot(my_transport::bot())
//!         .build()?;
//!
//!     // Run until the stream ends or Ctrl+C
//!     runtime.run(my_transport::updates()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{
    ConfigLoader, DispatchConfig, LoggingConfig, Profile, SettingsError, SettingsResult,
    TeleVoltaicConfig, load_config, load_config_from_file,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents, init_from_config};
pub use runtime::{RuntimeBuilder, TeleVoltaic};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
