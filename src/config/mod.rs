//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → WalletConfig (validated, immutable)
//!     → handed to provider detection, connector and executor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults; the defaults are the UZH deployment
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{LocalWalletConfig, ObservabilityConfig, RpcConfig, TokenConfig, WalletConfig};
