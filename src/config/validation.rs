//! Configuration validation.
//!
//! Serde handles syntax; this checks values that parse but cannot work.
//! All problems are reported, not just the first.

use crate::blockchain::units::MAX_DECIMALS;
use crate::config::schema::WalletConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &WalletConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.network.rpc_urls.is_empty() {
        errors.push(ValidationError::new("network.rpc_urls", "at least one RPC URL is required"));
    }
    for url in &config.network.rpc_urls {
        if url.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new("network.rpc_urls", format!("invalid URL '{}'", url)));
        }
    }
    if config.network.native_currency.decimals > MAX_DECIMALS {
        errors.push(ValidationError::new(
            "network.native_currency.decimals",
            format!("must be at most {}", MAX_DECIMALS),
        ));
    }
    for url in &config.rpc.failover_urls {
        if url.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new("rpc.failover_urls", format!("invalid URL '{}'", url)));
        }
    }
    if config.rpc.timeout_secs == 0 {
        errors.push(ValidationError::new("rpc.timeout_secs", "must be greater than zero"));
    }

    if config.token.contract_address.is_zero() {
        errors.push(ValidationError::new("token.contract_address", "must not be the zero address"));
    }
    if config.token.authorized_sender.is_zero() {
        errors.push(ValidationError::new("token.authorized_sender", "must not be the zero address"));
    }
    if config.token.decimals > MAX_DECIMALS {
        errors.push(ValidationError::new("token.decimals", format!("must be at most {}", MAX_DECIMALS)));
    }
    if config.token.poll_interval_ms == 0 {
        errors.push(ValidationError::new("token.poll_interval_ms", "must be greater than zero"));
    }
    if config.token.max_poll_interval_ms < config.token.poll_interval_ms {
        errors.push(ValidationError::new(
            "token.max_poll_interval_ms",
            "must not be lower than poll_interval_ms",
        ));
    }
    for name in config.token.recipients.keys() {
        if name.trim().is_empty() || name.starts_with("0x") {
            errors.push(ValidationError::new(
                "token.recipients",
                format!("'{}' is not a usable username", name),
            ));
        }
    }

    if config.wallet.private_key_env.trim().is_empty() {
        errors.push(ValidationError::new("wallet.private_key_env", "must name an environment variable"));
    }
    for (i, network) in config.wallet.networks.iter().enumerate() {
        if network.rpc_urls.is_empty() {
            errors.push(ValidationError::new(
                format!("wallet.networks[{}].rpc_urls", i),
                "at least one RPC URL is required",
            ));
        }
        if network.native_currency.decimals > MAX_DECIMALS {
            errors.push(ValidationError::new(
                format!("wallet.networks[{}].native_currency.decimals", i),
                format!("must be at most {}", MAX_DECIMALS),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
