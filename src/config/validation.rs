//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, destination URLs and TLS source selection
//! - Validate value ranges (timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ButlerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{ButlerConfig, Mode};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    Address { field: String, value: String },

    #[error("tls: {0}")]
    Tls(String),

    #[error("targets: empty host name")]
    EmptyHost,

    #[error("targets.{host}: invalid destination {value:?}: {reason}")]
    Destination {
        host: String,
        value: String,
        reason: String,
    },

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("not_found.fallback_url: invalid URL {0:?}")]
    FallbackUrl(String),

    #[error("services: tcp mode requires at least one service")]
    NoServices,
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ButlerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.tls.is_some() {
        check_address(
            &mut errors,
            "listener.secure_bind_address",
            &config.listener.secure_bind_address,
        );
    }

    if let Some(tls) = &config.tls {
        if let Err(e) = tls.material() {
            errors.push(ValidationError::Tls(e.to_string()));
        }
    }

    for (host, value) in &config.targets {
        if host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost);
        }
        if let Err(e) = Url::parse(value) {
            errors.push(ValidationError::Destination {
                host: host.clone(),
                value: value.clone(),
                reason: e.to_string(),
            });
        }
    }

    let timeouts = [
        ("upstream.dial_timeout_secs", config.upstream.dial_timeout_secs),
        ("upstream.tls_handshake_timeout_secs", config.upstream.tls_handshake_timeout_secs),
        ("tunnel.dial_timeout_secs", config.tunnel.dial_timeout_secs),
        ("not_found.fetch_timeout_secs", config.not_found.fetch_timeout_secs),
    ];
    for (name, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if let Some(url) = &config.not_found.fallback_url {
        if Url::parse(url).is_err() {
            errors.push(ValidationError::FallbackUrl(url.clone()));
        }
    }

    if config.mode == Mode::Tcp {
        if config.services.is_empty() {
            errors.push(ValidationError::NoServices);
        }
        for service in &config.services {
            check_address(
                &mut errors,
                &format!("services.{}.local_address", service.name),
                &service.local_address,
            );
            if service.keep_alive_secs == 0 {
                errors.push(ValidationError::ZeroTimeout("services.keep_alive_secs"));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ServiceConfig, TlsConfig};

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ButlerConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = ButlerConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.targets.insert("a.example".into(), "::::".into());
        config.upstream.dial_timeout_secs = 0;
        config.tls = Some(TlsConfig::default());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Tls(_))));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::Destination { host, .. } if host == "a.example")));
    }

    #[test]
    fn tcp_mode_needs_services() {
        let mut config = ButlerConfig::default();
        config.mode = Mode::Tcp;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::NoServices]
        );

        config.services.push(ServiceConfig {
            name: "db".into(),
            local_address: "127.0.0.1:5433".into(),
            service_address: "db.internal:5432".into(),
            tls: false,
            server_name: None,
            keep_alive_secs: 45,
        });
        assert!(validate_config(&config).is_ok());
    }
}
