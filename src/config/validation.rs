//! Configuration validation logic.

use std::collections::HashSet;

use crate::config::schema::{GatewayConfig, ServiceConfig};

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a GatewayConfig for semantic correctness.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.host.is_empty() {
        errors.push(ValidationError("server.host must be set".to_string()));
    }
    if config.server.port == 0 {
        errors.push(ValidationError("server.port must be set".to_string()));
    }

    if config.server.tls.enabled {
        if config.server.tls.cert_file.is_empty() {
            errors.push(ValidationError(
                "server.tls.certFile must be set when TLS is enabled".to_string(),
            ));
        }
        if config.server.tls.key_file.is_empty() {
            errors.push(ValidationError(
                "server.tls.keyFile must be set when TLS is enabled".to_string(),
            ));
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for service in &config.registry.services {
        if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError(format!(
                "duplicate service name '{}'",
                service.name
            )));
        }
        if let Err(e) = validate_service(service) {
            errors.push(e);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a single service definition.
///
/// Applied to boot-time config entries and to control-plane register/update
/// bodies.
pub fn validate_service(service: &ServiceConfig) -> Result<(), ValidationError> {
    if service.name.is_empty() {
        return Err(ValidationError("service name must be non-empty".to_string()));
    }
    if service.addr.is_empty() {
        return Err(ValidationError(format!(
            "service '{}' addr must be non-empty",
            service.name
        )));
    }
    let ratio = service.circuit_breaker.failure_ratio;
    if !(0.0..=1.0).contains(&ratio) {
        return Err(ValidationError(format!(
            "service '{}' circuitBreaker.failureRatio must be within [0.0, 1.0]",
            service.name
        )));
    }
    if service.rate_limiter.enabled && service.rate_limiter.rate <= 0.0 {
        return Err(ValidationError(format!(
            "service '{}' rateLimiter.rate must be positive",
            service.name
        )));
    }
    Ok(())
}
