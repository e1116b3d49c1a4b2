//! Configuration validation for provisioning declarations.
//!
//! This module validates provisioning configurations before anything is sent
//! to the fulfillment API, collecting every problem instead of stopping at the
//! first one.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::error::{ConfigError, OsacError, Result};
use crate::fulfillment::PowerState;

use super::spec::{OsacConfig, ProviderConfig, SetDeclaration};

/// Validator for provisioning configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a provisioning configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first problem if validation fails.
    pub fn validate(&self, config: &OsacConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(OsacError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Runs every check and returns all findings.
    #[must_use]
    pub fn check(&self, config: &OsacConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_provider(&config.provider, &mut result);

        for (key, cluster) in &config.clusters {
            let field = format!("clusters.{key}");
            Self::validate_key(&field, key, &mut result);
            Self::validate_name(&field, cluster.name.as_deref(), &mut result);
            Self::validate_template(&field, &cluster.template, &mut result);
            Self::validate_parameters(&field, cluster.template_parameters.as_ref(), &mut result);
            Self::validate_sets(
                &format!("{field}.node_sets"),
                cluster.node_sets.as_ref(),
                &mut result,
            );
        }

        for (key, instance) in &config.compute_instances {
            let field = format!("compute_instances.{key}");
            Self::validate_key(&field, key, &mut result);
            Self::validate_name(&field, instance.name.as_deref(), &mut result);
            Self::validate_template(&field, &instance.template, &mut result);
            Self::validate_parameters(&field, instance.template_parameters.as_ref(), &mut result);
        }

        for (key, host) in &config.hosts {
            let field = format!("hosts.{key}");
            Self::validate_key(&field, key, &mut result);
            Self::validate_name(&field, host.name.as_deref(), &mut result);

            if let Some(power_state) = &host.power_state {
                if !PowerState::is_known(power_state) {
                    result.warn(format!(
                        "{field}.power_state '{power_state}' is not ON or OFF and will be left unspecified"
                    ));
                }
            }
        }

        for (key, pool) in &config.host_pools {
            let field = format!("host_pools.{key}");
            Self::validate_key(&field, key, &mut result);
            Self::validate_name(&field, pool.name.as_deref(), &mut result);
            Self::validate_sets(
                &format!("{field}.host_sets"),
                pool.host_sets.as_ref(),
                &mut result,
            );
        }

        Self::check_duplicate_names(config, &mut result);

        if config.resource_count() == 0 {
            result.warn("No resources declared");
        }

        result
    }

    /// Validates provider configuration.
    fn validate_provider(provider: &ProviderConfig, result: &mut ValidationResult) {
        let endpoint = provider.endpoint.trim();
        if endpoint.is_empty() {
            result.error("provider.endpoint", "Endpoint cannot be empty");
        } else if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            result.error(
                "provider.endpoint",
                format!("Endpoint '{endpoint}' must start with http:// or https://"),
            );
        } else if endpoint.starts_with("http://") {
            result.warn("provider.endpoint uses plain HTTP; the token is sent unencrypted");
        }

        if provider.insecure {
            result.warn("provider.insecure disables TLS certificate verification");
        }

        let timeouts = &provider.timeouts;
        if timeouts.create_secs == 0 || timeouts.update_secs == 0 {
            result.warn("A provisioning timeout of 0 falls back to the 30 minute default");
        }
        if timeouts.poll_interval_secs < timeouts.min_poll_interval_secs {
            result.warn(format!(
                "provider.timeouts.poll_interval_secs ({}) is shorter than min_poll_interval_secs ({})",
                timeouts.poll_interval_secs, timeouts.min_poll_interval_secs
            ));
        }
    }

    /// Validates a declaration key.
    fn validate_key(field: &str, key: &str, result: &mut ValidationResult) {
        if !is_valid_name(key) {
            result.error(
                field,
                format!("Key '{key}' is invalid. Must be lowercase alphanumeric with hyphens."),
            );
        }
    }

    /// Validates an explicit remote name.
    fn validate_name(field: &str, name: Option<&str>, result: &mut ValidationResult) {
        if name.is_some_and(|n| n.trim().is_empty()) {
            result.error(format!("{field}.name"), "Name cannot be empty when set");
        }
    }

    /// Validates a template reference.
    fn validate_template(field: &str, template: &str, result: &mut ValidationResult) {
        if template.is_empty() {
            result.error(format!("{field}.template"), "Template cannot be empty");
        } else if template.chars().any(char::is_whitespace) {
            result.error(
                format!("{field}.template"),
                format!("Template '{template}' cannot contain whitespace"),
            );
        }
    }

    /// Validates template parameter names.
    fn validate_parameters(
        field: &str,
        parameters: Option<&BTreeMap<String, String>>,
        result: &mut ValidationResult,
    ) {
        for name in parameters.into_iter().flat_map(BTreeMap::keys) {
            if name.trim().is_empty() {
                result.error(
                    format!("{field}.template_parameters"),
                    "Parameter names cannot be empty",
                );
            }
        }
    }

    /// Validates node or host sets.
    fn validate_sets(
        field: &str,
        sets: Option<&BTreeMap<String, SetDeclaration>>,
        result: &mut ValidationResult,
    ) {
        let Some(sets) = sets else {
            return;
        };

        if sets.is_empty() {
            result.warn(format!("{field} is declared but empty"));
        }

        for (name, set) in sets {
            let set_field = format!("{field}.{name}");

            if !is_valid_set_name(name) {
                result.error(
                    &set_field,
                    format!("Set name '{name}' must be alphanumeric with hyphens or underscores"),
                );
            }

            if set.host_class.trim().is_empty() {
                result.error(format!("{set_field}.host_class"), "Host class cannot be empty");
            }

            if i32::try_from(set.size).is_err() {
                result.error(
                    format!("{set_field}.size"),
                    format!("Size {} exceeds the maximum of {}", set.size, i32::MAX),
                );
            } else if set.size == 0 {
                result.warn(format!("{set_field} has size 0"));
            }
        }
    }

    /// Warns about explicit names reused within one kind.
    fn check_duplicate_names(config: &OsacConfig, result: &mut ValidationResult) {
        let kinds: [(&str, Vec<Option<&String>>); 4] = [
            ("clusters", config.clusters.values().map(|d| d.name.as_ref()).collect()),
            (
                "compute_instances",
                config.compute_instances.values().map(|d| d.name.as_ref()).collect(),
            ),
            ("hosts", config.hosts.values().map(|d| d.name.as_ref()).collect()),
            ("host_pools", config.host_pools.values().map(|d| d.name.as_ref()).collect()),
        ];

        for (kind, names) in kinds {
            let mut seen = HashSet::new();
            for name in names.into_iter().flatten() {
                if !seen.insert(name) {
                    result.warn(format!("Name '{name}' is used more than once in {kind}"));
                }
            }
        }
    }
}

/// Checks if a declaration key is valid (lowercase alphanumeric with hyphens).
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    // First character must be a letter
    if !chars.next().is_some_and(|c| c.is_ascii_lowercase()) {
        return false;
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--") && name.len() <= 63
}

/// Checks if a node or host set name is valid.
fn is_valid_set_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn parse(yaml: &str) -> OsacConfig {
        ConfigParser::new().parse_yaml(yaml, None).unwrap()
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("edge"));
        assert!(is_valid_name("rack1-u4"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("1edge"));
        assert!(!is_valid_name("Edge"));
        assert!(!is_valid_name("edge-"));
        assert!(!is_valid_name("edge--a"));
        assert!(!is_valid_name("edge.a"));
    }

    #[test]
    fn test_valid_config() {
        let config = parse(
            r"
provider:
  endpoint: https://fulfillment.example.com
clusters:
  edge:
    template: ocp_4_17_small
    node_sets:
      workers: { host_class: fc430, size: 3 }
",
        );

        let result = ConfigValidator::new().validate(&config).unwrap();
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_bad_endpoint() {
        let config = parse("provider:\n  endpoint: fulfillment.example.com\n");
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(matches!(
            err,
            OsacError::Config(ConfigError::ValidationError { field: Some(ref f), .. })
                if f == "provider.endpoint"
        ));
    }

    #[test]
    fn test_collects_every_error() {
        let config = parse(
            r"
provider:
  endpoint: https://fulfillment.example.com
clusters:
  Edge:
    template: ''
    node_sets:
      'bad name': { host_class: '', size: 3000000000 }
",
        );

        let result = ConfigValidator::new().check(&config);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"clusters.Edge"));
        assert!(fields.contains(&"clusters.Edge.template"));
        assert!(fields.contains(&"clusters.Edge.node_sets.bad name"));
        assert!(fields.contains(&"clusters.Edge.node_sets.bad name.host_class"));
        assert!(fields.contains(&"clusters.Edge.node_sets.bad name.size"));
    }

    #[test]
    fn test_warnings() {
        let config = parse(
            r"
provider:
  endpoint: http://localhost:8000
  timeouts: { poll_interval_secs: 1, min_poll_interval_secs: 5 }
hosts:
  a: { name: node, power_state: STANDBY }
  b: { name: node }
",
        );

        let result = ConfigValidator::new().validate(&config).unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("plain HTTP")));
        assert!(result.warnings.iter().any(|w| w.contains("min_poll_interval_secs")));
        assert!(result.warnings.iter().any(|w| w.contains("STANDBY")));
        assert!(result.warnings.iter().any(|w| w.contains("more than once")));
    }

    #[test]
    fn test_empty_config_warns() {
        let config = parse("provider:\n  endpoint: https://x.example.com\n");
        let result = ConfigValidator::new().validate(&config).unwrap();
        assert_eq!(result.warnings, vec!["No resources declared"]);
    }
}
