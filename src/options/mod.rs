//! Caching options supplied by the host's configuration.
//!
//! Options are immutable for the lifetime of a request. Every field has a
//! documented default, so a partial JSON document or a partial set of
//! environment variables only overrides what it names.

use std::env;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// The placeholder that receives `cache_max_age_seconds` in the Cache-Control template.
pub const MAX_AGE_PLACEHOLDER: &str = "{}";

const DEFAULT_CACHE_CONTROL_TEMPLATE: &str = "public, max-age={}";

/// Errors produced while loading or validating [`Options`].
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("invalid options document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("cache-control template {template:?} must contain exactly one `{{}}` placeholder")]
    Template { template: String },
}

/// Which caching headers to emit, and how.
///
/// | Field                        | Default                |
/// |------------------------------|------------------------|
/// | `add_etag_header`            | `true`                 |
/// | `add_cache_control_header`   | `true`                 |
/// | `add_last_modified_header`   | `true`                 |
/// | `generate_weak_etag`         | `false`                |
/// | `cache_max_age_seconds`      | `0`                    |
/// | `cache_control_template`     | `"public, max-age={}"` |
///
/// # Examples
///
/// ```
/// use rttp_etag::options::Options;
///
/// let options = Options::from_json(r#"{"generate_weak_etag": true, "cache_max_age_seconds": 300}"#).unwrap();
/// assert!(options.generate_weak_etag);
/// assert!(options.add_etag_header);
/// assert_eq!(options.cache_control_value(), "public, max-age=300");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    pub add_etag_header: bool,
    pub add_cache_control_header: bool,
    pub add_last_modified_header: bool,
    pub generate_weak_etag: bool,
    pub cache_max_age_seconds: u64,
    pub cache_control_template: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            add_etag_header: true,
            add_cache_control_header: true,
            add_last_modified_header: true,
            generate_weak_etag: false,
            cache_max_age_seconds: 0,
            cache_control_template: DEFAULT_CACHE_CONTROL_TEMPLATE.to_owned(),
        }
    }
}

impl Options {
    /// Parses and validates a (possibly partial) JSON options document.
    pub fn from_json(document: &str) -> Result<Self, OptionsError> {
        let options: Self = serde_json::from_str(document)?;
        options.validate()?;
        Ok(options)
    }

    /// Reads `ETAG_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, OptionsError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Applies `ETAG_*` overrides resolved through `lookup` over the defaults.
    pub fn from_vars<F>(lookup: F) -> Result<Self, OptionsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();
        let flags = [
            ("ETAG_ADD_ETAG_HEADER", &mut options.add_etag_header),
            (
                "ETAG_ADD_CACHE_CONTROL_HEADER",
                &mut options.add_cache_control_header,
            ),
            (
                "ETAG_ADD_LAST_MODIFIED_HEADER",
                &mut options.add_last_modified_header,
            ),
            ("ETAG_GENERATE_WEAK_ETAG", &mut options.generate_weak_etag),
        ];
        for (name, slot) in flags {
            if let Some(value) = lookup(name) {
                *slot = parse_bool(name, value)?;
            }
        }
        if let Some(value) = lookup("ETAG_CACHE_MAX_AGE_SECONDS") {
            options.cache_max_age_seconds =
                value.trim().parse().map_err(|_| OptionsError::InvalidEnv {
                    name: "ETAG_CACHE_MAX_AGE_SECONDS",
                    value,
                })?;
        }
        if let Some(template) = lookup("ETAG_CACHE_CONTROL_TEMPLATE") {
            options.cache_control_template = template;
        }
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.cache_control_template.matches(MAX_AGE_PLACEHOLDER).count() != 1 {
            return Err(OptionsError::Template {
                template: self.cache_control_template.clone(),
            });
        }
        Ok(())
    }

    /// Renders the Cache-Control value for an enabled cache-control header.
    pub fn cache_control_value(&self) -> String {
        self.cache_control_template.replacen(
            MAX_AGE_PLACEHOLDER,
            &self.cache_max_age_seconds.to_string(),
            1,
        )
    }
}

fn parse_bool(name: &'static str, value: String) -> Result<bool, OptionsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(OptionsError::InvalidEnv { name, value }),
    }
}

/// Where fingerprints live: the tenant namespace and the store round-trip bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub tenant: String,
    pub store_timeout: Duration,
}

impl CacheSettings {
    pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);

    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            store_timeout: Self::DEFAULT_STORE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_defaults() {
        let options = Options::default();
        assert!(options.add_etag_header);
        assert!(options.add_cache_control_header);
        assert!(options.add_last_modified_header);
        assert!(!options.generate_weak_etag);
        assert_eq!(options.cache_max_age_seconds, 0);
        assert_eq!(options.cache_control_value(), "public, max-age=0");
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let options = Options::from_json(r#"{"add_last_modified_header": false}"#).unwrap();
        assert!(!options.add_last_modified_header);
        assert!(options.add_etag_header);
    }

    #[test]
    fn custom_template() {
        let options = Options::from_json(
            r#"{"cache_control_template": "private, max-age={}, must-revalidate", "cache_max_age_seconds": 60}"#,
        )
        .unwrap();
        assert_eq!(
            options.cache_control_value(),
            "private, max-age=60, must-revalidate"
        );
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let err = Options::from_json(r#"{"cache_control_template": "public"}"#).unwrap_err();
        assert!(matches!(err, OptionsError::Template { .. }));

        let err = Options::from_json(r#"{"cache_control_template": "max-age={}, s-maxage={}"}"#)
            .unwrap_err();
        assert!(matches!(err, OptionsError::Template { .. }));
    }

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_owned())
        }
    }

    #[test]
    fn env_overrides_defaults() {
        let options = Options::from_vars(vars(&[
            ("ETAG_ADD_ETAG_HEADER", "off"),
            ("ETAG_GENERATE_WEAK_ETAG", " Yes "),
            ("ETAG_CACHE_MAX_AGE_SECONDS", "120"),
            ("ETAG_CACHE_CONTROL_TEMPLATE", "private, max-age={}"),
        ]))
        .unwrap();
        assert!(!options.add_etag_header);
        assert!(options.generate_weak_etag);
        assert!(options.add_cache_control_header);
        assert!(options.add_last_modified_header);
        assert_eq!(options.cache_control_value(), "private, max-age=120");
    }

    #[test]
    fn no_env_vars_means_defaults() {
        let options = Options::from_vars(|_| None).unwrap();
        assert!(options.add_etag_header);
        assert_eq!(options.cache_control_value(), "public, max-age=0");
    }

    #[test]
    fn invalid_env_values_are_rejected() {
        let err = Options::from_vars(vars(&[("ETAG_ADD_LAST_MODIFIED_HEADER", "maybe")]))
            .unwrap_err();
        assert!(matches!(
            err,
            OptionsError::InvalidEnv { name: "ETAG_ADD_LAST_MODIFIED_HEADER", ref value } if value == "maybe"
        ));

        let err =
            Options::from_vars(vars(&[("ETAG_CACHE_MAX_AGE_SECONDS", "-5")])).unwrap_err();
        assert!(matches!(
            err,
            OptionsError::InvalidEnv { name: "ETAG_CACHE_MAX_AGE_SECONDS", .. }
        ));

        let err = Options::from_vars(vars(&[("ETAG_CACHE_CONTROL_TEMPLATE", "no-store")]))
            .unwrap_err();
        assert!(matches!(err, OptionsError::Template { .. }));
    }

    #[test]
    fn settings_default_timeout() {
        let settings = CacheSettings::new("site-1");
        assert_eq!(settings.store_timeout, Duration::from_millis(250));
    }
}
