use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No API environments configured")]
    NoEnvironments,

    #[error("Default environment '{default}' is not one of the configured environments: {configured}")]
    UnknownDefault { default: String, configured: String },

    #[error("Missing {variable} for environment '{environment}'")]
    MissingSpecUrl {
        environment: String,
        variable: String,
    },

    #[error("Invalid {variable} for environment '{environment}': {reason}")]
    InvalidSpecUrl {
        environment: String,
        variable: String,
        reason: String,
    },

    #[error("Invalid PORT '{0}': expected an integer between 0 and 65535")]
    InvalidPort(String),

    #[error("Invalid {variable} '{value}': expected a non-negative integer")]
    InvalidNumber { variable: String, value: String },
}

/// Static identity of the server process
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    /// Port used when PORT is not set
    pub default_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "OpenAPI MCP Server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            default_port: 3000,
        }
    }
}

/// Connection metadata for one named environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// Location of the OpenAPI document for this environment
    pub spec_url: String,
}

/// Named API environments (dev, qa, prod, ...) and the default selection.
///
/// Built once at startup and read-only afterwards. `environments` keeps
/// declaration order; every name in it has an entry in `configs`.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentRegistry {
    environments: Vec<String>,
    default_environment: String,
    configs: HashMap<String, EnvironmentConfig>,
}

impl EnvironmentRegistry {
    /// Build a registry from explicit parts.
    ///
    /// An empty `default_environment` selects the first declared name.
    pub fn new(
        entries: Vec<(String, EnvironmentConfig)>,
        default_environment: Option<String>,
    ) -> Self {
        let mut environments = Vec::with_capacity(entries.len());
        let mut configs = HashMap::with_capacity(entries.len());

        for (name, config) in entries {
            if configs.contains_key(&name) {
                continue;
            }
            environments.push(name.clone());
            configs.insert(name, config);
        }

        let default_environment = default_environment
            .filter(|d| !d.is_empty())
            .or_else(|| environments.first().cloned())
            .unwrap_or_default();

        Self {
            environments,
            default_environment,
            configs,
        }
    }

    /// Load from `ENVIRONMENTS`, `DEFAULT_ENVIRONMENT` and `API_SPEC_URL_<ENV>`
    /// through `lookup`.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let names = parse_environment_names(lookup("ENVIRONMENTS").as_deref().unwrap_or(""));

        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let variable = spec_url_variable(&name);
            let spec_url = lookup(&variable)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingSpecUrl {
                    environment: name.clone(),
                    variable: variable.clone(),
                })?;

            validate_spec_url(&name, &variable, &spec_url)?;
            entries.push((name, EnvironmentConfig { spec_url }));
        }

        let default_environment = lookup("DEFAULT_ENVIRONMENT").map(|d| d.trim().to_string());
        Ok(Self::new(entries, default_environment))
    }

    pub fn environments(&self) -> &[String] {
        &self.environments
    }

    pub fn default_environment(&self) -> &str {
        &self.default_environment
    }

    pub fn get(&self, name: &str) -> Option<&EnvironmentConfig> {
        self.configs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.configs.contains_key(name)
    }

    /// Fails with `NoEnvironments` when nothing is configured, whatever the
    /// default or per-environment data look like.
    pub fn validate_non_empty(&self) -> Result<(), ConfigError> {
        if self.environments.is_empty() {
            return Err(ConfigError::NoEnvironments);
        }
        Ok(())
    }

    /// Fails when the default names an environment that was never declared
    pub fn validate_default(&self) -> Result<(), ConfigError> {
        if !self.contains(&self.default_environment) {
            return Err(ConfigError::UnknownDefault {
                default: self.default_environment.clone(),
                configured: self.environments.join(", "),
            });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_non_empty()?;
        self.validate_default()
    }

    /// Startup listing: the names in declaration order, the default, then
    /// one `  <name>: <url>` line per environment.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.environments.len() + 2);
        lines.push(format!(
            "Configured environments: {}",
            self.environments.join(", ")
        ));
        lines.push(format!("Default environment: {}", self.default_environment));

        for name in &self.environments {
            if let Some(config) = self.configs.get(name) {
                lines.push(format!("  {}: {}", name, config.spec_url));
            }
        }

        lines
    }
}

/// Outbound TLS behaviour for spec fetches and upstream API calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsOptions {
    pub accept_invalid_certs: bool,
}

impl TlsOptions {
    /// Invalid certificates are only ever accepted in debug builds.
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let requested = lookup("ALLOW_INSECURE_TLS")
            .map(|v| parse_flag(&v))
            .unwrap_or(cfg!(debug_assertions));

        if requested && !cfg!(debug_assertions) {
            tracing::warn!("ALLOW_INSECURE_TLS ignored in release builds");
            return Self {
                accept_invalid_certs: false,
            };
        }

        Self {
            accept_invalid_certs: requested,
        }
    }
}

/// Complete process configuration, passed explicitly to every component
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub registry: EnvironmentRegistry,
    pub port: u16,
    pub tls: TlsOptions,
    pub spec_cache_ttl: Duration,
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::with_registry(EnvironmentRegistry::from_lookup(lookup)?, lookup)
    }

    /// Remaining settings around an already loaded registry
    pub fn with_registry<F>(registry: EnvironmentRegistry, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = ServerConfig::default();
        let port = resolve_port(lookup("PORT").as_deref(), server.default_port)?;
        let tls = TlsOptions::from_lookup(lookup);
        let spec_cache_ttl = Duration::from_secs(parse_seconds(lookup, "SPEC_CACHE_TTL_SECS", 300)?);
        let request_timeout = Duration::from_secs(parse_seconds(lookup, "REQUEST_TIMEOUT_SECS", 30)?);

        Ok(Self {
            server,
            registry,
            port,
            tls,
            spec_cache_ttl,
            request_timeout,
        })
    }
}

/// PORT wins when set; otherwise the default. Pure function of its inputs.
pub fn resolve_port(value: Option<&str>, default_port: u16) -> Result<u16, ConfigError> {
    match value.map(str::trim) {
        None | Some("") => Ok(default_port),
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(raw.to_string())),
    }
}

/// Environment variable holding the spec URL of `name`
pub fn spec_url_variable(name: &str) -> String {
    format!("API_SPEC_URL_{}", name.to_uppercase().replace('-', "_"))
}

/// Usage guide printed when no environment is configured
pub fn remediation_message() -> String {
    [
        "ERROR: No API environments configured",
        "",
        "Please configure at least one environment:",
        "",
        "Example - Single environment:",
        "  ENVIRONMENTS=prod",
        "  API_SPEC_URL_PROD=https://api.example.com/openapi/v1.json",
        "",
        "Example - Multiple environments:",
        "  ENVIRONMENTS=dev,qa,prod",
        "  DEFAULT_ENVIRONMENT=dev",
        "  API_SPEC_URL_DEV=https://dev-api.example.com/openapi/v1.json",
        "  API_SPEC_URL_QA=https://qa-api.example.com/openapi/v1.json",
        "  API_SPEC_URL_PROD=https://api.example.com/openapi/v1.json",
    ]
    .join("\n")
}

fn parse_environment_names(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn validate_spec_url(environment: &str, variable: &str, spec_url: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidSpecUrl {
        environment: environment.to_string(),
        variable: variable.to_string(),
        reason,
    };

    let parsed = url::Url::parse(spec_url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_seconds<F>(lookup: &F, variable: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(variable) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            variable: variable.to_string(),
            value: raw,
        }),
    }
}
