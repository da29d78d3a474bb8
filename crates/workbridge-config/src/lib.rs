use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_WORKBRIDGE_CONFIG: &str = "WORKBRIDGE_CONFIG";
pub const ENV_AZURE_ORGANIZATION: &str = "WORKBRIDGE_AZURE_ORGANIZATION";
pub const ENV_AZURE_PROJECT: &str = "WORKBRIDGE_AZURE_PROJECT";
pub const ENV_AZURE_REPOSITORY: &str = "WORKBRIDGE_AZURE_REPOSITORY";
pub const ENV_AZ_BIN: &str = "WORKBRIDGE_AZ_BIN";
pub const ENV_BRANCH_PREFIX: &str = "WORKBRIDGE_BRANCH_PREFIX";
pub const ENV_SOURCE_BRANCH: &str = "WORKBRIDGE_SOURCE_BRANCH";
pub const ENV_RELATIONS_FAN_OUT_LIMIT: &str = "WORKBRIDGE_RELATIONS_FAN_OUT_LIMIT";
pub const ENV_ALLOW_UNSAFE_COMMAND_PATHS: &str = "WORKBRIDGE_ALLOW_UNSAFE_COMMAND_PATHS";

const DEFAULT_REMOTE_PROVIDER: &str = "remote.azure_cli";
const DEFAULT_AZ_BINARY: &str = "az";
const DEFAULT_ALLOW_UNSAFE_COMMAND_PATHS: bool = false;
const DEFAULT_FAN_OUT_LIMIT: usize = 25;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkbridgeConfig {
    #[serde(default = "default_remote_provider")]
    pub remote_provider: String,
    #[serde(default)]
    pub azure: AzureConfigToml,
    #[serde(default)]
    pub branches: BranchesConfigToml,
    #[serde(default)]
    pub relations: RelationsConfigToml,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AzureConfigToml {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default = "default_az_binary")]
    pub binary: String,
    #[serde(default)]
    pub command_timeout_secs: u64,
    #[serde(default = "default_allow_unsafe_command_paths")]
    pub allow_unsafe_command_paths: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchesConfigToml {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub source_branch: String,
    #[serde(default)]
    pub default_branch_cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationsConfigToml {
    #[serde(default = "default_fan_out_limit")]
    pub fan_out_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySettings {
    pub organization: Option<String>,
    pub project: Option<String>,
    pub repository: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationRuntimeConfig {
    pub fan_out_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRuntimeConfig {
    pub prefix: String,
    pub source_branch: Option<String>,
    pub default_branch_cache_ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureCliRuntimeConfig {
    pub binary: String,
    pub command_timeout: Option<Duration>,
    pub allow_unsafe_command_paths: bool,
}

impl WorkbridgeConfig {
    /// Blank settings come back as `None` so the caller decides what is
    /// required.
    pub fn repository_settings(&self) -> RepositorySettings {
        RepositorySettings {
            organization: non_blank(&self.azure.organization),
            project: non_blank(&self.azure.project),
            repository: non_blank(&self.azure.repository),
        }
    }

    pub fn relation_settings(&self) -> RelationRuntimeConfig {
        RelationRuntimeConfig {
            fan_out_limit: self.relations.fan_out_limit,
        }
    }

    pub fn branch_settings(&self) -> BranchRuntimeConfig {
        BranchRuntimeConfig {
            prefix: self.branches.prefix.clone(),
            source_branch: non_blank(&self.branches.source_branch),
            default_branch_cache_ttl_secs: self.branches.default_branch_cache_ttl_secs,
        }
    }

    pub fn azure_cli_settings(&self) -> AzureCliRuntimeConfig {
        AzureCliRuntimeConfig {
            binary: self.azure.binary.clone(),
            command_timeout: (self.azure.command_timeout_secs > 0)
                .then(|| Duration::from_secs(self.azure.command_timeout_secs)),
            allow_unsafe_command_paths: self.azure.allow_unsafe_command_paths,
        }
    }
}

/// Loads the config file named by `WORKBRIDGE_CONFIG` (or the default path)
/// and layers the `WORKBRIDGE_*` environment overrides on top.
pub fn load_from_env() -> Result<WorkbridgeConfig, ConfigError> {
    let path = config_path_from_env()?;
    let mut config = load_from_path(path)?;
    apply_env_overrides(&mut config)?;
    normalize_config(&mut config)?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<WorkbridgeConfig, ConfigError> {
    load_or_create_config(path.as_ref())
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = resolve_home_dir().ok_or_else(|| {
        ConfigError::configuration("Unable to resolve home directory from HOME or USERPROFILE")
    })?;

    Ok(home.join(".config").join("workbridge").join("config.toml"))
}

fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_WORKBRIDGE_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                default_config_path()
            } else {
                Ok(raw.into())
            }
        }
        Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(_) => Err(ConfigError::configuration(
            "WORKBRIDGE_CONFIG contained invalid UTF-8",
        )),
    }
}

fn resolve_home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("USERPROFILE")
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
}

fn default_remote_provider() -> String {
    DEFAULT_REMOTE_PROVIDER.to_owned()
}

fn default_az_binary() -> String {
    DEFAULT_AZ_BINARY.to_owned()
}

fn default_allow_unsafe_command_paths() -> bool {
    DEFAULT_ALLOW_UNSAFE_COMMAND_PATHS
}

fn default_fan_out_limit() -> usize {
    DEFAULT_FAN_OUT_LIMIT
}

impl Default for WorkbridgeConfig {
    fn default() -> Self {
        Self {
            remote_provider: default_remote_provider(),
            azure: AzureConfigToml::default(),
            branches: BranchesConfigToml::default(),
            relations: RelationsConfigToml::default(),
        }
    }
}

impl Default for AzureConfigToml {
    fn default() -> Self {
        Self {
            organization: String::new(),
            project: String::new(),
            repository: String::new(),
            binary: default_az_binary(),
            command_timeout_secs: 0,
            allow_unsafe_command_paths: default_allow_unsafe_command_paths(),
        }
    }
}

impl Default for RelationsConfigToml {
    fn default() -> Self {
        Self {
            fan_out_limit: default_fan_out_limit(),
        }
    }
}

fn persist_config(path: &Path, config: &WorkbridgeConfig) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(config).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to serialize WORKBRIDGE_CONFIG for {}: {err}",
            path.display()
        ))
    })?;

    std::fs::write(path, rendered.as_bytes()).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to write WORKBRIDGE_CONFIG to {}: {err}",
            path.display()
        ))
    })
}

fn load_or_create_config(path: &Path) -> Result<WorkbridgeConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|err| {
                        ConfigError::configuration(format!(
                            "Failed to create parent directory {} for WORKBRIDGE_CONFIG: {err}",
                            parent.display()
                        ))
                    })?;
                }
            }

            let default_config = WorkbridgeConfig::default();
            persist_config(path, &default_config)?;
            return Ok(default_config);
        }
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read WORKBRIDGE_CONFIG from {}: {err}",
                path.display()
            )));
        }
    };

    let mut config: WorkbridgeConfig = toml::from_str(&raw).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to parse WORKBRIDGE_CONFIG from {}: {err}",
            path.display()
        ))
    })?;

    let changed = normalize_config(&mut config)?;
    if changed {
        persist_config(path, &config)?;
    }

    Ok(config)
}

fn apply_env_overrides(config: &mut WorkbridgeConfig) -> Result<(), ConfigError> {
    let string_overrides: [(&str, &mut String); 6] = [
        (ENV_AZURE_ORGANIZATION, &mut config.azure.organization),
        (ENV_AZURE_PROJECT, &mut config.azure.project),
        (ENV_AZURE_REPOSITORY, &mut config.azure.repository),
        (ENV_AZ_BIN, &mut config.azure.binary),
        (ENV_BRANCH_PREFIX, &mut config.branches.prefix),
        (ENV_SOURCE_BRANCH, &mut config.branches.source_branch),
    ];
    for (name, target) in string_overrides {
        if let Some(value) = read_env(name)? {
            *target = value;
        }
    }

    if let Some(raw) = read_env(ENV_RELATIONS_FAN_OUT_LIMIT)? {
        config.relations.fan_out_limit = match raw.trim().parse::<usize>() {
            Ok(limit) if limit > 0 => limit,
            _ => {
                return Err(ConfigError::configuration(format!(
                    "{ENV_RELATIONS_FAN_OUT_LIMIT} must be a positive integer, got '{}'",
                    raw.trim()
                )))
            }
        };
    }

    if let Some(raw) = read_env(ENV_ALLOW_UNSAFE_COMMAND_PATHS)? {
        config.azure.allow_unsafe_command_paths =
            parse_bool_env(ENV_ALLOW_UNSAFE_COMMAND_PATHS, &raw)?;
    }

    Ok(())
}

fn read_env(name: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(_) => Err(ConfigError::configuration(format!(
            "{name} contained invalid UTF-8"
        ))),
    }
}

fn parse_bool_env(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::configuration(format!(
            "{name} must be a boolean (true/false)."
        ))),
    }
}

fn normalize_config(config: &mut WorkbridgeConfig) -> Result<bool, ConfigError> {
    let mut changed = normalize_provider_selection(
        &mut config.remote_provider,
        DEFAULT_REMOTE_PROVIDER,
        "remote_provider",
        "remote",
    )?;

    changed |= normalize_organization(&mut config.azure.organization);
    changed |= normalize_trimmed(&mut config.azure.project);
    changed |= normalize_trimmed(&mut config.azure.repository);
    changed |= normalize_non_empty_string(&mut config.azure.binary, default_az_binary());
    changed |= normalize_trimmed(&mut config.branches.prefix);
    changed |= normalize_trimmed(&mut config.branches.source_branch);

    if config.relations.fan_out_limit == 0 {
        return Err(ConfigError::configuration(
            "Invalid `relations.fan_out_limit` value 0 in WORKBRIDGE_CONFIG: the limit must be at least 1.",
        ));
    }

    Ok(changed)
}

fn normalize_organization(value: &mut String) -> bool {
    let trimmed = value.trim().trim_end_matches('/');
    let normalized = if trimmed.is_empty() {
        String::new()
    } else {
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("https://") || lower.starts_with("http://") {
            trimmed.to_owned()
        } else {
            format!("https://{trimmed}")
        }
    };

    if *value != normalized {
        *value = normalized;
        return true;
    }
    false
}

fn normalize_provider_selection(
    value: &mut String,
    default: &str,
    field_name: &str,
    provider_namespace: &str,
) -> Result<bool, ConfigError> {
    let normalized = value.trim().to_ascii_lowercase();
    let canonical = if normalized.is_empty() {
        default.to_owned()
    } else {
        normalized
    };
    let expected_prefix = format!("{provider_namespace}.");

    if !canonical.starts_with(expected_prefix.as_str()) {
        return Err(ConfigError::configuration(format!(
            "Invalid `{field_name}` value '{canonical}' in WORKBRIDGE_CONFIG: provider keys must be namespaced under `{expected_prefix}*` (for example `{default}`)."
        )));
    }
    let suffix = canonical[expected_prefix.len()..].trim();
    if suffix.is_empty()
        || suffix.split('.').any(|segment| {
            segment.is_empty()
                || !segment.chars().all(|ch| {
                    ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-'
                })
        })
    {
        return Err(ConfigError::configuration(format!(
            "Invalid `{field_name}` value '{canonical}' in WORKBRIDGE_CONFIG: expected format `{provider_namespace}.<provider_key>` where each key segment contains only lowercase letters, digits, `_`, or `-`."
        )));
    }

    if *value != canonical {
        *value = canonical;
        return Ok(true);
    }

    Ok(false)
}

fn normalize_non_empty_string(value: &mut String, default: String) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        if *value != default {
            *value = default;
            return true;
        }
        return false;
    }

    if trimmed != value {
        *value = trimmed.to_owned();
        return true;
    }
    false
}

fn normalize_trimmed(value: &mut String) -> bool {
    let trimmed = value.trim();
    if trimmed != value {
        *value = trimmed.to_owned();
        return true;
    }
    false
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
