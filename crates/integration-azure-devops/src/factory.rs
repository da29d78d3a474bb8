use std::fmt;
use std::sync::Arc;

use crate::interface::{RemoteProviderError, RemoteProviderKind, RemoteWorkClient};
use crate::providers::azure_cli::{AzCliClient, AzCliClientConfig};

const SUPPORTED_PROVIDER_KEYS: [&str; 1] = [RemoteProviderKind::AzureCli.as_key()];

pub enum RemoteProviderFactoryOutput {
    AzureCli(AzCliClient),
}

impl RemoteProviderFactoryOutput {
    pub fn into_client(self) -> Arc<dyn RemoteWorkClient> {
        match self {
            Self::AzureCli(client) => Arc::new(client),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteProviderFactoryConfig {
    pub azure_cli: AzCliClientConfig,
}

impl fmt::Debug for RemoteProviderFactoryOutput {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let provider_key = match self {
            Self::AzureCli(_) => RemoteProviderKind::AzureCli.as_key(),
        };
        formatter
            .debug_struct("RemoteProviderFactoryOutput")
            .field("provider_key", &provider_key)
            .finish()
    }
}

pub fn supported_provider_keys() -> &'static [&'static str] {
    &SUPPORTED_PROVIDER_KEYS
}

pub fn resolve_provider_kind(provider_key: &str) -> Result<RemoteProviderKind, RemoteProviderError> {
    RemoteProviderKind::from_key(provider_key)
        .ok_or_else(|| RemoteProviderError::UnknownProviderKey(provider_key.to_owned()))
}

pub fn build_provider(provider_key: &str) -> Result<RemoteProviderFactoryOutput, RemoteProviderError> {
    build_provider_with_config(provider_key, RemoteProviderFactoryConfig::default())
}

pub fn build_provider_with_config(
    provider_key: &str,
    config: RemoteProviderFactoryConfig,
) -> Result<RemoteProviderFactoryOutput, RemoteProviderError> {
    let kind = resolve_provider_kind(provider_key)?;
    let provider = match kind {
        RemoteProviderKind::AzureCli => RemoteProviderFactoryOutput::AzureCli(
            AzCliClient::from_config(config.azure_cli)
                .map_err(|error| RemoteProviderError::ProviderInitialization(error.to_string()))?,
        ),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::{
        build_provider, build_provider_with_config, resolve_provider_kind, supported_provider_keys,
        RemoteProviderFactoryConfig, RemoteProviderFactoryOutput, SUPPORTED_PROVIDER_KEYS,
    };
    use crate::interface::{RemoteProviderError, RemoteProviderKind};
    use crate::providers::azure_cli::AzCliClientConfig;
    use std::path::PathBuf;

    #[test]
    fn supported_provider_keys_are_namespaced() {
        assert_eq!(supported_provider_keys(), &SUPPORTED_PROVIDER_KEYS);
        for key in supported_provider_keys() {
            let kind = resolve_provider_kind(key).expect("resolve key");
            assert_eq!(kind.as_key(), *key);
        }
    }

    #[test]
    fn resolve_provider_kind_rejects_unknown_keys() {
        let error = resolve_provider_kind("azure_cli").expect_err("reject bare key");
        assert_eq!(error.to_string(), "unknown remote provider key: azure_cli");
        assert_eq!(
            resolve_provider_kind("remote.azure_cli").expect("resolve"),
            RemoteProviderKind::AzureCli
        );
    }

    #[test]
    fn build_provider_returns_azure_cli_client() {
        let provider = build_provider("remote.azure_cli").expect("build az cli provider");
        assert!(matches!(provider, RemoteProviderFactoryOutput::AzureCli(_)));
    }

    #[test]
    fn build_provider_with_config_applies_az_binary_setting() {
        let provider = build_provider_with_config(
            "remote.azure_cli",
            RemoteProviderFactoryConfig {
                azure_cli: AzCliClientConfig {
                    binary: PathBuf::from("az-real"),
                    ..AzCliClientConfig::default()
                },
            },
        )
        .expect("build az cli provider");

        match provider {
            RemoteProviderFactoryOutput::AzureCli(client) => {
                assert_eq!(client.binary(), PathBuf::from("az-real").as_path());
            }
        }
    }

    #[test]
    fn build_provider_with_config_rejects_empty_az_binary() {
        let error = build_provider_with_config(
            "remote.azure_cli",
            RemoteProviderFactoryConfig {
                azure_cli: AzCliClientConfig {
                    binary: PathBuf::new(),
                    ..AzCliClientConfig::default()
                },
            },
        )
        .expect_err("empty az binary should fail");

        assert!(matches!(
            error,
            RemoteProviderError::ProviderInitialization(message)
                if message.contains("WORKBRIDGE_AZ_BIN is set but empty")
        ));
    }
}
