use thiserror::Error;

pub use workbridge_core::{CoreError, RemoteWorkClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteProviderKind {
    AzureCli,
}

impl RemoteProviderKind {
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::AzureCli => "remote.azure_cli",
        }
    }

    pub fn from_key(provider_key: &str) -> Option<Self> {
        match provider_key {
            "remote.azure_cli" => Some(Self::AzureCli),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteProviderError {
    #[error("unknown remote provider key: {0}")]
    UnknownProviderKey(String),
    #[error("failed to initialize remote provider: {0}")]
    ProviderInitialization(String),
}

#[cfg(test)]
mod tests {
    use super::RemoteProviderKind;

    #[test]
    fn provider_keys_round_trip() {
        let key = RemoteProviderKind::AzureCli.as_key();
        assert_eq!(RemoteProviderKind::from_key(key), Some(RemoteProviderKind::AzureCli));
        assert_eq!(RemoteProviderKind::from_key("azure_cli"), None);
    }
}
