pub mod factory;
pub mod interface;
pub mod providers;

pub use factory::{
    build_provider, build_provider_with_config, resolve_provider_kind, supported_provider_keys,
    RemoteProviderFactoryConfig, RemoteProviderFactoryOutput,
};
pub use interface::{RemoteProviderError, RemoteProviderKind};
pub use providers::azure_cli::{
    AzCliClient, AzCliClientConfig, CommandRunner, ProcessCommandRunner,
};
