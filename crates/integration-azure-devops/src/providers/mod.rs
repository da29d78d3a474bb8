pub mod azure_cli;
