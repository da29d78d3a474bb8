mod client;
mod records;
mod runner;
mod safety_guards;


pub use client::{AzCliClient, AzCliClientConfig};
pub use runner::{CommandRunner, ProcessCommandRunner};

const ENV_AZ_BIN: &str = "WORKBRIDGE_AZ_BIN";
const ENV_ALLOW_UNSAFE_COMMAND_PATHS: &str = "WORKBRIDGE_ALLOW_UNSAFE_COMMAND_PATHS";
