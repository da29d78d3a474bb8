use workbridge_core::{CoreError, WorkItemId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    BranchName { id: WorkItemId, title: String },
    Branches { id: WorkItemId },
    PullRequest { id: WorkItemId },
    Relations { id: WorkItemId },
    StartBranch { id: WorkItemId },
    Activate { id: WorkItemId },
    CreatePullRequest { id: WorkItemId },
    Start { id: WorkItemId },
    Context { id: WorkItemId },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub json: bool,
    pub command: CliCommand,
}

/// Parses everything after the program name.
pub fn parse_cli_args<I>(args: I) -> Result<CliArgs, CoreError>
where
    I: IntoIterator<Item = String>,
{
    let mut json = false;
    let mut positional = Vec::new();

    for arg in args {
        match arg.as_str() {
            "--json" => json = true,
            "--help" | "-h" => {
                return Ok(CliArgs {
                    json,
                    command: CliCommand::Help,
                })
            }
            value if value.starts_with("--") => {
                return Err(CoreError::Configuration(format!(
                    "Unknown flag '{value}'. Run with --help for valid flags."
                )));
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let Some(command) = positional.next() else {
        return Ok(CliArgs {
            json,
            command: CliCommand::Help,
        });
    };

    let command = match command.as_str() {
        "branch-name" => {
            let id = read_work_item_id(&command, positional.next())?;
            let title = positional.collect::<Vec<_>>().join(" ");
            if title.trim().is_empty() {
                return Err(CoreError::Configuration(
                    "Missing title after work item ID. Use branch-name <id> <title...>.".to_owned(),
                ));
            }
            return Ok(CliArgs {
                json,
                command: CliCommand::BranchName { id, title },
            });
        }
        "branches" => CliCommand::Branches {
            id: read_work_item_id(&command, positional.next())?,
        },
        "pr" => CliCommand::PullRequest {
            id: read_work_item_id(&command, positional.next())?,
        },
        "relations" => CliCommand::Relations {
            id: read_work_item_id(&command, positional.next())?,
        },
        "start-branch" => CliCommand::StartBranch {
            id: read_work_item_id(&command, positional.next())?,
        },
        "activate" => CliCommand::Activate {
            id: read_work_item_id(&command, positional.next())?,
        },
        "create-pr" => CliCommand::CreatePullRequest {
            id: read_work_item_id(&command, positional.next())?,
        },
        "start" => CliCommand::Start {
            id: read_work_item_id(&command, positional.next())?,
        },
        "context" => CliCommand::Context {
            id: read_work_item_id(&command, positional.next())?,
        },
        unknown => {
            return Err(CoreError::Configuration(format!(
                "Unknown command '{unknown}'. Run with --help for valid commands."
            )));
        }
    };

    if let Some(extra) = positional.next() {
        return Err(CoreError::Configuration(format!(
            "Unexpected argument '{extra}'. Run with --help for valid flags."
        )));
    }

    Ok(CliArgs { json, command })
}

fn read_work_item_id(command: &str, value: Option<String>) -> Result<WorkItemId, CoreError> {
    let value = value.ok_or_else(|| {
        CoreError::Configuration(format!(
            "Missing work item ID. Use {command} <id>."
        ))
    })?;
    value.parse()
}

pub fn print_cli_help() {
    println!("Usage: workbridge [--json] <command> [args]");
    println!();
    println!("  branch-name <id> <title...>   Print the canonical branch name for a work item");
    println!("  branches <id>                 List branches that belong to a work item");
    println!("  pr <id>                       Show the first active pull request for those branches");
    println!("  relations <id>                Show parent, siblings, children and related items");
    println!("  start-branch <id>             Create the canonical branch if it does not exist");
    println!("  activate <id>                 Assign the work item to you and mark it Active");
    println!("  create-pr <id>                Open a pull request from the canonical branch");
    println!("  start <id>                    Activate, create the branch and open a pull request");
    println!("  context <id>                  Print the item and its surroundings as plain text");
    println!();
    println!("  --json                        Print JSON instead of text");
    println!("  --help                        Show this help message");
}
