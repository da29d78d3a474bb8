use std::fmt::Write as _;

use anyhow::{Context, Result};
use serde::Serialize;
use workbridge_core::{ProvisionedBranch, RelationGraph, ResolutionWarning, WorkItemIdentity};

use crate::app::{
    ActivationReport, BranchReport, CreatedPullRequestReport, PullRequestReport, StartReport,
    Workbridge,
};
use crate::cli::{CliArgs, CliCommand};

/// What a command printed plus the failures it recovered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub warnings: Vec<ResolutionWarning>,
}

#[derive(Serialize)]
struct BranchNameOutput<'a> {
    branch: &'a str,
}

pub async fn execute(app: &Workbridge, args: &CliArgs) -> Result<CommandOutput> {
    let (stdout, warnings) = match &args.command {
        CliCommand::BranchName { id, title } => {
            let branch = app.branch_name(*id, title);
            let stdout = if args.json {
                to_json(&BranchNameOutput { branch: &branch })?
            } else {
                branch
            };
            (stdout, Vec::new())
        }
        CliCommand::Branches { id } => {
            let (report, warnings) = app
                .branches(*id)
                .await
                .with_context(|| format!("listing branches for work item {id}"))?
                .into_parts();
            let stdout = if args.json {
                to_json(&report)?
            } else {
                render_branches(&report)
            };
            (stdout, warnings)
        }
        CliCommand::PullRequest { id } => {
            let (report, warnings) = app
                .pull_request(*id)
                .await
                .with_context(|| format!("looking up pull requests for work item {id}"))?
                .into_parts();
            let stdout = if args.json {
                to_json(&report)?
            } else {
                render_pull_request(&report)
            };
            (stdout, warnings)
        }
        CliCommand::Relations { id } => {
            let (graph, warnings) = app
                .relations(*id)
                .await
                .with_context(|| format!("resolving relations for work item {id}"))?
                .into_parts();
            let stdout = if args.json {
                to_json(&graph)?
            } else {
                render_relations(&graph)
            };
            (stdout, warnings)
        }
        CliCommand::StartBranch { id } => {
            let (outcome, warnings) = app
                .start_branch(*id)
                .await
                .with_context(|| format!("creating branch for work item {id}"))?
                .into_parts();
            let stdout = if args.json {
                to_json(&outcome)?
            } else {
                render_provisioned(&outcome)
            };
            (stdout, warnings)
        }
        CliCommand::Activate { id } => {
            let report = app
                .activate(*id)
                .await
                .with_context(|| format!("activating work item {id}"))?;
            let stdout = if args.json {
                to_json(&report)?
            } else {
                render_activation(&report)
            };
            (stdout, Vec::new())
        }
        CliCommand::CreatePullRequest { id } => {
            let (report, warnings) = app
                .create_pull_request(*id)
                .await
                .with_context(|| format!("creating pull request for work item {id}"))?
                .into_parts();
            let stdout = if args.json {
                to_json(&report)?
            } else {
                render_created_pull_request(&report)
            };
            (stdout, warnings)
        }
        CliCommand::Start { id } => {
            let (report, warnings) = app
                .start(*id)
                .await
                .with_context(|| format!("starting work on work item {id}"))?
                .into_parts();
            let stdout = if args.json {
                to_json(&report)?
            } else {
                render_start(&report)
            };
            (stdout, warnings)
        }
        CliCommand::Context { id } => {
            let (report, warnings) = app
                .context(*id)
                .await
                .with_context(|| format!("building context for work item {id}"))?
                .into_parts();
            let stdout = if args.json {
                to_json(&report)?
            } else {
                report.context
            };
            (stdout, warnings)
        }
        CliCommand::Help => (String::new(), Vec::new()),
    };

    Ok(CommandOutput { stdout, warnings })
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serializing command output")
}

fn describe(item: &WorkItemIdentity) -> String {
    let mut line = format!("#{}", item.id);
    if !item.work_item_type.is_empty() {
        let _ = write!(line, " [{}]", item.work_item_type);
    }
    let _ = write!(line, " {}", item.title);
    if !item.state.is_empty() {
        let _ = write!(line, " ({})", item.state);
    }
    line
}

fn render_branches(report: &BranchReport) -> String {
    let mut out = describe(&report.work_item);
    if let Some(url) = &report.work_item_url {
        let _ = write!(out, "  {url}");
    }
    for (branch, url) in report.branches.iter().zip(&report.urls) {
        let _ = write!(out, "\n  {}  {url}", branch.as_str());
    }
    out
}

fn render_pull_request(report: &PullRequestReport) -> String {
    match (&report.pull_request, &report.url) {
        (Some(found), url) => {
            let mut out = format!(
                "Pull request {}: {} ({}, from {})",
                found.request_id, found.title, found.project, found.source_branch
            );
            if let Some(url) = url {
                let _ = write!(out, "\n  {url}");
            }
            out
        }
        (None, _) => format!(
            "No active pull request found for work item #{}",
            report.work_item.id
        ),
    }
}

fn render_relations(graph: &RelationGraph) -> String {
    let mut out = String::from("Parent:");
    match &graph.parent {
        Some(parent) => {
            let _ = write!(out, "\n  {}", describe(parent));
        }
        None => out.push_str("\n  (none)"),
    }
    for (heading, items) in [
        ("Siblings", &graph.siblings),
        ("Children", &graph.children),
        ("Related", &graph.related),
    ] {
        let _ = write!(out, "\n{heading}:");
        if items.is_empty() {
            out.push_str("\n  (none)");
        }
        for item in items {
            let _ = write!(out, "\n  {}", describe(item));
        }
    }
    out
}

fn render_provisioned(outcome: &ProvisionedBranch) -> String {
    match outcome {
        ProvisionedBranch::Created {
            branch,
            base_branch,
            ..
        } => format!("Created branch {branch} from {base_branch}"),
        ProvisionedBranch::AlreadyExists { branch } => {
            format!("Branch {branch} already exists")
        }
    }
}

fn render_activation(report: &ActivationReport) -> String {
    let mut out = format!(
        "Activated {} and assigned it to {}",
        describe(&report.activation.work_item),
        report.activation.assigned_to
    );
    if let Some(url) = &report.work_item_url {
        let _ = write!(out, "\n  {url}");
    }
    out
}

fn render_created_pull_request(report: &CreatedPullRequestReport) -> String {
    let created = &report.pull_request;
    let mut out = format!(
        "Created pull request {}: {} ({} -> {})\n  {}",
        created.request_id, created.title, created.source_branch, created.target_branch, report.url
    );
    if !created.linked {
        let _ = write!(out, "\n  work item #{} is not linked", report.work_item.id);
    }
    out
}

fn render_start(report: &StartReport) -> String {
    let started = &report.started;
    let mut out = format!(
        "Activated {} and assigned it to {}",
        describe(&started.work_item),
        started.assigned_to
    );
    let _ = write!(out, "\n{}", render_provisioned(&started.branch));
    let created = &started.pull_request;
    let _ = write!(
        out,
        "\nCreated pull request {}: {} ({} -> {})\n  {}",
        created.request_id,
        created.title,
        created.source_branch,
        created.target_branch,
        report.pull_request_url
    );
    out
}
