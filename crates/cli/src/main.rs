// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! amelia - thin CLI over the orchestrator's REST surface

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod git;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::ApiClient;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "amelia",
    version,
    about = "Amelia - agent workflows for your worktrees"
)]
struct Cli {
    /// Server URL (default http://127.0.0.1:7340, or $AMELIA_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a workflow in the current git worktree
    Start {
        /// Issue handle (alphanumeric, dash, underscore)
        issue_id: String,
        /// Skip planning by supplying a plan file
        #[arg(long, conflicts_with = "plan_content")]
        plan_file: Option<PathBuf>,
        /// Skip planning by supplying plan markdown inline
        #[arg(long)]
        plan_content: Option<String>,
        /// Pipeline name (default: implementation)
        #[arg(long)]
        pipeline: Option<String>,
        /// Stage driver name
        #[arg(long)]
        driver: Option<String>,
        /// Agent profile
        #[arg(long)]
        profile: Option<String>,
    },
    /// Approve the pending gate of a workflow
    Approve {
        workflow_id: String,
    },
    /// Reject the pending gate with feedback
    Reject {
        workflow_id: String,
        /// Why the plan was rejected
        #[arg(short = 'm', long)]
        feedback: String,
    },
    /// Cancel a workflow (no-op if already terminal)
    Cancel {
        workflow_id: String,
    },
    /// Show a workflow, or all active workflows
    Status {
        workflow_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = ApiClient::new(cli.url)?;

    match cli.command {
        Commands::Start { issue_id, plan_file, plan_content, pipeline, driver, profile } => {
            let cwd = std::env::current_dir()?;
            let worktree = git::detect_worktree(&cwd)?;
            let plan_file = plan_file.map(|p| cwd.join(p).canonicalize()).transpose()?;

            let workflow = client
                .start(client::StartParams {
                    issue_id,
                    worktree_path: worktree.path,
                    worktree_name: Some(worktree.name),
                    pipeline,
                    driver,
                    profile,
                    plan_file,
                    plan_content,
                })
                .await?;
            println!("started {} ({})", workflow.id, workflow.status);
        }

        Commands::Approve { workflow_id } => {
            let status = client.approve(&workflow_id).await?;
            println!("{} {}", status.id, status.status);
        }

        Commands::Reject { workflow_id, feedback } => {
            let status = client.reject(&workflow_id, &feedback).await?;
            println!("{} {}", status.id, status.status);
        }

        Commands::Cancel { workflow_id } => {
            let status = client.cancel(&workflow_id).await?;
            println!("{} {}", status.id, status.status);
        }

        Commands::Status { workflow_id: Some(id) } => {
            let detail = client.workflow(&id).await?;
            print_detail(&detail);
        }

        Commands::Status { workflow_id: None } => {
            let active = client.active().await?;
            if active.is_empty() {
                println!("no active workflows");
            } else {
                for wf in active {
                    println!(
                        "{}  {:<12} {:<12} {}",
                        wf.id, wf.status, wf.issue_id, wf.worktree_name
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_detail(detail: &client::WorkflowDetail) {
    let wf = &detail.workflow;
    println!("workflow   {}", wf.id);
    println!("issue      {}", wf.issue_id);
    println!("worktree   {} ({})", wf.worktree_path.display(), wf.worktree_name);
    println!("status     {}", wf.status);
    if let Some(stage) = &wf.current_stage {
        println!("stage      {stage}");
    }
    if let Some(reason) = &wf.failure_reason {
        println!("reason     {reason}");
    }
    println!(
        "tokens     in={} out={} cost=${:.4}",
        detail.tokens.input_tokens, detail.tokens.output_tokens, detail.tokens.cost_usd
    );
    if !detail.recent_events.is_empty() {
        println!("events");
        for event in &detail.recent_events {
            println!("  {:>4}  {:<24} {}", event.sequence, event.event_type, event.message);
        }
    }
}
