// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree detection for `amelia start`.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Where a workflow will run and what to call it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub name: String,
}

/// Derive the worktree root and display name from the repository at `cwd`.
///
/// The name is the current branch, `detached-<short-sha>` for a detached
/// HEAD, or the directory name when branch detection fails entirely.
pub fn detect_worktree(cwd: &Path) -> Result<WorktreeInfo> {
    let toplevel = git(cwd, &["rev-parse", "--show-toplevel"])
        .context("not inside a git worktree")?;
    let path = PathBuf::from(toplevel.trim());
    if path.as_os_str().is_empty() {
        bail!("git did not report a worktree root");
    }

    let branch = git(cwd, &["rev-parse", "--abbrev-ref", "HEAD"]).ok();
    let short_sha = git(cwd, &["rev-parse", "--short", "HEAD"]).ok();
    let name = worktree_name(
        branch.as_deref().map(str::trim),
        short_sha.as_deref().map(str::trim),
        &path,
    );

    Ok(WorktreeInfo { path, name })
}

/// Pure name-derivation rule, split out for tests.
fn worktree_name(branch: Option<&str>, short_sha: Option<&str>, path: &Path) -> String {
    match branch {
        // A detached HEAD reports the literal string "HEAD"
        Some("HEAD") => match short_sha {
            Some(sha) if !sha.is_empty() => format!("detached-{sha}"),
            _ => dir_name(path),
        },
        Some(branch) if !branch.is_empty() => branch.to_string(),
        _ => dir_name(path),
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "worktree".to_string())
}

fn git(cwd: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .context("failed to run git")?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
