use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use super::{DeploymentTracker, TrackingBackend, TrackingRecord};
use crate::error::{Error, Result};
use crate::utils::command;

/// Appends records to `<environment>.log` in a local clone of the tracking
/// repository, then commits and pushes.
pub struct GitLogTracker {
    repository: String,
    checkout: PathBuf,
}

impl GitLogTracker {
    pub fn new(repository: String, checkout: PathBuf) -> Self {
        Self {
            repository,
            checkout,
        }
    }

    fn dir(&self) -> String {
        self.checkout.to_string_lossy().to_string()
    }

    fn git(&self, args: &[&str], context: &str) -> Result<String> {
        command::run_in(&self.dir(), "git", args, context).map_err(git_error)
    }

    fn clone_fresh(&self) -> Result<()> {
        if let Some(parent) = self.checkout.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("create {}", parent.display())))
            })?;
        }
        log_status!("track", "Cloning tracking repository {}", self.repository);
        command::run("git", &["clone", &self.repository, &self.dir()], "git clone")
            .map_err(git_error)?;
        Ok(())
    }

    fn discard(&self) -> Result<()> {
        fs::remove_dir_all(&self.checkout).map_err(|e| {
            Error::internal_io(
                e.to_string(),
                Some(format!("remove {}", self.checkout.display())),
            )
        })
    }

    /// Make the local cache match the remote exactly.
    ///
    /// Anything committed locally but never pushed is dropped, so a record from
    /// a failed deploy cannot ride along with the next one. A cache cloned from
    /// another repository is thrown away and cloned again.
    fn sync(&self) -> Result<()> {
        if !self.checkout.join(".git").exists() {
            return self.clone_fresh();
        }

        let origin = self
            .git(&["remote", "get-url", "origin"], "git remote get-url")
            .unwrap_or_default();
        if origin != self.repository {
            log_status!(
                "track",
                "Tracking cache points at {}; recloning from {}",
                origin,
                self.repository
            );
            self.discard()?;
            return self.clone_fresh();
        }

        self.git(&["fetch", "origin"], "git fetch")?;
        let branch = self.git(&["symbolic-ref", "--short", "HEAD"], "git symbolic-ref")?;
        let upstream = format!("origin/{}", branch);
        let has_upstream = self
            .git(
                &["rev-parse", "--verify", "--quiet", &upstream],
                "git rev-parse",
            )
            .is_ok();

        if !has_upstream {
            // Nothing pushed yet; local commits can only be leftovers.
            self.discard()?;
            return self.clone_fresh();
        }

        self.git(&["reset", "--hard", &upstream], "git reset")?;
        self.git(&["clean", "-fdq"], "git clean")?;
        Ok(())
    }

    fn append(&self, record: &TrackingRecord) -> Result<String> {
        let file_name = format!("{}.log", record.environment);
        let path = self.checkout.join(&file_name);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("open {}", path.display())))
            })?;
        writeln!(file, "{}", record.to_log_line()).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("write {}", path.display())))
        })?;
        Ok(file_name)
    }

    fn commit_and_push(&self, file_name: &str, record: &TrackingRecord) -> Result<()> {
        let message = format!(
            "Deploy {} {}@{} to {}",
            record.project, record.branch, record.commit, record.environment
        );

        self.git(&["add", file_name], "git add")?;

        // Fall back to a local identity so commits work on machines without git config.
        let has_identity = self
            .git(&["config", "user.email"], "git config")
            .map(|email| !email.is_empty())
            .unwrap_or(false);
        let identity_name = format!("user.name={}", record.author);
        if has_identity {
            self.git(&["commit", "-m", &message], "git commit")?;
        } else {
            self.git(
                &[
                    "-c",
                    &identity_name,
                    "-c",
                    "user.email=stagehand@localhost",
                    "commit",
                    "-m",
                    &message,
                ],
                "git commit",
            )?;
        }

        self.git(&["push", "origin", "HEAD"], "git push")?;
        Ok(())
    }
}

fn git_error(err: Error) -> Error {
    let text = err
        .details
        .get("error")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or(err.message);
    Error::git_command_failed(text)
}

impl DeploymentTracker for GitLogTracker {
    fn backend(&self) -> TrackingBackend {
        TrackingBackend::GitLog
    }

    fn record(&self, record: &TrackingRecord) -> Result<()> {
        self.sync()?;
        let file_name = self.append(record)?;
        self.commit_and_push(&file_name, record)?;
        log_status!(
            "track",
            "Recorded {}@{} in {}",
            record.branch,
            record.commit,
            file_name
        );
        Ok(())
    }
}
