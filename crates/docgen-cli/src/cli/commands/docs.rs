//! Document command handlers.

use std::path::PathBuf;

use anyhow::{Context, Result};
use docgen_core::controller::Controller;
use docgen_core::status::OperationStatus;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct FetchOptions {
    pub output: Option<PathBuf>,
    pub push: bool,
    pub webhook: bool,
}

pub async fn fetch(controller: &Controller, repo: &str, opts: &FetchOptions) -> Result<()> {
    let progress = spawn_progress(controller);
    let status = controller.fetch_document(repo).await;
    progress.abort();
    finish(&status)?;

    if let Some(document) = controller.snapshot().document {
        match &opts.output {
            Some(path) => {
                std::fs::write(path, &document.content)
                    .with_context(|| format!("write document to {}", path.display()))?;
                eprintln!("Document written to {}", path.display());
            }
            None => println!("{}", document.content),
        }
        if let Some(hash) = document.commit_hash.as_deref() {
            eprintln!("Commit: {hash}");
        }
    }

    if opts.webhook {
        webhook(controller, repo).await?;
    }
    if opts.push {
        push(controller, repo, None).await?;
    }
    Ok(())
}

pub async fn push(controller: &Controller, repo: &str, commit: Option<&str>) -> Result<()> {
    let progress = spawn_progress(controller);
    let status = controller.push_to_confluence(repo, commit).await;
    progress.abort();
    finish(&status)
}

pub async fn webhook(controller: &Controller, repo: &str) -> Result<()> {
    let progress = spawn_progress(controller);
    let status = controller.setup_webhook(repo).await;
    progress.abort();
    finish(&status)
}

/// Echoes in-progress labels to stderr while an operation runs.
fn spawn_progress(controller: &Controller) -> JoinHandle<()> {
    let mut rx = controller.subscribe();
    rx.mark_unchanged();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().status.clone();
            if let OperationStatus::InProgress(label) = status {
                eprintln!("{label}");
            }
        }
    })
}

/// Maps the final status to output or an error.
fn finish(status: &OperationStatus) -> Result<()> {
    match status {
        OperationStatus::Success(message) => {
            eprintln!("✓ {message}");
            Ok(())
        }
        OperationStatus::Notice(message) => {
            eprintln!("ℹ {message}");
            Ok(())
        }
        OperationStatus::Failure(message) => anyhow::bail!("{message}"),
        OperationStatus::Idle | OperationStatus::InProgress(_) => Ok(()),
    }
}
