//! `dossier run`: one research session from submission to report.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};

use dossier_core::controller::{ConnectionPhase, OpenOutcome, SessionObserver};
use dossier_core::export::{self, ExportView};
use dossier_core::protocol::LogEntry;
use dossier_core::session::SessionStatus;
use dossier_core::{DossierContext, Session, SubmitParams};

/// Prints progress lines as the session streams.
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_start(&self, session: &Session) {
        println!("Researching: {}", session.query);
    }

    fn on_log(&self, _session: &Session, entry: &LogEntry) {
        println!("[{}] {}", entry.kind.as_str(), entry.output);
    }

    fn on_error(&self, _session: &Session, message: &str) {
        eprintln!("Research failed: {message}");
    }
}

pub async fn run(ctx: &DossierContext, params: SubmitParams, export_dir: Option<&Path>) -> Result<()> {
    let mut controller = ctx.controller();
    controller.set_observer(Arc::new(ConsoleObserver));

    if let OpenOutcome::AlreadyOpen = controller.open(&params)? {
        bail!("a research connection is already open");
    }

    let Some(mut phase) = controller.subscribe_phase() else {
        bail!("research connection did not start");
    };

    // Ctrl-C requests a normal close; the first one is enough.
    let mut interrupted = false;
    while *phase.borrow_and_update() != ConnectionPhase::Closed {
        tokio::select! {
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                if let Err(e) = signal {
                    log::warn!("Failed to listen for Ctrl-C: {e}");
                }
                interrupted = true;
                eprintln!("Closing connection...");
                controller.close();
            }
            changed = phase.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    let Some(outcome) = controller.wait().await else {
        bail!("research connection ended unexpectedly");
    };
    let session = outcome.session;

    match session.status {
        SessionStatus::Completed => {
            println!();
            println!("{}", session.report);
            println!();
            println!(
                "{} sources, cost ${:.4}",
                session.sources.len(),
                session.costs
            );
            if let Some(id) = &outcome.record_id {
                println!("Saved to history as {id}");
            }
            if let Some(dir) = export_dir {
                let path = export::write_export(dir, ExportView::from(&session))?;
                println!("Exported to {}", path.display());
            }
            Ok(())
        }
        SessionStatus::Error => {
            bail!(
                "{}",
                session.error.as_deref().unwrap_or("research failed")
            )
        }
        SessionStatus::Pending | SessionStatus::Running => {
            println!("Closed before any report arrived; nothing saved.");
            Ok(())
        }
    }
}
