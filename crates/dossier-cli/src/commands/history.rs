//! `dossier history` subcommands.

use std::path::Path;

use anyhow::{bail, Result};

use dossier_core::export::{self, ExportView};
use dossier_core::{DossierContext, DossierError, HistoryRecord};

fn print_row(record: &HistoryRecord) {
    println!(
        "{}  {}  {:<9}  {:>6} words  {}",
        record.id,
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.status.as_str(),
        record.word_count,
        record.title
    );
}

fn find(ctx: &DossierContext, id: &str) -> Result<HistoryRecord> {
    match ctx.store.get(id)? {
        Some(record) => Ok(record),
        None => Err(DossierError::NotFound(id.to_string()).into()),
    }
}

pub fn list(ctx: &DossierContext) -> Result<()> {
    let records = ctx.state.history();
    if records.is_empty() {
        println!("No saved reports.");
    }
    for record in records.iter() {
        print_row(record);
    }
    Ok(())
}

pub fn show(ctx: &DossierContext, id: &str) -> Result<()> {
    if !ctx.state.load_from_history(&ctx.store, id)? {
        return Err(DossierError::NotFound(id.to_string()).into());
    }
    let Some(session) = ctx.state.snapshot().session else {
        bail!("history record {id} did not load");
    };

    println!("# {}", session.query);
    println!();
    println!(
        "{} | {} | {} sources | ${:.4} | {}",
        session.report_type.label(),
        session.status.as_str(),
        session.sources.len(),
        session.costs,
        session.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();
    println!("{}", session.report);

    if !session.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &session.sources {
            match &source.title {
                Some(title) => println!("- {title} <{}>", source.url),
                None => println!("- {}", source.url),
            }
        }
    }
    Ok(())
}

/// Runs the keyword through the debounced search, the same path an
/// interactive search box uses.
pub async fn search(ctx: &DossierContext, keyword: &str) -> Result<()> {
    let search = ctx.search();
    let mut results = search.subscribe();
    let generation = search.submit(keyword);

    loop {
        if results.borrow_and_update().generation >= generation {
            break;
        }
        if results.changed().await.is_err() {
            bail!("search stopped before finishing");
        }
    }

    let state = search.current();
    if state.records.is_empty() {
        println!("No reports match \"{keyword}\".");
    }
    for record in state.records.iter() {
        print_row(record);
    }
    Ok(())
}

pub fn delete(ctx: &DossierContext, id: &str) -> Result<()> {
    ctx.state.delete_from_history(&ctx.store, id)?;
    println!("Deleted {id}");
    Ok(())
}

pub fn export(ctx: &DossierContext, id: &str, out: &Path) -> Result<()> {
    let record = find(ctx, id)?;
    let path = export::write_export(out, ExportView::from(&record))?;
    println!("Exported to {}", path.display());
    Ok(())
}

pub fn stats(ctx: &DossierContext) -> Result<()> {
    let stats = ctx.store.stats()?;
    println!("directory: {}", ctx.store.dir().display());
    println!("reports:   {}", stats.total_records);
    println!("size:      {} bytes", stats.total_bytes);
    if let Some(oldest) = stats.oldest {
        println!("oldest:    {}", oldest.to_rfc3339());
    }
    if let Some(newest) = stats.newest {
        println!("newest:    {}", newest.to_rfc3339());
    }
    Ok(())
}
