//! `dossier docs` subcommands.

use std::path::Path;

use anyhow::Result;

use dossier_core::DossierContext;

pub async fn list(ctx: &DossierContext) -> Result<()> {
    let documents = ctx.documents().list().await?;
    if documents.is_empty() {
        println!("No documents uploaded.");
    }
    for document in &documents {
        println!(
            "{}  {:<5}  {:>10} bytes  {}",
            document.id,
            document.file_type,
            document.file_size,
            document.display_name()
        );
    }
    Ok(())
}

pub async fn upload(ctx: &DossierContext, path: &Path) -> Result<()> {
    let document = ctx.documents().upload(path).await?;
    println!("Uploaded {} as {}", document.display_name(), document.id);
    Ok(())
}

pub async fn delete(ctx: &DossierContext, id: &str) -> Result<()> {
    ctx.documents().delete(id).await?;
    println!("Deleted {id}");
    Ok(())
}
