//! Knowledge-base upload pipeline.
//!
//! Chunks a municipal-code document, embeds each chunk, and inserts the
//! rows into Supabase. Requests run strictly sequentially with a fixed
//! pause between chunks; the first failed chunk aborts the whole run,
//! leaving whatever was already inserted in place (no rollback).

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::Duration;

use crate::chunk::chunk_code_text;
use crate::config::Config;
use crate::embedding;
use crate::supabase::{NewChunk, NewDocument, SupabaseClient};

pub async fn run_upload(config: &Config, file: &Path, dry_run: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read document: {}", file.display()))?;

    let chunks = chunk_code_text(&text, &config.upload.hierarchy);
    if chunks.is_empty() {
        bail!("Document produced no chunks: {}", file.display());
    }

    if dry_run {
        println!("upload {} (dry-run)", file.display());
        println!("  document: {}", config.upload.document_name);
        println!("  chunks: {}", chunks.len());
        for chunk in &chunks {
            println!("    [{}] {}", chunk.chunk_index, chunk.section_title);
        }
        return Ok(());
    }

    // Validate all credentials before the first request
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }
    let provider = embedding::create_provider(&config.embedding)?;
    let client = SupabaseClient::new(&config.supabase)?;
    println!(
        "embedding with {} ({} dimensions)",
        provider.model_name(),
        provider.dims()
    );

    println!("[1/2] creating document record...");
    let document_id = client
        .insert_document(&NewDocument {
            name: config.upload.document_name.clone(),
            document_type: config.upload.document_type.clone(),
            file_path: config.upload.source_url.clone(),
            status: "active".to_string(),
            total_chunks: chunks.len() as i64,
        })
        .await?;
    println!("  document id: {}", document_id);

    println!("[2/2] uploading {} chunks...", chunks.len());
    let total = chunks.len();

    for (i, chunk) in chunks.iter().enumerate() {
        println!("  [{}/{}] {}", i + 1, total, chunk.section_title);

        let vector =
            embedding::embed_query(provider.as_ref(), &config.embedding, &chunk.content).await?;
        println!("    embedded ({} dimensions)", vector.len());

        client
            .insert_chunk(&NewChunk {
                document_id: document_id.clone(),
                document_name: config.upload.document_name.clone(),
                document_type: config.upload.document_type.clone(),
                chunk_index: chunk.chunk_index,
                content: chunk.content.clone(),
                content_hash: chunk.content_hash.clone(),
                section_title: chunk.section_title.clone(),
                section_hierarchy: chunk.section_hierarchy.clone(),
                embedding: vector,
                is_binding: true,
                source_file_path: config.upload.source_url.clone(),
            })
            .await?;
        println!("    inserted");

        // Fixed spacing between requests, to stay under rate limits
        tokio::time::sleep(Duration::from_millis(config.upload.delay_ms)).await;
    }

    println!("upload complete: {} chunks", total);
    Ok(())
}
