//! One-time schema migration: allow the `city_code` document type.
//!
//! Extends the CHECK constraints on the `documents` and `knowledge_chunks`
//! tables so municipal code uploads are accepted alongside the original HOA
//! document types. Runs through the `exec_sql` RPC when the project exposes
//! it; otherwise prints the SQL for manual execution in the Supabase SQL
//! editor, which is the documented recovery path.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::supabase::SupabaseClient;

const MIGRATION_SQL: &str = r#"
-- Add 'city_code' to documents table CHECK constraint
ALTER TABLE documents DROP CONSTRAINT IF EXISTS documents_valid_type;
ALTER TABLE documents ADD CONSTRAINT documents_valid_type CHECK (
    document_type IN (
        'design_guidelines',
        'ccr',
        'rules_regulations',
        'application_form',
        'submittal',
        'response_letter',
        'amendment',
        'city_code'
    )
);

-- Add 'city_code' to knowledge_chunks table CHECK constraint
ALTER TABLE knowledge_chunks DROP CONSTRAINT IF EXISTS chunks_valid_document_type;
ALTER TABLE knowledge_chunks ADD CONSTRAINT chunks_valid_document_type CHECK (
    document_type IN (
        'design_guidelines',
        'ccr',
        'rules_regulations',
        'application_form',
        'submittal',
        'response_letter',
        'amendment',
        'city_code'
    )
);
"#;

/// Apply the document-type migration.
///
/// Configuration errors (missing credentials) fail before any request is
/// made. A transport failure is an error; an unavailable RPC is not — the
/// SQL is printed for manual execution instead.
pub async fn run_migration(config: &Config) -> Result<()> {
    let client =
        SupabaseClient::new(&config.supabase).context("migration requires Supabase credentials")?;

    println!("migrate: add 'city_code' document type");

    if client.exec_sql(MIGRATION_SQL).await? {
        println!("migration applied");
        return Ok(());
    }

    println!("exec_sql RPC not available; run this SQL in the Supabase SQL editor:");
    println!("{}", "-".repeat(60));
    println!("{}", MIGRATION_SQL.trim());
    println!("{}", "-".repeat(60));
    println!("after running, execute: arcbot upload <file>");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_sql_covers_both_tables() {
        assert!(MIGRATION_SQL.contains("ALTER TABLE documents"));
        assert!(MIGRATION_SQL.contains("ALTER TABLE knowledge_chunks"));
        assert_eq!(MIGRATION_SQL.matches("'city_code'").count(), 2);
    }
}
