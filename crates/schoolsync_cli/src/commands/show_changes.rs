//! Show-changes command implementation.

use schoolsync_store::LocalStore;
use serde::Serialize;
use std::path::Path;

/// Characters of payload shown per entry in text output.
const PAYLOAD_PREVIEW_CHARS: usize = 200;

/// Outbox listing result.
#[derive(Debug, Serialize)]
pub struct ShowChangesResult {
    /// Database path.
    pub path: String,
    /// Entries still waiting for upload.
    pub pending: u64,
    /// Listed entries, newest first.
    pub changes: Vec<ChangeRow>,
}

/// A single outbox entry.
#[derive(Debug, Serialize)]
pub struct ChangeRow {
    /// Local sequence.
    pub id: i64,
    /// Entity type tag.
    pub entity_type: String,
    /// Entity identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Mutation kind.
    pub action_type: String,
    /// Payload as recorded.
    pub payload: serde_json::Value,
    /// Creation timestamp.
    pub created_at: String,
    /// Acknowledgement timestamp.
    pub synced_at: Option<String>,
}

/// Runs the show-changes command.
pub fn run(
    db_path: &Path,
    all: bool,
    limit: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !db_path.exists() {
        return Err(format!("No station database found at {:?}", db_path).into());
    }
    let store = LocalStore::open(db_path)?;
    let mut result = collect(&store, all, limit)?;
    result.path = db_path.display().to_string();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Reads the newest outbox entries from `store`.
pub fn collect(
    store: &LocalStore,
    all: bool,
    limit: usize,
) -> Result<ShowChangesResult, Box<dyn std::error::Error>> {
    let changes = store
        .recent_changes(limit, all)?
        .into_iter()
        .map(|entry| ChangeRow {
            id: entry.id,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            action_type: entry.action_type,
            payload: entry.payload,
            created_at: entry.created_at,
            synced_at: entry.synced_at,
        })
        .collect();
    Ok(ShowChangesResult {
        path: String::new(),
        pending: store.pending_count()?,
        changes,
    })
}

fn print_text_output(result: &ShowChangesResult) {
    println!("Outbox: {}", result.path);
    println!("Pending: {}", result.pending);
    println!();

    if result.changes.is_empty() {
        println!("No changes.");
        return;
    }
    for change in &result.changes {
        let status = match &change.synced_at {
            Some(at) => format!("synced {at}"),
            None => "pending".to_string(),
        };
        println!(
            "#{} {} {} {}:{} [{}]",
            change.id,
            change.created_at,
            change.action_type,
            change.entity_type,
            change.entity_id.as_deref().unwrap_or("-"),
            status
        );
        println!("    {}", preview(&change.payload.to_string()));
    }
}

/// Truncates `text` to the preview length on a character boundary.
fn preview(text: &str) -> String {
    match text.char_indices().nth(PAYLOAD_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
