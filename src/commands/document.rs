use colored::Colorize;
use std::path::Path;

use crate::document::Upload;
use crate::llm::chat::ChatSession;

use super::spinner;

/// `load <path>...`: reads each file and indexes it into the session.
/// Fails only if none of the files could be indexed.
pub async fn handle_load(args: &str, session: &mut ChatSession) -> Result<(), String> {
    let paths: Vec<&str> = args.split_whitespace().collect();
    if paths.is_empty() {
        return Err("Missing file path".to_string());
    }

    let mut loaded = 0;
    for path in &paths {
        match load_one(path, session).await {
            Ok(()) => loaded += 1,
            Err(e) => eprintln!("❌ {}", e.red()),
        }
    }

    if loaded == 0 {
        return Err("No documents were loaded".to_string());
    }
    println!(
        "✅ {} document(s) ready, {} chunks indexed. Ask away!",
        loaded.to_string().cyan(),
        session.info().indexed_chunks.to_string().cyan()
    );
    Ok(())
}

async fn load_one(path: &str, session: &mut ChatSession) -> Result<(), String> {
    let filename = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Invalid file path: {}", path))?
        .to_string();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path, e))?;

    println!("📄 Processing {}", filename.bright_yellow());
    let spinner = spinner("Chunking and embedding...");
    let result = session.ingest(Upload::new(filename, bytes)).await;
    spinner.finish_and_clear();

    let report = result.map_err(|e| e.to_string())?;
    println!(
        "   {} pages, {} characters, {} chunks",
        report.document.pages,
        report.document.characters,
        report.document.chunks
    );
    Ok(())
}

pub fn print_info(session: &ChatSession) {
    let info = session.info();
    if info.loaded.is_empty() {
        println!("📭 No documents loaded. Use {} to add one.", "load <file>".cyan());
        return;
    }

    println!("\n📚 Document Info:");
    for doc in &info.loaded {
        println!(
            "  • {} ({:?}, {} pages, {} chars, {} chunks)",
            doc.filename.bright_yellow(),
            doc.kind,
            doc.pages,
            doc.characters,
            doc.chunks
        );
    }
    println!("  Total Documents: {}", info.documents.total_documents.to_string().cyan());
    println!("  Total Characters: {}", info.documents.total_characters.to_string().cyan());
    println!("  Avg Chars/Doc: {}", info.documents.avg_chars_per_doc.to_string().cyan());

    println!("\n🧩 Chunk Info:");
    println!("  Total Chunks: {}", info.chunks.total_chunks.to_string().cyan());
    println!("  Avg Chunk Size: {}", info.chunks.avg_chunk_size.to_string().cyan());
    println!("  Min Chunk Size: {}", info.chunks.min_chunk_size.to_string().cyan());
    println!("  Max Chunk Size: {}", info.chunks.max_chunk_size.to_string().cyan());
    println!("  Last request: {}", info.state);
    println!();
}
