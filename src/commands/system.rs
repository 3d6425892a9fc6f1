use colored::Colorize;

use crate::config::Settings;
use crate::llm::chat::{ChatMessage, Role};

pub fn print_help() {
    println!("\n🤖 Document Assistant Commands:");
    println!("  Just type a question about your loaded documents");
    println!();

    println!("📄 Document Commands:");
    println!("  load <file> [...]  - Load PDF or TXT files into the session");
    println!("  info               - Show document and chunk statistics");
    println!("  reset              - Forget all documents and chat history");
    println!();

    println!("💬 Chat Commands:");
    println!("  ask <question>     - Ask a question (or just type it)");
    println!("  history            - Show this session's conversation");
    println!();

    println!("⚙️ System Commands:");
    println!("  settings  - Show the active configuration");
    println!("  help      - Show this help menu");
    println!("  exit      - Exit the program");
    println!();
}

pub fn print_settings(settings: &Settings) {
    println!("\n⚙️ Settings:");
    for (name, value) in settings.get_info() {
        println!("  {}: {}", name, value.cyan());
    }
    println!();
}

pub fn print_history(history: &[ChatMessage]) {
    if history.is_empty() {
        println!("💭 No messages yet.");
        return;
    }
    for message in history {
        let time = message.timestamp.format("%H:%M:%S").to_string();
        match message.role {
            Role::User => println!("{} {} {}", time.bright_black(), "You:".bright_cyan(), message.content),
            Role::Assistant => println!(
                "{} {} {}",
                time.bright_black(),
                "Assistant:".bright_green(),
                message.content.truecolor(255, 236, 179)
            ),
        }
    }
    println!();
}

pub fn goodbye() {
    println!("👋 Goodbye!");
}
