use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::config::Settings;
use crate::llm::chat::ChatSession;

mod document;
mod system;

/// What the REPL loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Exit,
}

pub struct CommandHandler {
    session: ChatSession,
    settings: Settings,
}

impl CommandHandler {
    pub fn new(session: ChatSession, settings: Settings) -> Self {
        Self { session, settings }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub async fn handle_command(&mut self, input: &str) -> Result<CommandOutcome, String> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(CommandOutcome::Continue);
        }

        match input.to_lowercase().as_str() {
            "help" => {
                system::print_help();
                return Ok(CommandOutcome::Continue);
            }
            "exit" | "quit" => {
                system::goodbye();
                return Ok(CommandOutcome::Exit);
            }
            "settings" => {
                system::print_settings(&self.settings);
                return Ok(CommandOutcome::Continue);
            }
            "history" => {
                system::print_history(self.session.history());
                return Ok(CommandOutcome::Continue);
            }
            "info" => {
                document::print_info(&self.session);
                return Ok(CommandOutcome::Continue);
            }
            "reset" => {
                self.session.reset();
                println!("🔄 {}", "Session cleared. Load a new document to start again.".green());
                return Ok(CommandOutcome::Continue);
            }
            "load" => return Err("Usage: load <file.pdf|file.txt> [more files...]".to_string()),
            _ => {}
        }

        if let Some(paths) = input.strip_prefix("load ") {
            document::handle_load(paths, &mut self.session).await?;
            return Ok(CommandOutcome::Continue);
        }

        let question = input.strip_prefix("ask ").unwrap_or(input);
        self.handle_chat(question.trim()).await?;
        Ok(CommandOutcome::Continue)
    }

    async fn handle_chat(&mut self, question: &str) -> Result<(), String> {
        let input_tokens = question.split_whitespace().count();

        let spinner = spinner("Thinking...");
        let result = self.session.ask(question).await;
        spinner.finish_and_clear();

        let answer = result.map_err(|e| e.to_string())?;
        let response_tokens = answer.text.split_whitespace().count();

        println!("\n{}", answer.text.truecolor(255, 236, 179));
        if !answer.sources.is_empty() {
            println!("\n{}", "Sources:".bright_black());
            for source in &answer.sources {
                println!(
                    "  {} #{} {}",
                    source.source.cyan(),
                    source.chunk_index,
                    source.preview.replace('\n', " ").bright_black()
                );
            }
        }
        println!(
            "\n📊 Tokens: 📥 Input: {} | 📤 Response: {} | 📈 Total: {}\n",
            input_tokens.to_string().cyan(),
            response_tokens.to_string().cyan(),
            (input_tokens + response_tokens).to_string().cyan()
        );
        Ok(())
    }
}

pub(crate) fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
