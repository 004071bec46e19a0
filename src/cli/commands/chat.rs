//! Interactive chat command.
//!
//! Speaks the same turn protocol as the WebSocket session: the first
//! message that matches indexed dialogue locks the movie context, every
//! later turn replies in character.

use crate::cache::ResponseCache;
use crate::chat::{ChatEngine, ChatService, TranscriptStore};
use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::embedding::create_embedder;
use crate::error::Result;
use crate::index::create_index;
use crate::retrieval::RetrievalService;
use crate::session::SessionContext;
use console::style;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

/// Run the interactive chat command.
pub async fn run_chat(
    user: Option<String>,
    model: Option<String>,
    settings: Settings,
) -> Result<()> {
    let embedder = create_embedder(&settings).await?;
    let index = create_index(&settings)?;
    let cache = Arc::new(ResponseCache::new());

    let retrieval = RetrievalService::new(
        cache.clone(),
        embedder,
        index,
        settings.index.namespace.clone(),
        Duration::from_secs(settings.cache.search_ttl_seconds),
    );

    let transcripts = Arc::new(TranscriptStore::new(&settings.transcript_path())?);
    let chat_service = ChatService::new(
        transcripts,
        cache,
        Duration::from_secs(settings.cache.listing_ttl_seconds),
    );

    let model = model.unwrap_or_else(|| settings.chat.model.clone());
    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;
    let mut engine = ChatEngine::new(&model, settings.chat.history_turns).with_prompts(prompts);
    let mut session = SessionContext::new();

    println!("\n{}", style("Replikk Chat").bold().cyan());
    println!(
        "{}\n",
        style("Type a movie line to find your character. 'exit' to quit, 'clear' to reset.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    let username = match user {
        Some(u) => u,
        None => loop {
            print!("{} ", style("Enter username:").green().bold());
            stdout.flush()?;
            let mut input = String::new();
            stdin.lock().read_line(&mut input)?;
            let input = input.trim();
            if !input.is_empty() {
                break input.to_string();
            }
        },
    };

    let chat_id = chat_service.create_chat(&username)?;
    Output::kv("Chat id", &chat_id);
    println!("\n{}\n", style("Enter any movie dialogue").bold());

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            engine.clear_history();
            Output::info("Conversation history cleared.");
            continue;
        }

        if session.needs_retrieval() {
            let spinner = Output::spinner("Finding your movie...");
            let retrieved = retrieval.search(input, settings.chat.search_top_k).await;
            spinner.finish_and_clear();

            match retrieved {
                Ok(r) => {
                    session.resolve_from(&r.matches);
                }
                Err(e) => {
                    Output::error(&format!("Error: {}", e));
                    continue;
                }
            }
        }

        if let Some(title) = session.movie_title() {
            println!("{} {}", style("movie:").magenta().bold(), title);
        }

        let movie_title = session.movie_title().unwrap_or_default().to_string();
        let dialogue_context = session.dialogue_context().unwrap_or_default().to_string();

        match engine.respond(&movie_title, &dialogue_context, input).await {
            Ok(response) => {
                let speaker = if movie_title.is_empty() {
                    "Replikk"
                } else {
                    movie_title.as_str()
                };
                println!(
                    "\n{} {}\n",
                    style(format!("{}:", speaker)).cyan().bold(),
                    response
                );

                if let Err(e) = chat_service.append_turn(&chat_id, input, &response) {
                    Output::warning(&format!("Failed to record turn: {}", e));
                }
            }
            Err(e) => {
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}
