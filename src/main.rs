//! Parley CLI binary entry point.

use clap::Parser;
use futures::StreamExt;
use parley::cli::{ChatArgs, Cli, Commands};
use parley::models::ModelSelector;
use parley::prelude::*;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat(chat_args) => handle_chat(chat_args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_chat(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let prompt = match args.prompt {
        Some(p) => p,
        None => {
            eprintln!("Usage: parley chat \"your prompt here\"");
            std::process::exit(1);
        }
    };

    let config = match args.env_file {
        Some(path) => ParleyConfig::from_env_file(path)?,
        None => ParleyConfig::from_env(),
    };

    let model = ModelSelector::parse_with_config(&args.model, &config).map_err(|e| {
        format!(
            "Invalid model '{}': {e}. Use provider:model (e.g. openai:gpt-4o)",
            args.model
        )
    })?;
    let adapter = create_adapter(&model, &config)?;

    let request = ChatRequest::builder()
        .maybe_system_prompt(args.system)
        .messages(vec![Message::user(prompt)])
        .temperature(args.temperature.unwrap_or(0.0))
        .maybe_max_tokens(args.max_tokens)
        .maybe_response_format(args.json.then_some(ResponseFormat::Json))
        .build();

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut execution = execute(adapter, request, cancel);
    let mut fragments = execution.text_fragments();
    let mut messages = execution.complete_messages();

    let print_text = async {
        use std::io::Write;
        while let Some(Ok(text)) = fragments.next().await {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
    };

    let print_messages = async {
        while let Some(Ok(message)) = messages.next().await {
            match message {
                Message::FunctionInvocation(call) => {
                    eprintln!("\n⚡ {} ({})", call.name, call.id);
                }
                Message::FunctionReturnValue(rv) => {
                    let marker = if rv.successful { "✅" } else { "❌" };
                    eprintln!("  {marker} {}", truncate(&rv.result, 200));
                }
                _ => {}
            }
        }
    };

    tokio::join!(print_text, print_messages);
    println!(); // newline after streaming

    execution.wait().await?;
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
