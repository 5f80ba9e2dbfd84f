//! `parley chat`: interactive or single-message chat.

use parley_agent::{Assistant, RunRequest};
use parley_core::message::{ChatMode, SessionId};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{self, AsyncBufReadExt, BufReader};

use super::runtime;

pub struct ChatArgs {
    pub message: Option<String>,
    pub session: Option<String>,
    pub mode: ChatMode,
    pub clean_history: bool,
    pub max_iterations: Option<u32>,
    pub max_parse_retries: Option<u32>,
    pub document: Option<PathBuf>,
}

impl ChatArgs {
    fn request(&self, session: &SessionId, input: &str, document: Option<&str>) -> RunRequest {
        let request = RunRequest::new(session.clone(), input, self.mode)
            .with_clean_history(self.clean_history)
            .with_max_iterations(self.max_iterations)
            .with_max_parse_retries(self.max_parse_retries);
        match document {
            Some(text) => request.with_document(text),
            None => request,
        }
    }
}

pub async fn run(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config()?;
    let assistant = runtime::build_assistant(&config).await?;

    let session = SessionId::new(
        args.session
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
    );

    let document = match &args.document {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {e}", path.display()))?,
        ),
        None => None,
    };

    if let Some(msg) = &args.message {
        // Single message mode
        let request = args.request(&session, msg, document.as_deref());
        let response = assistant.respond(&request).await;
        println!("{}", response.text);
        return Ok(());
    }

    interactive(&assistant, &args, &session, document.as_deref()).await
}

async fn interactive(
    assistant: &Assistant,
    args: &ChatArgs,
    session: &SessionId,
    document: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  Parley, interactive mode");
    println!();
    println!("  Session:  {session}");
    println!("  Mode:     {}", args.mode);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut first = true;

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
            break;
        }

        // Only the first message of the session honours --clean-history.
        let mut request = args.request(session, line, document);
        request.clean_history = first && args.clean_history;
        first = false;

        let response = assistant.respond(&request).await;
        println!();
        for text_line in response.text.lines() {
            println!("  Assistant > {text_line}");
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
