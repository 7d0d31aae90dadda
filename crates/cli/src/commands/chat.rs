//! `taskloop chat`: Interactive or single-message chat mode.

use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use taskloop_agent::{Agent, TurnOutcome, TurnStatus};
use taskloop_config::AppConfig;
use taskloop_providers::AnthropicProvider;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "q"];

/// What one prompt produced.
#[derive(Debug, PartialEq, Eq)]
enum PromptInput {
    Line(String),
    /// The user pressed Ctrl+C before finishing a line.
    Interrupted,
    /// Stdin reached end of file.
    Closed,
}

/// Wait for the next input line, or for `interrupt` to fire first.
async fn next_input<R, F>(lines: &mut Lines<R>, interrupt: F) -> std::io::Result<PromptInput>
where
    R: AsyncBufRead + Unpin,
    F: Future,
{
    tokio::select! {
        line = lines.next_line() => Ok(match line? {
            Some(line) => PromptInput::Line(line),
            None => PromptInput::Closed,
        }),
        _ = interrupt => Ok(PromptInput::Interrupted),
    }
}

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
    debug: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables (or put it in a .env file):");
        eprintln!("    TASKLOOP_API_KEY=sk-ant-...");
        eprintln!("    ANTHROPIC_API_KEY=sk-ant-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = Arc::new(AnthropicProvider::from_config(&config)?);
    let mut agent = Agent::from_config(&config, provider)?;

    if let Some(msg) = message {
        let outcome = agent.run_turn(&msg).await?;
        println!("{}", outcome.text);
        if debug {
            eprintln!("{}", render_debug(&outcome));
        }
        return Ok(());
    }

    println!();
    println!("  taskloop: interactive mode");
    println!();
    println!("  Model:     {}", config.model);
    println!("  Tools:     {}", agent.tools().names().join(", "));
    println!("  Directory: {}", config.resolved_working_dir().display());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' to quit. Ctrl+C cancels the current input or turn.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = match next_input(&mut lines, tokio::signal::ctrl_c()).await? {
            PromptInput::Line(line) => line,
            PromptInput::Interrupted => {
                println!();
                println!("  Interrupted. Type 'exit' to quit, or continue chatting.");
                println!();
                continue;
            }
            PromptInput::Closed => break,
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit_word(input) {
            break;
        }

        tokio::select! {
            result = agent.run_turn(input) => match result {
                Ok(outcome) => {
                    println!();
                    for line in outcome.text.lines() {
                        println!("  Assistant > {line}");
                    }
                    println!();
                    if debug {
                        eprintln!("{}", render_debug(&outcome));
                    }
                }
                Err(e) => {
                    eprintln!("  [Error] {e}");
                    println!();
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("  [Interrupted]");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn is_exit_word(input: &str) -> bool {
    EXIT_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w))
}

/// Usage report printed after each turn with `--debug`.
fn render_debug(outcome: &TurnOutcome) -> String {
    let usage = outcome.usage.total();
    let status = match outcome.status {
        TurnStatus::Done => "done",
        TurnStatus::Truncated => "truncated",
        TurnStatus::Unexpected => "unexpected stop",
        TurnStatus::BudgetExceeded => "budget exceeded",
    };

    let mut out = String::new();
    out.push_str("  ── turn stats ──\n");
    out.push_str(&format!("  Status:        {status}\n"));
    out.push_str(&format!("  Model calls:   {}\n", outcome.model_calls()));
    out.push_str(&format!("  Duration:      {:.2}s\n", outcome.duration.as_secs_f64()));
    out.push_str(&format!("  Input tokens:  {}\n", usage.input_tokens));
    out.push_str(&format!("  Output tokens: {}\n", usage.output_tokens));
    if usage.cache_creation_input_tokens > 0 || usage.cache_read_input_tokens > 0 {
        out.push_str(&format!(
            "  Cache tokens:  {} written, {} read\n",
            usage.cache_creation_input_tokens, usage.cache_read_input_tokens
        ));
    }
    out.push_str(&format!("  Total tokens:  {}\n", usage.total_tokens()));
    out.push_str(&format!("  Est. cost:     ${:.4}", outcome.estimated_cost_usd));
    out
}
