use anyhow::{anyhow, Result};
use chatbox_core::{ChatMessage, ChatRole, CompletionsClient, GlobalConfig};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password};
use std::io::{self, Write};
use std::time::Duration;

use crate::Session;

/// Interactive chat loop. Returns when the user types `/quit`.
pub async fn run(conversation: &mut Session) -> Result<()> {
    let theme = ColorfulTheme::default();

    println!("\n{}", "💬 chatbox".bold().blue());
    println!("{}", "Type /help for commands".dimmed());
    print_history(conversation);

    loop {
        let line: String = Input::with_theme(&theme)
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;

        let Some(input) = submission_text(&line) else {
            continue;
        };

        match input {
            "/quit" | "/exit" => break,
            "/help" => print_help(),
            "/history" => print_history(conversation),
            "/clear" => {
                conversation.clear()?;
                println!("{}", "Conversation cleared".green());
            }
            "/settings" => edit_settings(&theme, conversation)?,
            text => send(conversation, text).await?,
        }
    }

    Ok(())
}

/// Submit `text` on a background task, animating while the reply is pending
async fn send(conversation: &mut Session, text: &str) -> Result<()> {
    let request = conversation.begin_submit(text)?;
    let client = conversation.client().clone();
    let mut query_task = tokio::spawn(async move { client.complete(&request).await });

    // 300ms ticks, three-frame ellipsis
    let mut interval = tokio::time::interval(Duration::from_millis(300));
    let mut animation_frame: usize = 0;

    let outcome = loop {
        tokio::select! {
            joined = &mut query_task => {
                break joined.unwrap_or_else(|e| Err(anyhow!("Request task failed: {}", e)));
            }
            _ = interval.tick() => {
                animation_frame = draw_progress(&mut io::stdout(), animation_frame);
            }
        }
    };
    print!("\r{}\r", " ".repeat(12));

    let reply = conversation.finish_submit(outcome)?;
    print_message(&reply);
    Ok(())
}

/// Draw one "Thinking..." frame and return the next frame index. A broken
/// terminal only loses the animation; the pending reply is still awaited.
fn draw_progress(out: &mut impl Write, animation_frame: usize) -> usize {
    let drawn = write!(
        out,
        "\r{}{:<3}",
        "Thinking".dimmed(),
        ".".repeat(animation_frame + 1)
    )
    .and_then(|_| out.flush());
    if let Err(e) = drawn {
        log::debug!("Failed to draw progress: {}", e);
    }
    (animation_frame + 1) % 3
}

fn edit_settings(theme: &ColorfulTheme, conversation: &mut Session) -> Result<()> {
    let mut config: GlobalConfig = conversation.config().clone();

    let key = Password::with_theme(theme)
        .with_prompt("API key (empty keeps current)")
        .allow_empty_password(true)
        .interact()?;
    if !key.is_empty() {
        config.api_key = key;
    }

    config.model = Input::with_theme(theme)
        .with_prompt("Model")
        .default(config.model.clone())
        .interact_text()?;

    config.persist = Confirm::with_theme(theme)
        .with_prompt("Save conversation between sessions?")
        .default(config.persist)
        .interact()?;

    conversation.set_config(config);
    println!("{}", "Settings saved".green());
    Ok(())
}

/// Trimmed input, or `None` when there is nothing to send
pub fn submission_text(line: &str) -> Option<&str> {
    let text = line.trim();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub fn print_message(message: &ChatMessage) {
    let label = match message.role {
        ChatRole::User => "You".bold().blue(),
        ChatRole::Assistant => "Assistant".bold().green(),
    };
    println!("\n{}: {}", label, message.content);
}

pub fn print_history(conversation: &Session) {
    if conversation.messages().is_empty() {
        println!("{}", "No messages yet. Say something to get started.".dimmed());
        return;
    }
    for message in conversation.messages() {
        print_message(message);
    }
}

fn print_help() {
    println!("\n{}", "Commands".bold());
    println!("  {}  edit API key, model and persistence", "/settings".cyan());
    println!("  {}     clear the conversation", "/clear".cyan());
    println!("  {}   print the conversation", "/history".cyan());
    println!("  {}      leave", "/quit".cyan());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_input_is_not_sent() {
        assert_eq!(submission_text(""), None);
        assert_eq!(submission_text("   \t\n"), None);
    }

    struct ClosedTerminal;

    impl Write for ClosedTerminal {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_progress_cycles_three_frames() {
        let mut out = Vec::new();
        assert_eq!(draw_progress(&mut out, 0), 1);
        assert_eq!(draw_progress(&mut out, 2), 0);
        let drawn = String::from_utf8(out).unwrap();
        assert!(drawn.contains("Thinking"));
        assert!(drawn.contains("..."));
    }

    #[test]
    fn test_progress_survives_closed_terminal() {
        assert_eq!(draw_progress(&mut ClosedTerminal, 1), 2);
    }

    #[test]
    fn test_input_is_trimmed() {
        assert_eq!(submission_text("  hello there \n"), Some("hello there"));
    }
}
