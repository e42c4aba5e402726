//! Ask Command
//!
//! Send one prompt through the resilient client and print the reply.
//!
//! Usage:
//!   buildwright ask "PROMPT" [--system TEXT] [--thinking] [--timeout SECS]

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ai::{GenerateRequest, SendOptions, with_timeout};
use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::{BuildwrightError, Result};

#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub system: Option<String>,
    pub thinking: bool,
    /// Overrides `backend.timeout_secs`
    pub timeout_secs: Option<u64>,
}

pub fn build_request(prompt: &str, system: Option<&str>) -> Result<GenerateRequest> {
    if prompt.trim().is_empty() {
        return Err(BuildwrightError::InvalidInput(
            "Prompt must not be empty".to_string(),
        ));
    }
    let request = GenerateRequest::from_prompt(prompt);
    Ok(match system {
        Some(system) => request.with_system_instruction(system),
        None => request,
    })
}

pub async fn run(ctx: &CommandContext, prompt: &str, options: AskOptions) -> Result<()> {
    let backend = &ctx.config.backend;
    let client = ctx.backend_client()?;
    let request = build_request(prompt, options.system.as_deref())?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut send_options = SendOptions::default().with_cancel(cancel);
    if options.thinking {
        send_options = send_options.with_thinking_budget(backend.thinking_budget);
    }

    let timeout = Duration::from_secs(options.timeout_secs.unwrap_or(backend.timeout_secs));
    let response = match with_timeout(
        timeout,
        async {
            client
                .send(&request, &send_options)
                .await
                .map_err(BuildwrightError::from)
        },
        "generate",
    )
    .await
    {
        Ok(response) => response,
        Err(e) => {
            if e.is_transient() {
                Output::new().info("This failure is transient; try again shortly");
            }
            return Err(e);
        }
    };

    match response.text() {
        Some(text) => println!("{}", text),
        None => Output::new().warning("Response contained no text"),
    }

    if let Some(tokens) = response.total_tokens() {
        debug!(tokens, "Backend reported usage");
    }
    Output::new().info(&client.status().quota.summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_with_system() {
        let request = build_request("Plan a todo app", Some("You are a planner")).unwrap();
        let wire = request.to_wire(None);
        assert_eq!(
            wire["systemInstruction"]["parts"][0]["text"],
            "You are a planner"
        );
    }

    #[test]
    fn test_build_request_rejects_blank_prompt() {
        assert!(matches!(
            build_request("   ", None),
            Err(BuildwrightError::InvalidInput(_))
        ));
    }
}
