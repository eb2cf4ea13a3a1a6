//! Ask command handler.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use learnsmart_core::backend::BackendConfig;
use learnsmart_core::config::Config;
use learnsmart_core::core::{RequestState, StreamOutcome};

use crate::interrupt::{CtrlC, InterruptedError};
use crate::modes::prompt;
use crate::modes::terminal::LatestSurface;

pub struct AskOptions<'a> {
    pub prompt: &'a str,
    pub config: &'a Config,
    pub backend: BackendConfig,
    pub raw: bool,
    pub output: Option<&'a Path>,
}

pub async fn run(options: AskOptions<'_>) -> Result<()> {
    if options.prompt.trim().is_empty() {
        bail!("Prompt must not be empty");
    }

    let mut ctrl_c = CtrlC::listen();
    let mut controller = prompt::controller(options.config, options.backend, LatestSurface::default());
    controller.submit(options.prompt).await?;
    let finished = prompt::wait(&mut controller, &mut ctrl_c)
        .await?
        .context("request ended without an outcome")?;
    controller.shutdown().await?;

    let outcome = finished.outcome;
    write_answer(&outcome, options.raw, options.output)?;

    match outcome.state {
        RequestState::Completed => Ok(()),
        RequestState::Canceled if finished.interrupted => Err(InterruptedError.into()),
        RequestState::Canceled => bail!("Request canceled: deadline reached"),
        RequestState::Failed => {
            let message = outcome
                .error
                .map_or_else(|| "unknown error".to_string(), |e| e.to_string());
            bail!("Request failed: {message}")
        }
        RequestState::Idle | RequestState::Streaming => {
            bail!("Request ended in unexpected state '{}'", outcome.state)
        }
    }
}

fn write_answer(outcome: &StreamOutcome, raw: bool, output: Option<&Path>) -> Result<()> {
    let body = if raw { &outcome.buffer } else { &outcome.html };

    if let Some(path) = output {
        std::fs::write(path, body)
            .with_context(|| format!("Failed to write answer to {}", path.display()))?;
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(body.as_bytes()).context("write answer")?;
    if !body.is_empty() && !body.ends_with('\n') {
        writeln!(stdout).context("write answer")?;
    }
    stdout.flush().context("write answer")
}
