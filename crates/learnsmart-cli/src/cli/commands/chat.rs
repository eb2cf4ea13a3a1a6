//! Chat command handler.
//!
//! Each stdin line is a prompt. A new prompt while an answer is streaming
//! cancels that answer and starts over; `:q` or end of input waits for the
//! active answer and exits. Ctrl+C cancels the active answer, or exits when
//! nothing is streaming.

use anyhow::{Context, Result};
use learnsmart_core::backend::BackendConfig;
use learnsmart_core::config::Config;
use learnsmart_core::core::{PromptController, RequestState, StreamOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::interrupt::CtrlC;
use crate::modes::prompt;
use crate::modes::terminal::TerminalSurface;

type ChatController = PromptController<TerminalSurface<std::io::Stdout>>;

const QUIT: &str = ":q";

pub async fn run(config: &Config, backend: BackendConfig) -> Result<()> {
    let mut controller = prompt::controller(config, backend, TerminalSurface::new(std::io::stdout()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ctrl_c = CtrlC::listen();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("read prompt from stdin")? else {
                    break;
                };
                match line.trim() {
                    QUIT => break,
                    "" => continue,
                    _ => {}
                }
                if let Some(replaced) = controller.submit(line).await? {
                    report(&mut controller, &replaced);
                }
            }
            result = controller.finish(), if controller.is_active() => {
                if let Some(outcome) = result? {
                    report(&mut controller, &outcome);
                }
            }
            () = ctrl_c.pressed() => {
                if !controller.is_active() {
                    break;
                }
                controller.cancel();
            }
        }
    }

    if let Some(finished) = prompt::wait(&mut controller, &mut ctrl_c).await? {
        report(&mut controller, &finished.outcome);
    }
    controller.shutdown().await?;
    println!("Goodbye!");
    Ok(())
}

fn report(controller: &mut ChatController, outcome: &StreamOutcome) {
    if let Some(surface) = controller.surface_mut() {
        surface.end_answer();
    }
    match outcome.state {
        RequestState::Failed => {
            if let Some(err) = &outcome.error {
                eprintln!("Request failed: {err}");
            }
        }
        RequestState::Canceled => eprintln!("[canceled]"),
        _ => {}
    }
}
