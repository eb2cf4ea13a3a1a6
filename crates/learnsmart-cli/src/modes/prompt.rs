//! Shared plumbing for commands that talk to the backend.

use std::sync::Arc;

use anyhow::Result;
use learnsmart_core::backend::{BackendClient, BackendConfig};
use learnsmart_core::config::Config;
use learnsmart_core::core::{
    ControllerOptions, DisplaySurface, PromptController, PromptSource, StreamOutcome,
};

use crate::interrupt::CtrlC;

/// A finished request and whether Ctrl+C ended it.
#[derive(Debug)]
pub struct Finished {
    pub outcome: StreamOutcome,
    pub interrupted: bool,
}

/// Builds a controller over the real backend client.
pub fn controller<S>(config: &Config, backend: BackendConfig, surface: S) -> PromptController<S>
where
    S: DisplaySurface + Send + 'static,
{
    let source: Arc<dyn PromptSource> = Arc::new(BackendClient::new(backend));
    PromptController::new(
        source,
        surface,
        ControllerOptions {
            policy: config.render_policy,
            deadline: config.request_timeout(),
        },
    )
}

/// Waits for the active request. Ctrl+C cancels it and still waits, so the
/// surface is back in the controller when this returns.
pub async fn wait<S>(
    controller: &mut PromptController<S>,
    ctrl_c: &mut CtrlC,
) -> Result<Option<Finished>>
where
    S: DisplaySurface + Send + 'static,
{
    tokio::select! {
        result = controller.finish() => {
            return Ok(result?.map(|outcome| Finished { outcome, interrupted: false }));
        }
        () = ctrl_c.pressed() => {}
    }

    tracing::info!("interrupted, canceling request");
    controller.cancel();
    Ok(controller
        .finish()
        .await?
        .map(|outcome| Finished {
            outcome,
            interrupted: true,
        }))
}
