//! Render command handler: offline pipeline check, no backend involved.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use learnsmart_core::backend::{ByteStream, TransportError};
use learnsmart_core::core::{RequestState, StreamSession};
use learnsmart_core::render::RenderPolicy;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::modes::terminal::LatestSurface;

pub async fn run(file: Option<&Path>, chunk_size: usize, policy: RenderPolicy) -> Result<()> {
    let input = read_input(file).await?;
    let stream = chunked(input, chunk_size);

    let mut surface = LatestSurface::default();
    let outcome = StreamSession::new(policy)
        .run(stream, CancellationToken::new(), &mut surface)
        .await;
    if outcome.state != RequestState::Completed {
        bail!("Render ended in state '{}'", outcome.state);
    }
    tracing::debug!(chunks = outcome.chunks, policy = policy.id(), "rendered offline");

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(surface.html().as_bytes())
        .and_then(|()| stdout.flush())
        .context("write rendered html")
}

async fn read_input(file: Option<&Path>) -> Result<Vec<u8>> {
    match file {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut input = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut input)
                .await
                .context("read markdown from stdin")?;
            Ok(input)
        }
    }
}

/// Splits `input` into fixed-size chunks, ignoring character boundaries.
fn chunked(input: Vec<u8>, chunk_size: usize) -> ByteStream {
    let input = Bytes::from(input);
    let size = chunk_size.max(1);
    let chunks: Vec<Result<Bytes, TransportError>> = (0..input.len())
        .step_by(size)
        .map(|start| Ok(input.slice(start..(start + size).min(input.len()))))
        .collect();
    stream::iter(chunks).boxed()
}
