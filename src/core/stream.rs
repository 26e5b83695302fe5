//! Chunked streaming.
//!
//! The orchestrator walks the segmented text in order and synthesizes one
//! chunk at a time. Each chunk goes through the same cached, admitted path as
//! a single request. A failed chunk is emitted with its error and source text
//! and the stream moves on; only cancellation ends a stream early. The last
//! chunk, and only the last, carries `is_final`.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::error::PipelineResult;
use super::synthesis::ResolvedRequest;
use super::types::GenerationResult;

/// One emitted segment of a streamed request
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub total: usize,
    /// Source text of this chunk
    pub text: String,
    pub outcome: PipelineResult<GenerationResult>,
    pub is_final: bool,
}

impl Chunk {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Ordered, finite sequence of chunks
pub type ChunkStream = Pin<Box<dyn Stream<Item = Chunk> + Send>>;

/// Produces audio for one chunk
#[async_trait]
pub trait ChunkSynthesizer: Send + Sync + 'static {
    async fn synthesize_chunk(&self, request: ResolvedRequest) -> PipelineResult<GenerationResult>;
}

/// Where a streamed request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Emitting(usize),
    Done,
    Aborted,
}

/// Stream `chunks` through `synthesizer` sequentially.
///
/// Cancellation is checked before every dispatch; a chunk already handed to
/// the synthesizer is allowed to finish but nothing after it is started.
pub fn orchestrate<S>(
    synthesizer: Arc<S>,
    base: ResolvedRequest,
    chunks: Vec<String>,
    cancel: CancellationToken,
) -> ChunkStream
where
    S: ChunkSynthesizer + ?Sized,
{
    let total = chunks.len();
    info!(
        character = %base.character.id,
        voice = %base.voice.id,
        total_chunks = total,
        "Starting chunked stream"
    );

    Box::pin(async_stream::stream! {
        let mut state = StreamState::Emitting(0);
        let mut failed = 0usize;

        for (index, text) in chunks.into_iter().enumerate() {
            if cancel.is_cancelled() {
                state = StreamState::Aborted;
                info!(chunk = index, total_chunks = total, "Stream cancelled, stopping dispatch");
                break;
            }
            state = StreamState::Emitting(index);

            let outcome = synthesizer.synthesize_chunk(base.with_text(text.clone())).await;
            match &outcome {
                Ok(result) => info!(
                    chunk = index + 1,
                    total_chunks = total,
                    duration_secs = result.duration_secs,
                    cached = result.cached,
                    "Chunk ready"
                ),
                Err(e) => {
                    failed += 1;
                    warn!(
                        chunk = index + 1,
                        total_chunks = total,
                        kind = e.kind(),
                        error = %e,
                        "Chunk failed, continuing"
                    );
                }
            }

            yield Chunk {
                index,
                total,
                text,
                outcome,
                is_final: index + 1 == total,
            };
        }

        if state != StreamState::Aborted {
            state = StreamState::Done;
        }
        info!(state = ?state, total_chunks = total, failed, "Stream finished");
    })
}
