//! Incremental rendering of a streamed completion.
//!
//! Fragments are written to the sink as they arrive and accumulated into the
//! final assistant text. Ctrl-C during iteration stops consumption and hands
//! the partial text back; the caller discards it rather than appending it to
//! history — the text was already printed, so nothing visible is lost.

use crate::error::Result;
use crate::llm::TextStream;
use futures::stream::StreamExt;
use std::io::Write;

/// How a streamed turn ended.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The stream closed normally; the string is the full assistant reply.
    Completed(String),
    /// The user interrupted mid-stream; the string is the partial text
    /// rendered so far.
    Interrupted(String),
}

/// Consume a completion stream, rendering each fragment immediately.
///
/// Errors from the stream propagate after whatever arrived has been printed;
/// the caller reports them inline and appends nothing.
pub async fn consume_stream<W: Write>(
    mut stream: TextStream<'_>,
    out: &mut W,
) -> Result<StreamOutcome> {
    let mut accumulated = String::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                writeln!(out, "\n[Interrupted]")?;
                return Ok(StreamOutcome::Interrupted(accumulated));
            }
            next = stream.next() => match next {
                Some(Ok(fragment)) => {
                    write!(out, "{fragment}")?;
                    out.flush()?;
                    accumulated.push_str(&fragment);
                }
                Some(Err(e)) => return Err(e),
                None => {
                    writeln!(out)?;
                    return Ok(StreamOutcome::Completed(accumulated));
                }
            }
        }
    }
}
