//! Turning agent snapshots into an ordered stream of text deltas.
//!
//! [`stream_turn`] spawns a producer task that pulls snapshots from an
//! [`AgentRun`], converts them to deltas with a [`DeltaTracker`] and pushes
//! them through a bounded channel of capacity one, so the agent never runs
//! more than one delta ahead of the consumer.
//!
//! A failing turn ends the stream with one `Err` item carrying the cause.
//! Logging happens exactly once per completed turn, after the agent stream
//! has ended; a failed turn is never logged. Closing the consumer side
//! ([`TurnStream::cancel`] or simply dropping the stream mid-answer) stops
//! the producer at its next await point and no record is written.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::agent::{Agent, Message};
use crate::logs::{log_interaction, InteractionLogger, DEFAULT_SOURCE};

/// Converts successive snapshots into the text each one adds.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    last_len: usize,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `snapshot[last_len..]`, or `None` when that is empty.
    ///
    /// A snapshot that is shorter than the previous one, or whose old length
    /// does not fall on a character boundary, yields nothing.
    pub fn push(&mut self, snapshot: &str) -> Option<String> {
        let delta = snapshot.get(self.last_len..).unwrap_or("");
        self.last_len = snapshot.len();
        (!delta.is_empty()).then(|| delta.to_string())
    }
}

/// What a completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnSummary {
    /// Final snapshot.
    pub text: String,
    pub messages: Vec<Message>,
    /// Source label of the turn; `None` was logged as `"user"`.
    pub source: Option<String>,
    /// Whether the interaction record was written.
    pub logged: bool,
}

type Producer = JoinHandle<Result<Option<TurnSummary>>>;

/// Consumer side of one streamed turn.
pub struct TurnStream {
    rx: mpsc::Receiver<Result<String>>,
    producer: Producer,
}

/// Start answering `prompt` in the background.
///
/// Must be called inside a tokio runtime.
pub fn stream_turn(
    agent: Arc<dyn Agent>,
    logger: Arc<dyn InteractionLogger>,
    prompt: String,
    source: Option<String>,
) -> TurnStream {
    let (tx, rx) = mpsc::channel(1);
    let producer = tokio::spawn(async move {
        let outcome = produce(agent, logger, prompt, source, &tx).await;
        if let Err(err) = &outcome {
            tracing::warn!("agent turn failed: {:#}", err);
            let _ = tx.send(Err(anyhow!("{:#}", err))).await;
        }
        outcome
    });
    TurnStream { rx, producer }
}

/// Returns `Ok(None)` when the consumer went away before the end.
async fn produce(
    agent: Arc<dyn Agent>,
    logger: Arc<dyn InteractionLogger>,
    prompt: String,
    source: Option<String>,
    tx: &mpsc::Sender<Result<String>>,
) -> Result<Option<TurnSummary>> {
    let mut run = agent.run_stream(&prompt).await?;
    let mut tracker = DeltaTracker::new();
    let mut text = String::new();

    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                tracing::debug!("consumer closed the stream; abandoning turn");
                return Ok(None);
            }
            next = run.next_snapshot() => next,
        };

        let snapshot = match next {
            Some(snapshot) => snapshot?,
            None => break,
        };

        if let Some(delta) = tracker.push(&snapshot) {
            if tx.send(Ok(delta)).await.is_err() {
                tracing::debug!("consumer closed the stream; abandoning turn");
                return Ok(None);
            }
        }
        text = snapshot;
    }

    let output = run.finish().tagged(source);
    let label = output.source.as_deref().unwrap_or(DEFAULT_SOURCE);
    let logged = log_interaction(logger.as_ref(), agent.identity(), &output.messages, label);

    Ok(Some(TurnSummary {
        text,
        messages: output.messages,
        source: output.source,
        logged,
    }))
}

impl TurnStream {
    /// Next delta, an `Err` if the turn failed, or `None` once it has ended.
    pub async fn next(&mut self) -> Option<Result<String>> {
        self.rx.recv().await
    }

    /// Abandon the turn and wait for the producer to stop. No record is
    /// written for an abandoned turn.
    pub async fn cancel(self) {
        let TurnStream { rx, producer } = self;
        drop(rx);
        if let Ok(Err(err)) = producer.await {
            tracing::debug!("cancelled turn had failed: {:#}", err);
        }
    }

    /// Drain any remaining deltas and wait for the turn to be logged.
    pub async fn finish(mut self) -> Result<TurnSummary> {
        while self.rx.recv().await.is_some() {}
        self.producer
            .await??
            .ok_or_else(|| anyhow!("turn ended without completing"))
    }

    /// The deltas as an async stream. The producer keeps running (and
    /// logs) in the background.
    pub fn into_stream(self) -> impl Stream<Item = Result<String>> + Send + 'static {
        ReceiverStream::new(self.rx)
    }

    /// Blocking iterator over the deltas for synchronous UI shells.
    ///
    /// Must not be driven from inside an async context.
    pub fn into_blocking_iter(self) -> BlockingDeltas {
        BlockingDeltas { rx: self.rx }
    }
}

/// Iterator returned by [`TurnStream::into_blocking_iter`].
pub struct BlockingDeltas {
    rx: mpsc::Receiver<Result<String>>,
}

impl Iterator for BlockingDeltas {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Result<String>> {
        self.rx.blocking_recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::fake::ScriptedAgent;
    use crate::logs::memory::MemoryLogger;

    fn start(agent: ScriptedAgent, logger: &Arc<MemoryLogger>) -> TurnStream {
        stream_turn(
            Arc::new(agent),
            logger.clone(),
            "how do I join the course?".to_string(),
            None,
        )
    }

    #[test]
    fn tracker_emits_suffixes() {
        let mut tracker = DeltaTracker::new();
        assert_eq!(tracker.push("Hi").as_deref(), Some("Hi"));
        assert_eq!(tracker.push("Hi there").as_deref(), Some(" there"));
        assert_eq!(tracker.push("Hi there").as_deref(), None);
        assert_eq!(tracker.push("Hi there!").as_deref(), Some("!"));
    }

    #[test]
    fn tracker_ignores_shrinking_snapshots() {
        let mut tracker = DeltaTracker::new();
        tracker.push("Hello world");
        assert_eq!(tracker.push("Hello"), None);
        assert_eq!(tracker.push("Hello!").as_deref(), Some("!"));
    }

    #[tokio::test]
    async fn deltas_arrive_in_order_then_turn_is_logged() {
        let logger = Arc::new(MemoryLogger::default());
        let mut stream = start(ScriptedAgent::new(&["Hi", "Hi there", "Hi there!"]), &logger);

        let mut deltas = Vec::new();
        while let Some(delta) = stream.next().await {
            deltas.push(delta.unwrap());
        }
        assert_eq!(deltas, vec!["Hi", " there", "!"]);

        let summary = stream.finish().await.unwrap();
        assert_eq!(summary.text, "Hi there!");
        assert!(summary.logged);
        assert_eq!(logger.count(), 1);

        let record = &logger.records.lock().unwrap()[0];
        assert_eq!(record.source, "user");
        assert_eq!(record.agent_name, "faq_agent");
        assert_eq!(record.messages.len(), 2);
    }

    #[tokio::test]
    async fn abandoned_turn_writes_no_record() {
        let logger = Arc::new(MemoryLogger::default());
        let mut stream = start(ScriptedAgent::hanging(&["Hi", "Hi the"]), &logger);

        assert_eq!(stream.next().await.unwrap().unwrap(), "Hi");
        assert_eq!(stream.next().await.unwrap().unwrap(), " the");
        stream.cancel().await;

        assert_eq!(logger.count(), 0);
    }

    #[tokio::test]
    async fn finish_drains_unread_deltas() {
        let logger = Arc::new(MemoryLogger::default());
        let stream = stream_turn(
            Arc::new(ScriptedAgent::new(&["a", "ab", "abc"])),
            logger.clone(),
            "q".to_string(),
            Some("web".to_string()),
        );
        let summary = stream.finish().await.unwrap();
        assert_eq!(summary.text, "abc");
        assert_eq!(summary.source.as_deref(), Some("web"));
        assert_eq!(logger.records.lock().unwrap()[0].source, "web");
    }

    #[tokio::test]
    async fn failed_turn_ends_with_error_and_writes_no_record() {
        let logger = Arc::new(MemoryLogger::default());
        let mut stream = start(ScriptedAgent::failing(&["Hi"]), &logger);

        assert_eq!(stream.next().await.unwrap().unwrap(), "Hi");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("401"), "{err}");
        assert!(stream.next().await.is_none());

        assert!(stream.finish().await.is_err());
        assert_eq!(logger.count(), 0);
    }

    #[tokio::test]
    async fn failure_before_any_text_is_the_first_item() {
        let logger = Arc::new(MemoryLogger::default());
        let mut stream = start(ScriptedAgent::failing(&[]), &logger);

        assert!(stream.next().await.unwrap().is_err());
        let err = stream.finish().await.unwrap_err();
        assert!(err.to_string().contains("401"), "{err}");
        assert_eq!(logger.count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blocking_iterator_yields_deltas() {
        let logger = Arc::new(MemoryLogger::default());
        let stream = start(ScriptedAgent::new(&["Hi", "Hi there", "Hi there!"]), &logger);

        let deltas = tokio::task::spawn_blocking(move || {
            stream.into_blocking_iter().collect::<Result<Vec<_>>>()
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(deltas.concat(), "Hi there!");
    }
}
