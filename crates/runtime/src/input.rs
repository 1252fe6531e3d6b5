//! Input manager and input sources (§4.2).
//!
//! The manager owns zero or more `InputSource`s and multiplexes each into a shared unbounded
//! queue via a dedicated forwarding task; stopping a source aborts its task and awaits it,
//! swallowing the resulting cancellation (Rust's RAII stands in for the original's scoped
//! acquire/release of OS resources — there is no `finally`, so release happens on drop).
//! Concrete sources beyond CLI are interface-only per SPEC_FULL.md §1's non-goals.

use std::pin::Pin;

use async_stream::stream;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use voice_core::traits::{InputSource, InputSourceError, RawInput};

/// Always-available line-oriented stdin source, real (not stubbed) so the `headless` deployment
/// profile has something to actually drive.
pub struct CliInputSource {
    session_id: String,
    active: bool,
}

impl CliInputSource {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            active: false,
        }
    }
}

#[async_trait::async_trait]
impl InputSource for CliInputSource {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&mut self) -> Result<(), InputSourceError> {
        self.active = true;
        Ok(())
    }

    async fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn subscribe<'a>(&'a self) -> Pin<Box<dyn Stream<Item = RawInput> + Send + 'a>> {
        let session_id = self.session_id.clone();
        Box::pin(stream! {
            let stdin = tokio::io::stdin();
            let mut lines = BufReader::new(stdin).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let text = line.trim().to_string();
                        if !text.is_empty() {
                            yield RawInput::Text { session_id: session_id.clone(), text };
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(%err, "cli input source read error");
                        break;
                    }
                }
            }
        })
    }
}

/// One item pulled off the multiplexed queue, tagged with the source it came from (§4.2).
#[derive(Debug, Clone)]
pub struct SourcedInput {
    pub source_name: String,
    pub input: RawInput,
}

struct RunningSource {
    name: String,
    forwarder: JoinHandle<()>,
}

/// Multiplexes every started `InputSource` into one unbounded queue.
pub struct InputManager {
    running: Vec<RunningSource>,
    sender: mpsc::UnboundedSender<SourcedInput>,
    receiver: Option<mpsc::UnboundedReceiver<SourcedInput>>,
}

impl Default for InputManager {
    fn default() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            running: Vec::new(),
            sender,
            receiver: Some(receiver),
        }
    }
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the receiving half of the multiplexed queue. Callable once; subsequent calls return
    /// `None`.
    pub fn take_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<SourcedInput>> {
        self.receiver.take()
    }

    /// Start a source and spawn its forwarding task. The source itself must already be started
    /// (its `start()` called) before subscribing — ownership of the boxed source's stream is
    /// 'static only when the source is leaked into the task via `Box::leak`-free `Arc`, so this
    /// takes a source that knows how to hand back an owned stream.
    pub fn spawn_forwarder<S>(&mut self, name: impl Into<String>, mut stream: Pin<Box<S>>)
    where
        S: Stream<Item = RawInput> + Send + 'static + ?Sized,
    {
        let name = name.into();
        let sender = self.sender.clone();
        let task_name = name.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(input) = stream.next().await {
                let sourced = SourcedInput {
                    source_name: task_name.clone(),
                    input,
                };
                if sender.send(sourced).is_err() {
                    break;
                }
            }
            info!(source = %task_name, "input source stream ended");
        });
        self.running.push(RunningSource { name, forwarder });
    }

    /// Cancel every forwarder and wait for clean termination (§4.2 "close()").
    pub async fn close(&mut self) {
        for running in self.running.drain(..) {
            running.forwarder.abort();
            if let Err(err) = running.forwarder.await {
                if !err.is_cancelled() {
                    warn!(source = %running.name, error = %err, "input forwarder ended abnormally");
                }
            }
        }
    }

    pub fn active_source_names(&self) -> Vec<String> {
        self.running.iter().map(|r| r.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cli_source_starts_and_reports_active() {
        let mut source = CliInputSource::new("cli_session");
        assert!(!source.is_active());
        source.start().await.unwrap();
        assert!(source.is_active());
        source.stop().await;
        assert!(!source.is_active());
    }

    #[tokio::test]
    async fn manager_multiplexes_a_synthetic_source() {
        let mut manager = InputManager::new();
        let mut receiver = manager.take_receiver().unwrap();

        let synthetic = futures::stream::iter(vec![
            RawInput::Text {
                session_id: "s1".into(),
                text: "hello".into(),
            },
            RawInput::Text {
                session_id: "s1".into(),
                text: "world".into(),
            },
        ]);
        manager.spawn_forwarder("synthetic", Box::pin(synthetic));

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.source_name, "synthetic");
        let second = receiver.recv().await.unwrap();
        assert_eq!(second.source_name, "synthetic");

        manager.close().await;
        assert!(manager.active_source_names().is_empty());
    }
}
