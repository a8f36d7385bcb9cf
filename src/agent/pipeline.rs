//! Turns a qualifying message into a model reply, keeping the session transcript.

use crate::conversation::{ReplyCorrelation, SentReply, SessionKey, SessionStore, Turn};
use crate::error::BackendError;
use crate::llm::{CompletionBackend, CompletionRequest, SearchBackend};
use crate::locale::Locale;
use crate::messaging::chunking::{MESSAGE_LIMIT, split_response};
use crate::prompts::Instructions;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

/// Reaction shown while a web search runs.
pub const SEARCH_REACTION: &str = "🔎";

/// Keeps the typing indicator on until dropped.
pub struct TypingGuard {
    _typing: Option<Box<dyn Send>>,
}

impl TypingGuard {
    pub fn new(typing: impl Send + 'static) -> Self {
        Self {
            _typing: Some(Box::new(typing)),
        }
    }

    pub fn none() -> Self {
        Self { _typing: None }
    }
}

/// Where replies to one inbound message go.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn add_reaction(&self, emoji: &str) -> crate::Result<()>;
    async fn remove_reaction(&self, emoji: &str) -> crate::Result<()>;
    fn start_typing(&self) -> TypingGuard;

    /// Reply to the inbound message. Returns the id of the sent message.
    async fn reply(&self, text: &str) -> crate::Result<u64>;

    /// Post a plain message to the inbound message's channel.
    async fn send(&self, text: &str) -> crate::Result<u64>;
}

/// Deletes replies the bot sent earlier.
#[async_trait]
pub trait ReplyRemover: Send + Sync {
    async fn delete(&self, reply: SentReply) -> crate::Result<()>;
}

/// One qualifying message.
#[derive(Debug, Clone, Copy)]
pub struct Inbound<'a> {
    pub message_id: u64,
    pub key: SessionKey,
    pub author_label: &'a str,
    /// Text with mentions resolved.
    pub text: &'a str,
}

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Replied { chunks: usize, failed: usize },
    GenerationFailed,
}

/// Generation backends and the state a reply touches.
pub struct Responder {
    completion: Arc<dyn CompletionBackend>,
    oneshot: Arc<dyn CompletionBackend>,
    search: Option<Arc<dyn SearchBackend>>,
    sessions: SessionStore,
    correlation: Mutex<ReplyCorrelation>,
    instructions: Instructions,
    generation_failed: String,
    delivery_failed: String,
}

impl Responder {
    /// `search` is `None` when internet access is disabled.
    pub fn new(
        completion: Arc<dyn CompletionBackend>,
        oneshot: Arc<dyn CompletionBackend>,
        search: Option<Arc<dyn SearchBackend>>,
        max_history: usize,
        instructions: Instructions,
        locale: &Locale,
    ) -> Self {
        Self {
            completion,
            oneshot,
            search,
            sessions: SessionStore::new(max_history),
            correlation: Mutex::new(ReplyCorrelation::new()),
            instructions,
            generation_failed: locale.generation_failed.clone(),
            delivery_failed: locale.delivery_failed.clone(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn instructions(&self) -> &Instructions {
        &self.instructions
    }

    /// Remove and return the replies sent for `trigger_id`.
    fn take_replies(&self, trigger_id: u64) -> Option<Vec<SentReply>> {
        self.correlation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take(trigger_id)
    }

    /// Delete every reply sent for `trigger_id`. Returns how many were removed.
    ///
    /// A failed deletion is logged and the remaining replies are still attempted.
    pub async fn retract(&self, trigger_id: u64, remover: &dyn ReplyRemover) -> usize {
        let Some(replies) = self.take_replies(trigger_id) else {
            return 0;
        };

        let mut removed = 0;
        for reply in replies {
            match remover.delete(reply).await {
                Ok(()) => removed += 1,
                Err(error) => {
                    tracing::warn!(message_id = reply.message_id, %error, "failed to delete reply");
                }
            }
        }
        tracing::debug!(trigger_id, removed, "deleted replies to removed message");
        removed
    }

    fn record_reply(&self, trigger_id: u64, reply: SentReply) {
        self.correlation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(trigger_id, reply);
    }

    /// Answer `inbound` through `sink`.
    ///
    /// The session stays locked for the whole turn, so messages from one
    /// user in one channel are answered in order.
    pub async fn respond(&self, inbound: &Inbound<'_>, sink: &dyn ReplySink) -> Outcome {
        let mut transcript = self.sessions.lock(inbound.key).await;
        transcript.trim_for_next_turn();

        let search_context = self.search_context(inbound.text, sink).await;

        transcript.push(Turn::user(inbound.author_label, inbound.text));

        let result = {
            let _typing = sink.start_typing();
            self.completion
                .complete(CompletionRequest {
                    instructions: Some(&self.instructions.preamble),
                    search_context: search_context.as_deref(),
                    transcript: transcript.as_slice(),
                })
                .await
        };

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(session = %inbound.key, %error, "completion failed");
                if let Err(error) = sink.reply(&self.generation_failed).await {
                    tracing::warn!(%error, "failed to send failure notice");
                }
                return Outcome::GenerationFailed;
            }
        };

        transcript.push(Turn::assistant(&self.instructions.persona_name, &response));
        drop(transcript);

        let chunks = split_response(&response, MESSAGE_LIMIT);
        let mut failed = 0;
        for chunk in &chunks {
            match sink.reply(chunk).await {
                Ok(message_id) => self.record_reply(
                    inbound.message_id,
                    SentReply {
                        channel_id: inbound.key.channel_id,
                        message_id,
                    },
                ),
                Err(error) => {
                    failed += 1;
                    tracing::warn!(message_id = inbound.message_id, %error, "failed to deliver reply chunk");
                    if let Err(error) = sink.send(&self.delivery_failed).await {
                        tracing::warn!(%error, "failed to send delivery apology");
                    }
                }
            }
        }

        tracing::debug!(session = %inbound.key, chunks = chunks.len(), failed, "reply sent");
        Outcome::Replied {
            chunks: chunks.len(),
            failed,
        }
    }

    async fn search_context(&self, query: &str, sink: &dyn ReplySink) -> Option<String> {
        let search = self.search.as_ref()?;

        if let Err(error) = sink.add_reaction(SEARCH_REACTION).await {
            tracing::debug!(%error, "failed to add search reaction");
        }

        let context = match search.search(query).await {
            Ok(context) => context,
            Err(error) => {
                tracing::warn!(%error, "search failed, continuing without results");
                None
            }
        };

        if let Err(error) = sink.remove_reaction(SEARCH_REACTION).await {
            tracing::debug!(%error, "failed to remove search reaction");
        }
        context
    }

    /// Stateless single-turn completion, already split into message chunks.
    pub async fn ask(&self, author_label: &str, question: &str) -> Result<Vec<String>, BackendError> {
        let transcript = [Turn::user(author_label, question)];
        let response = self
            .oneshot
            .complete(CompletionRequest {
                instructions: None,
                search_context: None,
                transcript: &transcript,
            })
            .await?;
        Ok(split_response(&response, MESSAGE_LIMIT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use tokio::sync::{Semaphore, mpsc};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        React(String),
        Unreact(String),
        Reply(String),
        Send(String),
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<Event>>,
        fail_replies: Vec<usize>,
        replies: AtomicU64,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplySink for RecordingSink {
        async fn add_reaction(&self, emoji: &str) -> crate::Result<()> {
            self.events.lock().unwrap().push(Event::React(emoji.into()));
            Ok(())
        }

        async fn remove_reaction(&self, emoji: &str) -> crate::Result<()> {
            self.events.lock().unwrap().push(Event::Unreact(emoji.into()));
            Ok(())
        }

        fn start_typing(&self) -> TypingGuard {
            TypingGuard::none()
        }

        async fn reply(&self, text: &str) -> crate::Result<u64> {
            let index = self.replies.fetch_add(1, Ordering::SeqCst);
            self.events.lock().unwrap().push(Event::Reply(text.into()));
            if self.fail_replies.contains(&(index as usize)) {
                return Err(anyhow::anyhow!("unknown message").into());
            }
            Ok(1000 + index)
        }

        async fn send(&self, text: &str) -> crate::Result<u64> {
            self.events.lock().unwrap().push(Event::Send(text.into()));
            Ok(1)
        }
    }

    struct FixedCompletion {
        reply: Option<String>,
        seen: Mutex<Vec<(Option<String>, usize)>>,
    }

    impl FixedCompletion {
        fn replying(reply: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for FixedCompletion {
        async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, BackendError> {
            self.seen.lock().unwrap().push((
                request.search_context.map(str::to_string),
                request.transcript.len(),
            ));
            self.reply.clone().ok_or(BackendError::Empty("completion"))
        }
    }

    /// Reports each transcript it sees; holds requests ending in `gated` until released.
    struct GatedCompletion {
        gated: &'static str,
        gate: Semaphore,
        seen: mpsc::UnboundedSender<Vec<String>>,
    }

    #[async_trait]
    impl CompletionBackend for GatedCompletion {
        async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, BackendError> {
            let texts: Vec<String> = request.transcript.iter().map(|turn| turn.text.clone()).collect();
            let last = texts.last().cloned().unwrap_or_default();
            let _ = self.seen.send(texts);
            if last == self.gated {
                let _permit = self.gate.acquire().await.map_err(|_| BackendError::Empty("gate"))?;
            }
            Ok(format!("answer to {last}"))
        }
    }

    #[derive(Default)]
    struct RecordingRemover {
        fail: Vec<u64>,
        attempted: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl ReplyRemover for RecordingRemover {
        async fn delete(&self, reply: SentReply) -> crate::Result<()> {
            self.attempted.lock().unwrap().push(reply.message_id);
            if self.fail.contains(&reply.message_id) {
                return Err(anyhow::anyhow!("unknown message").into());
            }
            Ok(())
        }
    }

    struct FixedSearch(Result<Option<String>, ()>);

    #[async_trait]
    impl SearchBackend for FixedSearch {
        async fn search(&self, _query: &str) -> Result<Option<String>, BackendError> {
            self.0.clone().map_err(|()| BackendError::Empty("search"))
        }
    }

    fn instructions() -> Instructions {
        Instructions {
            persona_name: "Assist".into(),
            preamble: "System : be helpful.".into(),
        }
    }

    fn responder(
        completion: Arc<FixedCompletion>,
        search: Option<Arc<dyn SearchBackend>>,
        max_history: usize,
    ) -> Responder {
        Responder::new(
            completion.clone(),
            completion,
            search,
            max_history,
            instructions(),
            &Locale::default(),
        )
    }

    fn inbound(message_id: u64, text: &str) -> Inbound<'_> {
        Inbound {
            message_id,
            key: SessionKey::new(7, 42),
            author_label: "alice",
            text,
        }
    }

    #[tokio::test]
    async fn hello_bot_appends_user_and_assistant_turns() {
        let responder = responder(FixedCompletion::replying("hi alice"), None, 8);
        let sink = RecordingSink::default();

        let outcome = responder.respond(&inbound(1, "hello bot"), &sink).await;

        assert_eq!(outcome, Outcome::Replied { chunks: 1, failed: 0 });
        let turns = responder.sessions().snapshot(SessionKey::new(7, 42)).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].text, "hello bot");
        assert_eq!(turns[0].author_label.as_deref(), Some("alice"));
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].author_label.as_deref(), Some("Assist"));
        assert_eq!(sink.events(), vec![Event::Reply("hi alice".into())]);
        assert_eq!(
            responder.take_replies(1).unwrap(),
            vec![SentReply { channel_id: 42, message_id: 1000 }]
        );
    }

    #[tokio::test]
    async fn search_reaction_wraps_the_lookup() {
        let completion = FixedCompletion::replying("ok");
        let search: Arc<dyn SearchBackend> = Arc::new(FixedSearch(Ok(Some("results".into()))));
        let responder = responder(completion.clone(), Some(search), 8);
        let sink = RecordingSink::default();

        responder.respond(&inbound(1, "news?"), &sink).await;

        assert_eq!(
            sink.events(),
            vec![
                Event::React(SEARCH_REACTION.into()),
                Event::Unreact(SEARCH_REACTION.into()),
                Event::Reply("ok".into()),
            ]
        );
        assert_eq!(completion.seen.lock().unwrap()[0].0.as_deref(), Some("results"));
    }

    #[tokio::test]
    async fn search_failure_means_no_context() {
        let completion = FixedCompletion::replying("ok");
        let search: Arc<dyn SearchBackend> = Arc::new(FixedSearch(Err(())));
        let responder = responder(completion.clone(), Some(search), 8);

        let outcome = responder.respond(&inbound(1, "news?"), &RecordingSink::default()).await;

        assert_eq!(outcome, Outcome::Replied { chunks: 1, failed: 0 });
        assert_eq!(completion.seen.lock().unwrap()[0].0, None);
    }

    #[tokio::test]
    async fn failed_generation_keeps_assistant_side_untouched() {
        let responder = responder(FixedCompletion::failing(), None, 8);
        let sink = RecordingSink::default();

        let outcome = responder.respond(&inbound(1, "hello"), &sink).await;

        assert_eq!(outcome, Outcome::GenerationFailed);
        let turns = responder.sessions().snapshot(SessionKey::new(7, 42)).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(
            sink.events(),
            vec![Event::Reply(Locale::default().generation_failed)]
        );
        assert!(responder.take_replies(1).is_none());
    }

    #[tokio::test]
    async fn failed_chunk_apologizes_and_continues() {
        let long = "x".repeat(MESSAGE_LIMIT * 2 + 10);
        let responder = responder(FixedCompletion::replying(long), None, 8);
        let sink = RecordingSink {
            fail_replies: vec![1],
            ..Default::default()
        };

        let outcome = responder.respond(&inbound(5, "long please"), &sink).await;

        assert_eq!(outcome, Outcome::Replied { chunks: 3, failed: 1 });
        let events = sink.events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[2], Event::Send(Locale::default().delivery_failed));
        assert!(matches!(events[3], Event::Reply(_)));

        let sent: Vec<_> = responder
            .take_replies(5)
            .unwrap()
            .into_iter()
            .map(|reply| reply.message_id)
            .collect();
        assert_eq!(sent, vec![1000, 1002]);
    }

    #[tokio::test]
    async fn transcript_window_is_bounded_across_turns() {
        let completion = FixedCompletion::replying("ok");
        let responder = responder(completion.clone(), None, 3);
        let sink = RecordingSink::default();

        for id in 0..5 {
            responder.respond(&inbound(id, "again"), &sink).await;
            let len = responder.sessions().snapshot(SessionKey::new(7, 42)).await.unwrap().len();
            assert!(len <= 3);
        }

        // The model never sees more than the window.
        assert!(completion.seen.lock().unwrap().iter().all(|(_, len)| *len <= 3));
    }

    #[tokio::test]
    async fn ask_is_stateless() {
        let responder = responder(FixedCompletion::replying("42"), None, 8);

        let chunks = responder.ask("alice", "meaning of life?").await.unwrap();

        assert_eq!(chunks, vec!["42".to_string()]);
        assert!(responder.sessions().snapshot(SessionKey::new(7, 42)).await.is_none());
    }

    #[tokio::test]
    async fn same_session_is_answered_in_order() {
        let (seen_tx, mut seen) = mpsc::unbounded_channel();
        let completion = Arc::new(GatedCompletion {
            gated: "first",
            gate: Semaphore::new(0),
            seen: seen_tx,
        });
        let responder = Arc::new(Responder::new(
            completion.clone(),
            completion.clone(),
            None,
            8,
            instructions(),
            &Locale::default(),
        ));

        let run = |message_id: u64, key: SessionKey, text: &'static str| {
            let responder = responder.clone();
            tokio::spawn(async move {
                let inbound = Inbound {
                    message_id,
                    key,
                    author_label: "alice",
                    text,
                };
                let sink = RecordingSink::default();
                responder.respond(&inbound, &sink).await
            })
        };
        let wait = Duration::from_secs(1);

        let shared = SessionKey::new(7, 42);
        let first = run(1, shared, "first");
        assert_eq!(seen.recv().await.unwrap(), vec!["first"]);

        // The second message waits for the first turn; another session does not.
        let second = run(2, shared, "second");
        let other = run(3, SessionKey::new(8, 42), "other");
        let next = tokio::time::timeout(wait, seen.recv()).await.unwrap().unwrap();
        assert_eq!(next, vec!["other"]);
        tokio::time::timeout(wait, other).await.unwrap().unwrap();
        assert!(seen.try_recv().is_err());

        completion.gate.add_permits(1);
        first.await.unwrap();
        assert_eq!(
            seen.recv().await.unwrap(),
            vec!["first", "answer to first", "second"]
        );
        assert_eq!(second.await.unwrap(), Outcome::Replied { chunks: 1, failed: 0 });
    }

    #[tokio::test]
    async fn deleting_the_trigger_removes_every_reply() {
        let long = "x".repeat(MESSAGE_LIMIT * 2 + 10);
        let responder = responder(FixedCompletion::replying(long), None, 8);
        responder.respond(&inbound(9, "long please"), &RecordingSink::default()).await;

        let remover = RecordingRemover {
            fail: vec![1001],
            ..Default::default()
        };
        assert_eq!(responder.retract(9, &remover).await, 2);
        assert_eq!(*remover.attempted.lock().unwrap(), vec![1000, 1001, 1002]);

        // Entries are consumed, so a second deletion event is a no-op.
        assert_eq!(responder.retract(9, &remover).await, 0);
        assert_eq!(remover.attempted.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unknown_trigger_deletes_nothing() {
        let responder = responder(FixedCompletion::replying("ok"), None, 8);
        let remover = RecordingRemover::default();

        assert_eq!(responder.retract(404, &remover).await, 0);
        assert!(remover.attempted.lock().unwrap().is_empty());
    }
}
