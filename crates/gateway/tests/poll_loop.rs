//! End-to-end poll loop behaviour against in-memory chat and agent fakes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use rb_agent::{AgentBackend, InvokeRequest, SessionMode};
use rb_domain::clock::ManualClock;
use rb_domain::config::Config;
use rb_domain::error::{Error, Result};
use rb_domain::stream::{AgentEvent, BoxStream};
use rb_domain::ChatId;
use rb_gateway::bootstrap::build_app_state;
use rb_gateway::runtime::PollLoop;
use rb_gateway::state::AppState;
use rb_sessions::{PollCursor, TranscriptWriter};
use rb_telegram::{ChatTransport, Update};

// ── Fakes ────────────────────────────────────────────────────────────

/// Holds undelivered updates and drops the ones acknowledged by `offset`,
/// like the Bot API does.
#[derive(Default)]
struct FakeChat {
    pending: Mutex<Vec<Update>>,
    sent: Mutex<Vec<(ChatId, String)>>,
    offsets: Mutex<Vec<Option<i64>>>,
    failing_fetches: Mutex<usize>,
    /// Redeliver everything regardless of `offset`.
    ignore_offset: bool,
}

impl FakeChat {
    fn push(&self, update: Update) {
        self.pending.lock().push(update);
    }

    fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait::async_trait]
impl ChatTransport for FakeChat {
    async fn get_updates(&self, offset: Option<i64>, _wait: Duration) -> Result<Vec<Update>> {
        self.offsets.lock().push(offset);
        {
            let mut failing = self.failing_fetches.lock();
            if *failing > 0 {
                *failing -= 1;
                return Err(Error::Transport("HTTP 502 - Bad Gateway".into()));
            }
        }

        let mut pending = self.pending.lock();
        if !self.ignore_offset {
            let floor = offset.unwrap_or(0);
            pending.retain(|u| u.update_id >= floor);
        }
        let mut batch = pending.clone();
        batch.sort_by_key(|u| u.update_id);
        Ok(batch)
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.sent.lock().push((chat_id, text.to_owned()));
        Ok(())
    }
}

#[derive(Clone)]
enum Behaviour {
    /// Reply `echo: <prompt>`.
    Echo,
    /// Two tool calls, then `done`.
    Tools,
    /// A fixed reply.
    Reply(String),
    /// End without a result.
    Silent,
    /// Never produce anything.
    Hang,
}

struct FakeAgent {
    summary_prompt: String,
    behaviour: Mutex<Behaviour>,
    calls: Mutex<Vec<InvokeRequest>>,
    /// Time that passes on `clock` during each conversation turn.
    turn_length: Mutex<Option<(Arc<ManualClock>, chrono::Duration)>>,
}

impl FakeAgent {
    fn new(summary_prompt: &str) -> Self {
        Self {
            summary_prompt: summary_prompt.to_owned(),
            behaviour: Mutex::new(Behaviour::Echo),
            calls: Mutex::new(Vec::new()),
            turn_length: Mutex::new(None),
        }
    }

    fn take_time(&self, clock: &Arc<ManualClock>, secs: i64) {
        *self.turn_length.lock() = Some((clock.clone(), chrono::Duration::seconds(secs)));
    }

    fn set(&self, behaviour: Behaviour) {
        *self.behaviour.lock() = behaviour;
    }

    fn conversation_calls(&self) -> Vec<InvokeRequest> {
        self.calls
            .lock()
            .iter()
            .filter(|r| r.prompt != self.summary_prompt)
            .cloned()
            .collect()
    }

    fn summary_calls(&self) -> Vec<InvokeRequest> {
        self.calls
            .lock()
            .iter()
            .filter(|r| r.prompt == self.summary_prompt)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl AgentBackend for FakeAgent {
    async fn start(&self, req: InvokeRequest) -> Result<BoxStream<'static, Result<AgentEvent>>> {
        self.calls.lock().push(req.clone());

        let behaviour = self.behaviour.lock().clone();
        let events = if req.prompt == self.summary_prompt {
            vec![AgentEvent::Result {
                text: "- said hello twice".into(),
            }]
        } else {
            if let Some((clock, step)) = self.turn_length.lock().as_ref() {
                clock.advance(*step);
            }
            match behaviour {
                Behaviour::Echo => vec![AgentEvent::Result {
                    text: format!("echo: {}", req.prompt),
                }],
                Behaviour::Tools => vec![
                    AgentEvent::ToolUse {
                        name: "Bash".into(),
                        input: serde_json::json!({"command": "ls"}),
                    },
                    AgentEvent::ToolResult { is_error: false },
                    AgentEvent::ToolUse {
                        name: "Read".into(),
                        input: serde_json::json!({"path": "notes.md"}),
                    },
                    AgentEvent::Result {
                        text: "done".into(),
                    },
                ],
                Behaviour::Reply(text) => vec![AgentEvent::Result { text }],
                Behaviour::Silent => Vec::new(),
                Behaviour::Hang => {
                    return Ok(Box::pin(async_stream::stream! {
                        std::future::pending::<()>().await;
                        yield Ok(AgentEvent::Result { text: "too late".into() });
                    }));
                }
            }
        };

        Ok(Box::pin(async_stream::stream! {
            for event in events {
                yield Ok(event);
            }
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

// ── Harness ──────────────────────────────────────────────────────────

struct Harness {
    dir: tempfile::TempDir,
    chat: Arc<FakeChat>,
    agent: Arc<FakeAgent>,
    clock: Arc<ManualClock>,
    config: Arc<Config>,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

impl Harness {
    fn new() -> Self {
        Self::with(FakeChat::default(), |_| {})
    }

    fn with(chat: FakeChat, tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.state.dir = dir.path().to_path_buf();
        tweak(&mut config);

        Self {
            agent: Arc::new(FakeAgent::new(&config.agent.summary_prompt)),
            chat: Arc::new(chat),
            clock: Arc::new(ManualClock::new(t0())),
            config: Arc::new(config),
            dir,
        }
    }

    fn state(&self) -> AppState {
        build_app_state(
            self.config.clone(),
            self.chat.clone(),
            self.agent.clone(),
            self.clock.clone(),
        )
        .unwrap()
    }

    fn poll_loop(&self) -> PollLoop {
        PollLoop::new(self.state())
    }

    fn at(&self, secs: i64) {
        self.clock.set(t0() + chrono::Duration::seconds(secs));
    }
}

async fn cycle(poll_loop: &mut PollLoop) -> usize {
    poll_loop.poll_once(&CancellationToken::new()).await.unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn idle_gap_rolls_the_session_and_summarizes_it_once() {
    let h = Harness::new();
    let mut poll_loop = h.poll_loop();

    h.at(0);
    h.chat.push(Update::text_message(1, 42, "hello"));
    assert_eq!(cycle(&mut poll_loop).await, 1);

    h.at(100);
    h.chat.push(Update::text_message(2, 42, "again"));
    assert_eq!(cycle(&mut poll_loop).await, 1);

    h.at(500);
    h.chat.push(Update::text_message(3, 42, "later"));
    assert_eq!(cycle(&mut poll_loop).await, 1);
    poll_loop.drain_workers().await;

    let calls = h.agent.conversation_calls();
    assert_eq!(calls.len(), 3);
    let s1 = calls[0].session_id.clone();
    assert_eq!(calls[0].mode, SessionMode::Create);
    assert_eq!(calls[1].session_id, s1);
    assert_eq!(calls[1].mode, SessionMode::Resume);
    let s2 = calls[2].session_id.clone();
    assert_ne!(s2, s1);
    assert_eq!(calls[2].mode, SessionMode::Create);

    let summaries = h.agent.summary_calls();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].session_id, s1);
    assert_eq!(summaries[0].mode, SessionMode::Resume);

    let entries = poll_loop.state().summaries.read_all().unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.session_id, s1);
    assert_eq!(entry.chat_id, 42);
    assert_eq!(entry.started_at, t0());
    assert_eq!(entry.ended_at, t0() + chrono::Duration::seconds(500));
    assert_eq!(entry.summary, "- said hello twice");
    assert_eq!(
        entry.log_ref.as_deref(),
        Some(h.config.state.transcripts_path().join(format!("{s1}.jsonl")).as_path())
    );

    assert_eq!(
        h.chat.sent_texts(),
        vec!["echo: hello", "echo: again", "echo: later"]
    );
    assert_eq!(poll_loop.cursor().offset(), 4);
}

#[tokio::test]
async fn agent_failure_sends_the_fallback_and_keeps_the_session() {
    let h = Harness::new();
    let mut poll_loop = h.poll_loop();

    h.agent.set(Behaviour::Silent);
    h.chat.push(Update::text_message(10, 7, "do the thing"));
    cycle(&mut poll_loop).await;
    assert_eq!(h.chat.sent_texts(), vec!["Something went wrong, try again."]);

    h.agent.set(Behaviour::Echo);
    h.at(30);
    h.chat.push(Update::text_message(11, 7, "retry"));
    cycle(&mut poll_loop).await;

    let calls = h.agent.conversation_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].session_id, calls[0].session_id);
    assert_eq!(calls[1].mode, SessionMode::Resume);
    assert_eq!(h.chat.sent_texts()[1], "echo: retry");
}

#[tokio::test]
async fn cursor_survives_restart_and_nothing_is_reprocessed() {
    let h = Harness::new();
    {
        let mut poll_loop = h.poll_loop();
        h.chat.push(Update::text_message(5, 1, "one"));
        h.chat.push(Update::text_message(6, 1, "two"));
        assert_eq!(cycle(&mut poll_loop).await, 2);
    }

    let on_disk = PollCursor::load(h.config.state.cursor_path());
    assert_eq!(on_disk.offset(), 7);

    let mut restarted = h.poll_loop();
    assert_eq!(restarted.cursor().offset(), 7);
    assert_eq!(cycle(&mut restarted).await, 0);
    assert_eq!(h.chat.offsets.lock().last().copied(), Some(Some(7)));
    assert_eq!(h.agent.conversation_calls().len(), 2);
}

#[tokio::test]
async fn redelivered_updates_below_the_cursor_are_skipped() {
    let chat = FakeChat {
        ignore_offset: true,
        ..FakeChat::default()
    };
    let h = Harness::with(chat, |_| {});
    let mut poll_loop = h.poll_loop();

    h.chat.push(Update::text_message(20, 3, "once"));
    assert_eq!(cycle(&mut poll_loop).await, 1);
    assert_eq!(cycle(&mut poll_loop).await, 0);

    let mut restarted = h.poll_loop();
    assert_eq!(cycle(&mut restarted).await, 0);
    assert_eq!(h.chat.sent_texts(), vec!["echo: once"]);
}

#[tokio::test]
async fn long_replies_are_chunked_in_order() {
    let h = Harness::with(FakeChat::default(), |c| c.telegram.max_message_chars = 10);
    let mut poll_loop = h.poll_loop();

    let reply: String = ('a'..='y').collect();
    h.agent.set(Behaviour::Reply(reply.clone()));
    h.chat.push(Update::text_message(1, 9, "alphabet please"));
    cycle(&mut poll_loop).await;

    let sent = h.chat.sent_texts();
    assert_eq!(sent, vec!["abcdefghij", "klmnopqrst", "uvwxy"]);
    assert!(sent.iter().all(|c| c.chars().count() <= 10));
    assert_eq!(sent.concat(), reply);
}

#[tokio::test]
async fn split_marker_and_empty_replies() {
    let h = Harness::new();
    let mut poll_loop = h.poll_loop();

    h.agent
        .set(Behaviour::Reply("first part\n---SPLIT---\nsecond part".into()));
    h.chat.push(Update::text_message(1, 9, "two things"));
    cycle(&mut poll_loop).await;

    h.agent.set(Behaviour::Reply("---SPLIT---".into()));
    h.chat.push(Update::text_message(2, 9, "only a marker"));
    cycle(&mut poll_loop).await;

    // Whitespace is no result at all.
    h.agent.set(Behaviour::Reply("   ".into()));
    h.chat.push(Update::text_message(3, 9, "say nothing"));
    cycle(&mut poll_loop).await;

    assert_eq!(
        h.chat.sent_texts(),
        vec![
            "first part",
            "second part",
            "(empty response)",
            "Something went wrong, try again."
        ]
    );
}

#[tokio::test]
async fn working_notice_is_sent_once_before_the_reply() {
    let h = Harness::new();
    let mut poll_loop = h.poll_loop();

    h.agent.set(Behaviour::Tools);
    h.chat.push(Update::text_message(1, 5, "list files"));
    cycle(&mut poll_loop).await;

    assert_eq!(
        h.chat.sent_texts(),
        vec![h.config.agent.working_notice.clone(), "done".to_owned()]
    );
}

#[tokio::test]
async fn sweep_expires_idle_sessions_without_new_messages() {
    let h = Harness::new();
    let mut poll_loop = h.poll_loop();

    h.chat.push(Update::text_message(1, 42, "hello"));
    cycle(&mut poll_loop).await;
    assert_eq!(poll_loop.state().sessions.len(), 1);

    h.at(299);
    cycle(&mut poll_loop).await;
    assert_eq!(poll_loop.state().sessions.len(), 1);

    h.at(300);
    cycle(&mut poll_loop).await;
    assert!(poll_loop.state().sessions.is_empty());

    // A second sweep finds nothing more to summarize.
    h.at(900);
    cycle(&mut poll_loop).await;
    poll_loop.drain_workers().await;

    assert_eq!(h.agent.summary_calls().len(), 1);
    assert_eq!(poll_loop.state().summaries.for_chat(42).unwrap().len(), 1);
}

#[tokio::test]
async fn non_text_updates_advance_the_cursor_silently() {
    let h = Harness::new();
    let mut poll_loop = h.poll_loop();

    h.chat.push(Update {
        update_id: 30,
        chat_id: Some(42),
        text: None,
    });
    h.chat.push(Update {
        update_id: 31,
        chat_id: None,
        text: Some("orphan".into()),
    });
    assert_eq!(cycle(&mut poll_loop).await, 2);

    assert_eq!(poll_loop.cursor().offset(), 32);
    assert!(h.agent.conversation_calls().is_empty());
    assert!(h.chat.sent_texts().is_empty());
}

#[tokio::test]
async fn fetch_failure_is_reported_and_the_cursor_holds() {
    let chat = FakeChat::default();
    *chat.failing_fetches.lock() = 1;
    let h = Harness::with(chat, |_| {});
    let mut poll_loop = h.poll_loop();

    h.chat.push(Update::text_message(1, 42, "hello"));
    let err = poll_loop
        .poll_once(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(poll_loop.cursor().offset(), 0);

    assert_eq!(cycle(&mut poll_loop).await, 1);
    assert_eq!(h.chat.sent_texts(), vec!["echo: hello"]);
}

#[tokio::test]
async fn transcripts_record_both_sides() {
    let h = Harness::new();
    let mut poll_loop = h.poll_loop();

    h.chat.push(Update::text_message(1, 42, "hello"));
    cycle(&mut poll_loop).await;

    let session_id = h.agent.conversation_calls()[0].session_id.clone();
    let writer = TranscriptWriter::new(&h.config.state.transcripts_path());
    let lines = writer.read(&session_id).unwrap();
    let roles: Vec<&str> = lines.iter().map(|l| l.role.as_str()).collect();
    assert_eq!(roles, vec!["user", "assistant"]);
    assert_eq!(lines[1].content, "echo: hello");
    assert_eq!(lines[0].timestamp, t0().to_rfc3339());
    assert!(h.dir.path().join("chats").is_dir());
}

#[tokio::test]
async fn run_stops_when_cancelled() {
    let h = Harness::new();
    let mut poll_loop = h.poll_loop();
    let cancel = CancellationToken::new();
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), poll_loop.run(cancel))
        .await
        .unwrap();
    assert!(h.chat.offsets.lock().is_empty());
}

#[tokio::test]
async fn cursor_commit_failure_stops_before_the_agent_runs() {
    let h = Harness::with(FakeChat::default(), |c| {
        c.state.cursor_file = "blocker/state.json".into();
    });
    std::fs::write(h.dir.path().join("blocker"), "").unwrap();
    let mut poll_loop = h.poll_loop();

    h.chat.push(Update::text_message(1, 42, "hello"));
    let err = poll_loop
        .poll_once(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Persistence(_)), "{err}");
    assert_eq!(poll_loop.cursor().offset(), 0);
    assert!(h.agent.conversation_calls().is_empty());
    assert!(h.chat.sent_texts().is_empty());
}

#[tokio::test]
async fn long_batches_sweep_between_updates() {
    let h = Harness::new();
    let mut poll_loop = h.poll_loop();

    h.chat.push(Update::text_message(1, 7, "hi"));
    cycle(&mut poll_loop).await;
    let stale = h.agent.conversation_calls()[0].session_id.clone();

    // Each turn takes longer than the sweep interval, and the first one
    // pushes chat 7 past the idle timeout.
    h.at(290);
    h.agent.take_time(&h.clock, 40);
    h.chat.push(Update::text_message(2, 42, "first"));
    h.chat.push(Update::text_message(3, 43, "second"));
    assert_eq!(cycle(&mut poll_loop).await, 2);

    assert!(poll_loop.state().sessions.get(7).is_none());
    assert!(poll_loop.state().sessions.get(42).is_some());
    assert!(poll_loop.state().sessions.get(43).is_some());

    poll_loop.drain_workers().await;
    let summaries = h.agent.summary_calls();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].session_id, stale);
    let entries = poll_loop.state().summaries.for_chat(7).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].ended_at, t0() + chrono::Duration::seconds(330));
}

#[tokio::test]
async fn stalled_agent_times_out_to_the_fallback() {
    let h = Harness::with(FakeChat::default(), |c| c.agent.dispatch_timeout_secs = 1);
    let mut poll_loop = h.poll_loop();

    h.agent.set(Behaviour::Hang);
    h.chat.push(Update::text_message(1, 42, "are you there"));
    let handled = tokio::time::timeout(Duration::from_secs(10), cycle(&mut poll_loop))
        .await
        .unwrap();

    assert_eq!(handled, 1);
    assert_eq!(h.chat.sent_texts(), vec!["Something went wrong, try again."]);
    assert_eq!(poll_loop.cursor().offset(), 2);
    assert!(poll_loop.state().sessions.get(42).is_some());
}
