//! Scripted UDP transport

use anidb_cache_core::protocol::{ApiTransport, ParamMap, ProtocolError, Reply, Result};
use async_trait::async_trait;
use log::trace;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Session key handed out by the default AUTH reply
pub const SESSION: &str = "s3ss1";

/// One request as the transport saw it
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub command: String,
    pub params: ParamMap,
}

#[derive(Debug, Clone)]
enum Outcome {
    Reply(Reply),
    /// Never answers; the dispatcher's request timeout fires
    Silence,
    Io(String),
}

impl Outcome {
    fn into_result(self) -> Option<Result<Reply>> {
        match self {
            Outcome::Reply(reply) => Some(Ok(reply)),
            Outcome::Silence => None,
            Outcome::Io(message) => Some(Err(ProtocolError::Io(std::io::Error::other(message)))),
        }
    }
}

/// Configuration for mock behavior
#[derive(Debug)]
struct MockBehavior {
    /// Consumed in order, per command
    queued: HashMap<String, VecDeque<Outcome>>,
    /// Used once a command's queue is empty
    defaults: HashMap<String, Outcome>,
    sent: Vec<SentRequest>,
    delay: Duration,
}

impl Default for MockBehavior {
    fn default() -> Self {
        let defaults = HashMap::from([
            (
                "AUTH".to_string(),
                Outcome::Reply(Reply::new(200, format!("{SESSION} LOGIN ACCEPTED"))),
            ),
            (
                "LOGOUT".to_string(),
                Outcome::Reply(Reply::new(203, "LOGGED OUT")),
            ),
        ]);
        Self {
            queued: HashMap::new(),
            defaults,
            sent: Vec::new(),
            delay: Duration::ZERO,
        }
    }
}

/// In-process [`ApiTransport`] answering from a script
///
/// AUTH and LOGOUT succeed unless scripted otherwise. A command with
/// nothing scripted gets `598 UNKNOWN COMMAND`. Clones share the script and
/// the request log.
///
/// # Examples
///
/// ```rust,no_run
/// use anidb_test_utils::{MockTransport, replies};
///
/// let transport = MockTransport::new();
/// transport.expect("ANIME", replies::anime(12, 1230768000, 1262304000));
/// transport.always("EPISODE", replies::no_such_episode());
/// assert_eq!(transport.count("ANIME"), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    behavior: Arc<Mutex<MockBehavior>>,
}

impl MockTransport {
    /// Create a new mock transport with default behavior
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self, command: &str, outcome: Outcome) {
        let mut behavior = self.behavior.lock().unwrap();
        behavior
            .queued
            .entry(command.to_string())
            .or_default()
            .push_back(outcome);
    }

    /// Answers the next `command` with `reply`
    pub fn expect(&self, command: &str, reply: Reply) {
        self.queue(command, Outcome::Reply(reply));
    }

    /// Lets the next `command` go unanswered
    pub fn expect_silence(&self, command: &str) {
        self.queue(command, Outcome::Silence);
    }

    /// Fails the next `command` with a network error
    pub fn expect_io_error(&self, command: &str, message: &str) {
        self.queue(command, Outcome::Io(message.to_string()));
    }

    /// Answers every unscripted `command` with `reply`
    pub fn always(&self, command: &str, reply: Reply) {
        let mut behavior = self.behavior.lock().unwrap();
        behavior
            .defaults
            .insert(command.to_string(), Outcome::Reply(reply));
    }

    /// Never answers unscripted `command`s
    pub fn always_silent(&self, command: &str) {
        let mut behavior = self.behavior.lock().unwrap();
        behavior.defaults.insert(command.to_string(), Outcome::Silence);
    }

    /// Holds every reply back for `delay`
    pub fn set_delay(&self, delay: Duration) {
        self.behavior.lock().unwrap().delay = delay;
    }

    /// Every request sent so far, in order
    pub fn sent(&self) -> Vec<SentRequest> {
        self.behavior.lock().unwrap().sent.clone()
    }

    /// Requests of one command, in order
    pub fn sent_of(&self, command: &str) -> Vec<SentRequest> {
        self.sent()
            .into_iter()
            .filter(|request| request.command == command)
            .collect()
    }

    /// How many times `command` was sent
    pub fn count(&self, command: &str) -> usize {
        self.sent_of(command).len()
    }

    /// How many requests went out in total, AUTH included
    pub fn total(&self) -> usize {
        self.behavior.lock().unwrap().sent.len()
    }

    fn next_outcome(&self, command: &str, params: &ParamMap) -> (Outcome, Duration) {
        let mut behavior = self.behavior.lock().unwrap();
        behavior.sent.push(SentRequest {
            command: command.to_string(),
            params: params.clone(),
        });
        let outcome = behavior
            .queued
            .get_mut(command)
            .and_then(VecDeque::pop_front)
            .or_else(|| behavior.defaults.get(command).cloned())
            .unwrap_or_else(|| Outcome::Reply(Reply::new(598, "UNKNOWN COMMAND")));
        (outcome, behavior.delay)
    }
}

#[async_trait]
impl ApiTransport for MockTransport {
    async fn send(&self, command: &str, params: &ParamMap) -> Result<Reply> {
        let (outcome, delay) = self.next_outcome(command, params);
        trace!("Mock transport answering {command} with {outcome:?}");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match outcome.into_result() {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}
