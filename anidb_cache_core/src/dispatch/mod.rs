//! Transport dispatch queue
//!
//! One worker task owns the connection state: the session, the pacing
//! throttle and the timeout backoff. Callers hand it requests through a
//! [`Dispatcher`] and await the reply. Requests are sent one at a time in
//! arrival order.
//!
//! Per request the worker:
//! - fails fast with [`ProtocolError::Banned`] while the ban marker is live,
//! - authenticates first when there is no session,
//! - retries timeouts, I/O errors and 600/602 replies with capped
//!   exponential backoff,
//! - re-authenticates once on 403/501/506,
//! - turns 503/504 into a fatal [`ProtocolError::ClientRejected`],
//! - touches the ban marker on 555/601.

mod throttle;

pub use throttle::{Backoff, Throttle};

use crate::cache::{Cache, CacheKey, is_expired};
use crate::config::DispatchConfig;
use crate::protocol::{ApiTransport, PROTOCOL_VERSION, ParamMap, ProtocolError, Reply, Result};
use crate::security::{CredentialProvider, SecureString};
use chrono::Utc;
use log::{debug, trace, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};

/// Store key of the ban marker
pub fn ban_key() -> CacheKey {
    crate::cache_key!["banned"]
}

/// True while the ban marker is younger than `cooldown`; deletes an expired marker
pub async fn check_banned(cache: &Cache, cooldown: Duration) -> bool {
    let key = ban_key();
    match cache.stat(&key).await {
        None => false,
        Some(stamp) if is_expired(stamp, cooldown, Utc::now()) => {
            debug!("Ban cooldown over, removing marker");
            cache.delete(&key).await;
            false
        }
        Some(_) => true,
    }
}

enum Job {
    Request {
        command: String,
        params: ParamMap,
        reply: oneshot::Sender<Result<Reply>>,
    },
    Auth {
        reply: oneshot::Sender<Result<()>>,
    },
    Logout {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Handle to the dispatch worker; cloning shares the same queue
#[derive(Clone)]
pub struct Dispatcher {
    jobs: mpsc::UnboundedSender<Job>,
    cache: Cache,
    ban_cooldown: Duration,
}

impl Dispatcher {
    /// Spawns the worker on the current tokio runtime
    pub fn spawn(
        config: &DispatchConfig,
        transport: Arc<dyn ApiTransport>,
        cache: Cache,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let (jobs, queue) = mpsc::unbounded_channel();
        let worker = Worker {
            transport,
            cache: cache.clone(),
            credentials,
            session: None,
            throttle: Throttle::from_config(config),
            backoff: Backoff::from_config(config),
            max_retries: config.max_retries,
            request_timeout: config.request_timeout(),
            ban_cooldown: config.ban_cooldown(),
            client_name: config.client_name.clone(),
            client_version: config.client_version,
        };
        tokio::spawn(worker.run(queue));

        Self {
            jobs,
            cache,
            ban_cooldown: config.ban_cooldown(),
        }
    }

    /// Queues `command` and waits for its reply
    ///
    /// Replies with error codes the queue does not handle itself (330, 320, ...)
    /// come back as `Ok` for the caller to interpret.
    pub async fn send(&self, command: &str, params: ParamMap) -> Result<Reply> {
        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job::Request {
                command: command.to_string(),
                params,
                reply,
            })
            .map_err(|_| ProtocolError::QueueClosed)?;
        rx.await.map_err(|_| ProtocolError::QueueClosed)?
    }

    /// Drops the current session and authenticates with the stored credentials
    pub async fn authenticate(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job::Auth { reply })
            .map_err(|_| ProtocolError::QueueClosed)?;
        rx.await.map_err(|_| ProtocolError::QueueClosed)?
    }

    /// Ends the current session, if any
    pub async fn logout(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job::Logout { reply })
            .map_err(|_| ProtocolError::QueueClosed)?;
        rx.await.map_err(|_| ProtocolError::QueueClosed)?
    }

    pub async fn is_banned(&self) -> bool {
        check_banned(&self.cache, self.ban_cooldown).await
    }
}

struct Worker {
    transport: Arc<dyn ApiTransport>,
    cache: Cache,
    credentials: Arc<dyn CredentialProvider>,
    session: Option<SecureString>,
    throttle: Throttle,
    backoff: Backoff,
    max_retries: u32,
    request_timeout: Duration,
    ban_cooldown: Duration,
    client_name: String,
    client_version: u32,
}

impl Worker {
    async fn run(mut self, mut queue: mpsc::UnboundedReceiver<Job>) {
        debug!("Dispatch worker started");
        while let Some(job) = queue.recv().await {
            match job {
                Job::Request {
                    command,
                    params,
                    reply,
                } => {
                    let result = self.request(&command, params).await;
                    // The caller may have stopped waiting
                    let _ = reply.send(result);
                }
                Job::Auth { reply } => {
                    self.session = None;
                    let _ = reply.send(self.authenticate().await);
                }
                Job::Logout { reply } => {
                    let _ = reply.send(self.logout().await);
                }
            }
        }
        debug!("Dispatch worker stopped");
    }

    async fn request(&mut self, command: &str, params: ParamMap) -> Result<Reply> {
        if self.session.is_none() {
            self.authenticate().await?;
        }

        let reply = self.send_with_retry(command, &params).await?;
        if !matches!(reply.code, 403 | 501 | 506) {
            return Ok(reply);
        }

        warn!("Session rejected ({} {}), re-authenticating", reply.code, reply.text);
        self.session = None;
        self.authenticate().await?;
        let reply = self.send_with_retry(command, &params).await?;
        match reply.error() {
            Some(e) if e.requires_reauth() => Err(e),
            _ => Ok(reply),
        }
    }

    async fn authenticate(&mut self) -> Result<()> {
        let Some(credentials) = self.credentials.current().await else {
            debug!("No stored credentials, cannot authenticate");
            return Err(ProtocolError::NotAuthenticated);
        };

        let params = ParamMap::new()
            .with("user", &credentials.username)
            .with("pass", credentials.password.expose_secret())
            .with("protover", PROTOCOL_VERSION)
            .with("client", &self.client_name)
            .with("clientver", self.client_version)
            .with("nat", 1)
            .with("enc", "UTF-8");
        let reply = self.send_with_retry("AUTH", &params).await?;

        match reply.code {
            200 | 201 => {
                let session = reply.text.split_whitespace().next().unwrap_or_default();
                if session.is_empty() {
                    return Err(ProtocolError::invalid_reply("AUTH reply without session"));
                }
                debug!("Authenticated as {}", credentials.username);
                self.session = Some(SecureString::new(session));
                Ok(())
            }
            500 => {
                warn!("Login refused for {}, forgetting credentials", credentials.username);
                self.credentials.clear().await;
                Err(ProtocolError::authentication_failed(reply.text))
            }
            code => Err(reply
                .error()
                .unwrap_or_else(|| ProtocolError::server_error(code, reply.text.clone()))),
        }
    }

    async fn logout(&mut self) -> Result<()> {
        if self.session.is_none() {
            trace!("Logout without a session");
            return Ok(());
        }
        let result = self.send_with_retry("LOGOUT", &ParamMap::new()).await;
        self.session = None;
        match result?.error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Sends until a reply that is not transient arrives or retries run out
    async fn send_with_retry(&mut self, command: &str, params: &ParamMap) -> Result<Reply> {
        let mut retries = 0;
        loop {
            if check_banned(&self.cache, self.ban_cooldown).await {
                debug!("Banned, not sending {command}");
                return Err(ProtocolError::Banned);
            }

            // Rebuilt on every attempt so a retry never carries a stale session
            let mut outgoing = params.clone();
            if command != "AUTH"
                && let Some(session) = &self.session
            {
                outgoing.insert("s", session.expose_secret());
            }

            let outcome = self.exchange(command, &outgoing).await.and_then(|reply| {
                match reply.error() {
                    Some(e) if e.is_transient() => Err(e),
                    _ => Ok(reply),
                }
            });
            match outcome {
                Ok(reply) => {
                    self.backoff.reset();
                    return self.classify(reply).await;
                }
                Err(e) if e.is_transient() => {
                    if retries >= self.max_retries {
                        warn!("UDP--- {command} failed after {retries} retries: {e}");
                        return Err(e);
                    }
                    retries += 1;
                    let wait = self.backoff.next();
                    warn!("UDP--- {e}; waiting {wait:?} before retry");
                    sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn classify(&self, reply: Reply) -> Result<Reply> {
        match reply.code {
            503 | 504 => {
                warn!("Client rejected by server: {} {}", reply.code, reply.text);
                Err(ProtocolError::client_rejected(reply.code, reply.text))
            }
            555 | 601 => {
                warn!("Server refuses service ({} {}), backing off", reply.code, reply.text);
                self.cache.touch(&ban_key()).await;
                Err(ProtocolError::Banned)
            }
            _ => Ok(reply),
        }
    }

    /// One paced round trip
    async fn exchange(&mut self, command: &str, params: &ParamMap) -> Result<Reply> {
        self.throttle.wait().await;

        if command == "AUTH" {
            debug!("UDP>>> AUTH user={}", params.get("user").unwrap_or_default());
        } else {
            debug!("UDP>>> {command} {params}");
        }

        let result = timeout(self.request_timeout, self.transport.send(command, params)).await;
        self.throttle.sent();

        let reply = result.map_err(|_| ProtocolError::Timeout)??;
        debug!("UDP<<< {} {}", reply.code, reply.text);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::cache::Store;
    use chrono::TimeDelta;

    #[tokio::test]
    async fn test_ban_marker_expires() {
        let store = MemoryStore::new();
        let cache = Cache::new(Arc::new(store.clone()));
        let cooldown = Duration::from_secs(30 * 60 + 1);

        assert!(!check_banned(&cache, cooldown).await);

        cache.touch(&ban_key()).await;
        assert!(check_banned(&cache, cooldown).await);

        store
            .touch_at(&ban_key(), Utc::now() - TimeDelta::minutes(31))
            .await
            .unwrap();
        assert!(!check_banned(&cache, cooldown).await);
        assert!(store.stat(&ban_key()).await.unwrap().is_none());
    }
}
