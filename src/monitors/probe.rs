//! Reachability probes for single servers
//!
//! A probe answers one question: is `(hostname, port)` reachable right now?
//! It never fails. Invalid targets, DNS errors, refused connections and
//! timeouts all become an `offline` (or `error`) [`ProbeOutcome`] carrying a
//! diagnostic message, so callers only ever persist values.
//!
//! ## Check order
//!
//! ```text
//! validate target → resolve hostname → [ping] → HTTP GET or TCP connect
//! ```
//!
//! Every network step is bounded by the same per-attempt timeout. There are
//! no retries; the next poll cycle is the retry.

use std::error::Error as StdError;
use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::net::{TcpStream, lookup_host};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{instrument, trace};

use crate::config::PingPolicy;
use crate::models::{ServerKind, ServerStatus};

/// Verdict of a single probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    pub status: ServerStatus,
    pub message: String,
}

impl ProbeOutcome {
    pub fn online(message: impl Into<String>) -> Self {
        Self {
            status: ServerStatus::Online,
            message: message.into(),
        }
    }

    pub fn offline(message: impl Into<String>) -> Self {
        Self {
            status: ServerStatus::Offline,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ServerStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == ServerStatus::Online
    }
}

/// Something that can check whether a server is reachable
///
/// The engine only talks to this trait, which keeps the network out of the
/// poller's tests.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, hostname: &str, port: i64, kind: &ServerKind) -> ProbeOutcome;
}

/// Prober that talks to the network: DNS, optional ping, TCP or HTTP
pub struct NetworkProber {
    /// HTTP client for HTTP-like servers (reused across probes)
    client: reqwest::Client,

    /// Upper bound for every individual network step
    timeout: Duration,

    /// How a ping result is combined with the service check
    ping: PingPolicy,
}

impl NetworkProber {
    pub fn new(timeout: Duration, ping: PingPolicy) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            // the first response is what counts, wherever it points to
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            timeout,
            ping,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn resolve(&self, hostname: &str, port: u16) -> Result<Vec<SocketAddr>, ProbeOutcome> {
        match timeout(self.timeout, lookup_host((hostname, port))).await {
            Ok(Ok(addrs)) => {
                let addrs: Vec<SocketAddr> = addrs.collect();
                if addrs.is_empty() {
                    Err(ProbeOutcome::offline(format!(
                        "could not resolve hostname {hostname}: no addresses found"
                    )))
                } else {
                    Ok(addrs)
                }
            }
            Ok(Err(e)) => Err(ProbeOutcome::offline(format!(
                "could not resolve hostname {hostname}: {e}"
            ))),
            Err(_) => Err(ProbeOutcome::offline(format!(
                "resolving hostname {hostname} timed out after {}s",
                self.timeout.as_secs_f32()
            ))),
        }
    }

    async fn check_service(
        &self,
        hostname: &str,
        port: u16,
        addrs: &[SocketAddr],
        kind: &ServerKind,
    ) -> ProbeOutcome {
        match kind {
            ServerKind::Http { tls } => self.check_http(hostname, port, *tls).await,
            _ => self.check_tcp(hostname, port, addrs).await,
        }
    }

    async fn check_tcp(&self, hostname: &str, port: u16, addrs: &[SocketAddr]) -> ProbeOutcome {
        match timeout(self.timeout, TcpStream::connect(addrs)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                ProbeOutcome::online(format!("tcp connection successful on port {port}"))
            }
            Ok(Err(e)) => ProbeOutcome::offline(format!(
                "tcp connection to {hostname}:{port} failed: {e}"
            )),
            Err(_) => ProbeOutcome::offline(format!(
                "tcp connection to {hostname}:{port} timed out after {}s",
                self.timeout.as_secs_f32()
            )),
        }
    }

    async fn check_http(&self, hostname: &str, port: u16, tls: bool) -> ProbeOutcome {
        let url = http_url(hostname, port, tls);
        trace!("requesting {url}");

        match self.client.get(&url).send().await {
            Ok(response) => ProbeOutcome::online(format!(
                "http check returned status {}",
                response.status().as_u16()
            )),
            Err(e) if e.is_timeout() => ProbeOutcome::offline(format!(
                "http request to {url} timed out after {}s",
                self.timeout.as_secs_f32()
            )),
            Err(e) => ProbeOutcome::offline(format!(
                "http request to {url} failed: {}",
                error_chain(&e)
            )),
        }
    }

    async fn ping_host(&self, hostname: &str) -> ProbeOutcome {
        let wait_secs = self.timeout.as_secs().max(1);
        let mut command = Command::new("ping");
        if cfg!(windows) {
            let wait_millis = (wait_secs * 1000).to_string();
            command.args(["-n", "1", "-w", wait_millis.as_str(), hostname]);
        } else {
            let wait = wait_secs.to_string();
            command.args(["-c", "1", "-W", wait.as_str(), hostname]);
        }
        command.kill_on_drop(true);

        // ping enforces its own deadline; this one covers a hung process
        let deadline = Duration::from_secs(wait_secs) + Duration::from_secs(1);
        match timeout(deadline, command.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                ProbeOutcome::online("host responded to ping")
            }
            Ok(Ok(_)) => ProbeOutcome::offline(format!("no ping reply from {hostname}")),
            Ok(Err(e)) => ProbeOutcome::error(format!("could not run ping: {e}")),
            Err(_) => ProbeOutcome::offline(format!(
                "ping to {hostname} timed out after {wait_secs}s"
            )),
        }
    }
}

#[async_trait]
impl Prober for NetworkProber {
    #[instrument(skip(self, kind), fields(kind = %kind))]
    async fn probe(&self, hostname: &str, port: i64, kind: &ServerKind) -> ProbeOutcome {
        let hostname = hostname.trim();
        let port = match u16::try_from(port) {
            Ok(port) if port > 0 && !hostname.is_empty() => port,
            _ => return ProbeOutcome::offline("invalid hostname or port"),
        };

        let addrs = match self.resolve(hostname, port).await {
            Ok(addrs) => addrs,
            Err(outcome) => return outcome,
        };
        trace!("resolved {hostname} to {addrs:?}");

        let outcome = match self.ping {
            PingPolicy::Disabled => self.check_service(hostname, port, &addrs, kind).await,
            policy => {
                let (ping, service) = tokio::join!(
                    self.ping_host(hostname),
                    self.check_service(hostname, port, &addrs, kind)
                );
                combine(policy, ping, service)
            }
        };

        trace!("probe finished: {} ({})", outcome.status, outcome.message);
        outcome
    }
}

/// Merge a ping verdict with a service verdict according to `policy`
pub fn combine(policy: PingPolicy, ping: ProbeOutcome, service: ProbeOutcome) -> ProbeOutcome {
    let status = match policy {
        PingPolicy::Disabled => return service,
        PingPolicy::RequireBoth => {
            if ping.is_online() && service.is_online() {
                ServerStatus::Online
            } else if ping.status == ServerStatus::Error || service.status == ServerStatus::Error {
                ServerStatus::Error
            } else {
                ServerStatus::Offline
            }
        }
        PingPolicy::HostReachable => {
            if ping.is_online() {
                ServerStatus::Online
            } else {
                service.status
            }
        }
    };

    ProbeOutcome {
        status,
        message: format!("ping: {}; {}", ping.message, service.message),
    }
}

fn http_url(hostname: &str, port: u16, tls: bool) -> String {
    let scheme = if tls { "https" } else { "http" };
    if hostname.parse::<Ipv6Addr>().is_ok() {
        format!("{scheme}://[{hostname}]:{port}/")
    } else {
        format!("{scheme}://{hostname}:{port}/")
    }
}

/// reqwest's top-level message hides the cause (refused, reset, ...)
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
