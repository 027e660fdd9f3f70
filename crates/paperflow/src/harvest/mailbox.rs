//! Reading Google Scholar alert mails over IMAP.
//!
//! The connection is TLS on top of an `async-io` TCP stream. Messages are fetched one at a time
//! as `RFC822`, parsed with `mail-parser` (which takes care of quoted-printable, base64 and
//! charsets) and filtered on sender, subject and age before their text and HTML parts are handed
//! back as one body per message.

use std::future::Future;

use async_imap::Session;
use async_native_tls::TlsConnector;
use chrono::Utc;
use futures_util::StreamExt;
use mail_parser::{MessageParser, PartType};
use secrecy::{ExposeSecret, SecretString};

use super::*;

/// Async TCP stream driven by `async-io`.
type AsyncTcpStream = async_io::Async<std::net::TcpStream>;

/// TLS stream the IMAP session runs over.
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// Counters describing one mailbox scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxReport {
  /// Messages fetched
  pub scanned:         usize,
  /// Messages whose body was kept
  pub accepted:        usize,
  /// Dropped because the From header lacks the sender
  pub dropped_sender:  usize,
  /// Dropped because the subject lacks the required text
  pub dropped_subject: usize,
  /// Dropped because the message is too old
  pub dropped_date:    usize,
  /// Messages that could not be fetched or parsed
  pub failed:          usize,
}

impl Display for MailboxReport {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "scanned {}, accepted {}, wrong sender {}, wrong subject {}, too old {}, failed {}",
      self.scanned,
      self.accepted,
      self.dropped_sender,
      self.dropped_subject,
      self.dropped_date,
      self.failed
    )
  }
}

/// What to do with one raw message.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Verdict {
  /// Keep the message; carries the concatenated text and HTML parts
  Accepted(String),
  /// From header does not mention the sender
  WrongSender,
  /// Subject does not contain the required text
  WrongSubject,
  /// Older than the configured window
  TooOld,
  /// Not a parseable message
  Unparseable,
}

impl MailboxReport {
  /// Counts one verdict.
  fn record(&mut self, verdict: &Verdict) {
    match verdict {
      Verdict::Accepted(_) => self.accepted += 1,
      Verdict::WrongSender => self.dropped_sender += 1,
      Verdict::WrongSubject => self.dropped_subject += 1,
      Verdict::TooOld => self.dropped_date += 1,
      Verdict::Unparseable => self.failed += 1,
    }
  }
}

/// Renders an address the way it appears in a From header.
fn format_address(addr: &mail_parser::Addr) -> String {
  if let Some(name) = addr.name() {
    format!("{} <{}>", name, addr.address().unwrap_or_default())
  } else {
    addr.address().unwrap_or_default().to_string()
  }
}

/// Decides whether a raw message is an alert worth reading, relative to `now`.
pub(crate) fn inspect(raw: &[u8], config: &MailboxConfig, now: chrono::DateTime<Utc>) -> Verdict {
  let Some(message) = MessageParser::default().parse(raw) else {
    return Verdict::Unparseable;
  };

  let from = message.from().and_then(|addr| addr.first().map(format_address)).unwrap_or_default();
  if !from.contains(config.sender.as_str()) {
    return Verdict::WrongSender;
  }

  if let Some(required) = config.subject_contains.as_deref().filter(|s| !s.is_empty()) {
    if !message.subject().unwrap_or_default().contains(required) {
      return Verdict::WrongSubject;
    }
  }

  if config.days_recent > 0 {
    if let Some(date) = message.date() {
      let cutoff = now.timestamp() - i64::from(config.days_recent) * 86_400;
      if date.to_timestamp() < cutoff {
        return Verdict::TooOld;
      }
    }
  }

  let mut body = String::new();
  for part in &message.parts {
    match &part.body {
      PartType::Text(text) | PartType::Html(text) => {
        body.push_str(text);
        body.push('\n');
      },
      _ => {},
    }
  }
  Verdict::Accepted(body)
}

/// Runs one mailbox step, failing with [`PaperflowError::Mail`] once it outlasts `limit`.
async fn bounded<T>(
  limit: Duration,
  step: &str,
  fut: impl Future<Output = Result<T>>,
) -> Result<T> {
  match tokio::time::timeout(limit, fut).await {
    Ok(result) => result,
    Err(_) => Err(PaperflowError::Mail(format!("{step} timed out after {}s", limit.as_secs()))),
  }
}

/// Resolves the server and opens a TCP connection to the first address that accepts.
async fn connect(config: &MailboxConfig) -> Result<AsyncTcpStream> {
  let mut last_error = None;
  for addr in tokio::net::lookup_host((config.imap_server.as_str(), config.port)).await? {
    match AsyncTcpStream::connect(addr).await {
      Ok(stream) => return Ok(stream),
      Err(e) => {
        debug!(%addr, error = %e, "connection refused");
        last_error = Some(e);
      },
    }
  }
  Err(match last_error {
    Some(e) => e.into(),
    None => PaperflowError::Mail(format!("{} did not resolve", config.imap_server)),
  })
}

/// Connects and logs in once. Every step is bounded by the mailbox timeout.
async fn open_session(
  config: &MailboxConfig,
  account: &str,
  password: &SecretString,
) -> Result<Session<TlsStream>> {
  let limit = config.timeout();
  info!("Connecting to IMAP server at {}:{}", config.imap_server, config.port);

  let tcp_stream = bounded(limit, "connect", connect(config)).await?;

  let tls_stream = bounded(limit, "TLS handshake", async {
    TlsConnector::new()
      .connect(&config.imap_server, tcp_stream)
      .await
      .map_err(|e| PaperflowError::Mail(format!("TLS handshake failed: {e}")))
  })
  .await?;

  let client = async_imap::Client::new(tls_stream);
  bounded(limit, "login", async {
    client
      .login(account, password.expose_secret())
      .await
      .map_err(|(e, _)| PaperflowError::Mail(format!("login failed: {e}")))
  })
  .await
}

/// Fetches one message as raw RFC822 bytes.
async fn fetch_raw(session: &mut Session<TlsStream>, seq: u32) -> Result<Vec<u8>> {
  let mut messages = session.fetch(seq.to_string(), "RFC822").await?;
  let mut raw = None;
  // Drain the stream so the session is ready for the next command.
  while let Some(fetch) = messages.next().await {
    let fetch = fetch?;
    if raw.is_none() {
      raw = fetch.body().map(<[u8]>::to_vec);
    }
  }
  raw.ok_or_else(|| PaperflowError::Mail(format!("message {seq} has no body")))
}

/// Connects with retries, scans the inbox and returns the bodies of accepted alerts.
///
/// A server that stops answering fails the command it is stuck in after
/// [`MailboxConfig::timeout`].
pub(crate) async fn fetch_alert_bodies(
  config: &MailboxConfig,
  (account, password): (String, SecretString),
  policy: &retry::RetryPolicy,
) -> Result<(Vec<String>, MailboxReport)> {
  let limit = config.timeout();
  let (account, password) = (account.as_str(), &password);
  let mut session = policy.retry(move |_| open_session(config, account, password)).await?;

  bounded(limit, "select", async { session.select("INBOX").await.map_err(PaperflowError::from) })
    .await?;
  let query = format!("FROM \"{}\"", config.sender);
  let found =
    bounded(limit, "search", async { session.search(query).await.map_err(PaperflowError::from) })
      .await?;
  let mut ids: Vec<u32> = found.into_iter().collect();
  ids.sort_unstable();
  let start = ids.len().saturating_sub(config.max_messages);
  let recent: Vec<u32> = ids[start..].iter().rev().copied().collect();
  debug!(matching = ids.len(), inspected = recent.len(), "searched inbox");

  let now = Utc::now();
  let mut report = MailboxReport::default();
  let mut bodies = Vec::new();
  let mut stalled = false;
  for seq in recent {
    report.scanned += 1;
    let raw = match tokio::time::timeout(limit, fetch_raw(&mut session, seq)).await {
      Ok(Ok(raw)) => raw,
      Ok(Err(e)) => {
        warn!(seq, error = %e, "could not fetch message");
        report.failed += 1;
        continue;
      },
      // The session is mid-response now, so nothing after this message can be read.
      Err(_) => {
        warn!(seq, timeout = ?limit, "fetch timed out, stopping the scan");
        report.failed += 1;
        stalled = true;
        break;
      },
    };

    let verdict = inspect(&raw, config, now);
    report.record(&verdict);
    match verdict {
      Verdict::Accepted(body) => bodies.push(body),
      other => trace!(seq, verdict = ?other, "skipping message"),
    }
  }

  if !stalled {
    let logout = async { session.logout().await.map_err(PaperflowError::from) };
    if let Err(e) = bounded(limit, "logout", logout).await {
      warn!(error = %e, "logout failed");
    }
  }
  Ok((bodies, report))
}
