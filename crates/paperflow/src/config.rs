//! Configuration for the whole pipeline.
//!
//! A [`Config`] is read from TOML; every key is optional and falls back to the defaults below.
//!
//! ```toml
//! database_path        = "/home/me/.local/share/paperflow/papers.db"
//! storage_path         = "/home/me/Documents/paperflow/papers"
//! request_timeout_secs = 30
//! labels               = ["fintech", "llm", "quant"]
//!
//! [mailbox]
//! imap_server      = "imap.qq.com"
//! account          = "me@qq.com"
//! # or set PAPERFLOW_MAIL_PASSWORD
//! password         = "app-specific-password"
//! days_recent      = 7
//! timeout_secs     = 30
//!
//! [search]
//! max_results = 20
//! sources     = ["arxiv", "scholar", "google"]
//!
//! [llm.simple]
//! host  = "http://localhost:11434"
//! model = "llama3.2:3b"
//! ```
//!
//! [`Config::validate`] is called once when a [`Pipeline`](crate::pipeline::Pipeline) is built.

use secrecy::SecretString;

use super::*;

/// Environment variable consulted when the mailbox password is not in the file.
pub const PASSWORD_ENV: &str = "PAPERFLOW_MAIL_PASSWORD";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// SQLite database file.
  pub database_path:        PathBuf,
  /// Directory receiving PDFs and their derived documents.
  pub storage_path:         PathBuf,
  /// Timeout for ordinary HTTP requests. Downloads use at least 45 seconds.
  pub request_timeout_secs: u64,
  /// Topic label pool offered to the classifier.
  pub labels:               Vec<String>,
  /// Subject written when the classifier selects no label.
  pub subject:              Option<String>,
  /// Mailbox harvest settings.
  pub mailbox:              MailboxConfig,
  /// Web search harvest settings.
  pub search:               SearchConfig,
  /// Text-generation services.
  pub llm:                  LlmConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      database_path:        Database::default_path(),
      storage_path:         Database::default_storage_path(),
      request_timeout_secs: 30,
      labels:               Vec::new(),
      subject:              None,
      mailbox:              MailboxConfig::default(),
      search:               SearchConfig::default(),
      llm:                  LlmConfig::default(),
    }
  }
}

impl Config {
  /// Returns the default path of the configuration file.
  ///
  /// - On Unix: `~/.config/paperflow/config.toml`
  /// - On macOS: `~/Library/Application Support/paperflow/config.toml`
  /// - On Windows: `%APPDATA%\paperflow\config.toml`
  pub fn default_path() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("paperflow").join("config.toml")
  }

  /// Reads a configuration file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    debug!("Loading configuration from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
  }

  /// Reads a configuration file, or returns the defaults when it does not exist.
  pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if path.exists() {
      Self::load(path)
    } else {
      debug!("No configuration at {}, using defaults", path.display());
      Ok(Self::default())
    }
  }

  /// Writes this configuration, creating the parent directory. The mailbox password is never
  /// written.
  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(self)?)?;
    Ok(())
  }

  /// Sets the database file.
  pub fn with_database_path(mut self, path: &Path) -> Self {
    self.database_path = path.to_path_buf();
    self
  }

  /// Sets the storage directory.
  pub fn with_storage_path(mut self, path: &Path) -> Self {
    self.storage_path = path.to_path_buf();
    self
  }

  /// Sets the label pool.
  pub fn with_labels<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Self {
    self.labels = labels.into_iter().map(Into::into).collect();
    self
  }

  /// Sets the request timeout.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.request_timeout_secs = timeout.as_secs();
    self
  }

  /// Request timeout as a [`Duration`].
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }

  /// Checks the settings that every stage relies on.
  pub fn validate(&self) -> Result<()> {
    if self.request_timeout_secs == 0 {
      return Err(PaperflowError::Config("request_timeout_secs must be positive".into()));
    }
    if self.mailbox.timeout_secs == 0 {
      return Err(PaperflowError::Config("mailbox.timeout_secs must be positive".into()));
    }
    if self.labels.iter().any(|l| l.trim().is_empty()) {
      return Err(PaperflowError::Config("labels must not contain empty entries".into()));
    }
    if self.search.max_results == 0 {
      return Err(PaperflowError::Config("search.max_results must be positive".into()));
    }
    for (role, model) in [("simple", &self.llm.simple), ("complex", &self.llm.complex)] {
      if let Some(model) = model {
        Url::parse(&model.host).map_err(|e| {
          PaperflowError::Config(format!("llm.{role}.host {:?} is not a url: {e}", model.host))
        })?;
        if model.model.trim().is_empty() {
          return Err(PaperflowError::Config(format!("llm.{role}.model must be set")));
        }
      }
    }
    Ok(())
  }
}

/// IMAP mailbox settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
  /// IMAP server host.
  pub imap_server:      String,
  /// IMAP over TLS port.
  pub port:             u16,
  /// Login account.
  pub account:          Option<String>,
  /// Login password. Never serialized back out.
  #[serde(skip_serializing)]
  pub password:         Option<String>,
  /// Only messages whose From header contains this address are read.
  pub sender:           String,
  /// Messages older than this many days are ignored. Zero disables the check.
  pub days_recent:      u32,
  /// Only messages whose subject contains this string are read.
  pub subject_contains: Option<String>,
  /// Number of most recent matching messages inspected.
  pub max_messages:     usize,
  /// Limit on connecting and on every IMAP command.
  pub timeout_secs:     u64,
}

impl Default for MailboxConfig {
  fn default() -> Self {
    Self {
      imap_server:      "imap.qq.com".to_string(),
      port:             993,
      account:          None,
      password:         None,
      sender:           "scholaralerts-noreply@google.com".to_string(),
      days_recent:      7,
      subject_contains: None,
      max_messages:     300,
      timeout_secs:     30,
    }
  }
}

impl std::fmt::Debug for MailboxConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MailboxConfig")
      .field("imap_server", &self.imap_server)
      .field("port", &self.port)
      .field("account", &self.account)
      .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
      .field("sender", &self.sender)
      .field("days_recent", &self.days_recent)
      .field("subject_contains", &self.subject_contains)
      .field("max_messages", &self.max_messages)
      .field("timeout_secs", &self.timeout_secs)
      .finish()
  }
}

impl MailboxConfig {
  /// Connection and command timeout as a [`Duration`].
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }

  /// Resolves the password from the file or from [`PASSWORD_ENV`].
  pub fn password(&self) -> Option<SecretString> {
    self
      .password
      .clone()
      .or_else(|| std::env::var(PASSWORD_ENV).ok())
      .filter(|p| !p.is_empty())
      .map(|p| SecretString::from(p.as_str()))
  }

  /// Returns the account and password, or [`PaperflowError::MissingCredentials`].
  pub fn credentials(&self) -> Result<(String, SecretString)> {
    let account = self.account.clone().filter(|a| !a.trim().is_empty());
    match (account, self.password()) {
      (Some(account), Some(password)) => Ok((account, password)),
      _ => Err(PaperflowError::MissingCredentials),
    }
  }
}

/// A web source queried in search mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
  /// arXiv full-text search page
  Arxiv,
  /// Google Scholar results page
  Scholar,
  /// Google web search restricted to PDFs
  Google,
}

impl Display for SearchSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Arxiv => write!(f, "arxiv"),
      Self::Scholar => write!(f, "scholar"),
      Self::Google => write!(f, "google"),
    }
  }
}

/// Search mode settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
  /// Links kept per source.
  pub max_results: usize,
  /// Sources queried, in order.
  pub sources:     Vec<SearchSource>,
}

impl Default for SearchConfig {
  fn default() -> Self {
    Self {
      max_results: 20,
      sources:     vec![SearchSource::Arxiv, SearchSource::Scholar, SearchSource::Google],
    }
  }
}

/// Text-generation services, one per role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
  /// Model used for classification and short summaries.
  pub simple:  Option<ModelConfig>,
  /// Model used for the structured summary document.
  pub complex: Option<ModelConfig>,
}

/// One Ollama model endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
  /// Base URL of the Ollama service.
  pub host:         String,
  /// Model name, e.g. `llama3.2:3b`.
  pub model:        String,
  /// Request timeout.
  #[serde(default = "default_llm_timeout")]
  pub timeout_secs: u64,
}

/// Generation can be slow on local hardware.
fn default_llm_timeout() -> u64 { 300 }
