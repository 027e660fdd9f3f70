//! Text generation backed by a locally running Ollama service.
//!
//! Two layers live here:
//! - [`LlamaRequest`], a small builder around Ollama's `/api/chat` endpoint,
//! - [`TextGenerator`], the capability the classifier and summarizer consume, with
//!   [`OllamaGenerator`] as its implementation.
//!
//! Stages hold an `Option<Arc<dyn TextGenerator>>`; when it is absent or a request fails they
//! fall back to heuristics, so an unreachable model never stops the pipeline.
//!
//! # Examples
//!
//! ```no_run
//! use paperflow::llm::{LlamaRequest, Model};
//!
//! # async fn labels() -> Result<(), paperflow::error::PaperflowError> {
//! let reply = LlamaRequest::new()
//!   .with_host("http://localhost:11434")
//!   .with_model(Model::new("llama3.2:3b"))
//!   .with_message("Which of fintech, quant, llm describes deep hedging?")
//!   .send(&reqwest::Client::new())
//!   .await?;
//! println!("labels: {}", reply.message.content);
//! # Ok(())
//! # }
//! ```

use super::*;
use crate::config::ModelConfig;

/// Path of the chat endpoint relative to the host.
const CHAT_ENDPOINT: &str = "api/chat";

/// Fallback host when none was configured.
const DEFAULT_HOST: &str = "http://localhost:11434";

/// Prompt for the structured summary document.
const STRUCTURED_PROMPT: &str = "请阅读以下论文内容，用中文输出结构化总结（标题/关键词/研究问题/方法/\
                                 创新点/结论），以 Markdown 形式输出：\n\n";

/// Prompt for the short summary stored in the metadata.
const BRIEF_PROMPT: &str = "Summarize the following paper excerpt in plain prose of at most 500 \
                            characters. Reply with the summary only.\n\n";

/// Characters of the source text sent with a brief summary or classification prompt. The
/// structured summary always receives the whole document.
const MAX_PROMPT_CHARS: usize = 12_000;

/// An Ollama model name such as `llama3.2:3b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Model(String);

impl Model {
  /// Wraps a model name.
  pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }
}

impl Display for Model {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

/// One non-streaming call to an Ollama `/api/chat` endpoint.
///
/// # Examples
///
/// ```no_run
/// # use paperflow::llm::{LlamaRequest, Model};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let request = LlamaRequest::new()
///   .with_model(Model::new("llama3.2:3b"))
///   .with_system("You are a careful research assistant.")
///   .with_message("Explain how a computer works");
///
/// let response = request.send(&reqwest::Client::new()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Serialize, Default)]
pub struct LlamaRequest {
  /// Model to run; [`send`](LlamaRequest::send) refuses a request without one.
  pub model: Option<Model>,

  /// System prompt followed by the user prompt. Empty requests are refused.
  pub messages: Vec<Message>,

  /// Always false: responses are read in one piece.
  pub stream: bool,

  /// Generation parameters.
  pub options: Options,

  /// The chat endpoint URL. Defaults to localhost:11434 with a warning. Skipped during
  /// serialization.
  #[serde(skip)]
  pub url: Option<Url>,
}

/// One chat turn.
///
/// ```
/// use paperflow::llm::Message;
///
/// let turn = Message { role: "system".into(), content: "Answer in Chinese.".into() };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  /// `system`, `user` or `assistant`.
  pub role:    String,
  /// The message text.
  pub content: String,
}

/// Sampling settings sent with every request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Options {
  /// Token budget of the reply; a structured summary fits well below it
  num_predict: u64,
  /// Candidates kept per step
  top_k:       u64,
  /// Probability mass kept per step
  top_p:       f64,
  /// Kept low so labels and summaries stay close to the source text
  temperature: f64,
}

impl Default for Options {
  fn default() -> Self { Self { num_predict: 4096, top_k: 50, top_p: 0.95, temperature: 0.3 } }
}

/// Response structure from Ollama chat requests.
///
/// Only the message is required; the timing fields vary between Ollama versions.
#[derive(Debug, Serialize, Deserialize)]
pub struct LlamaResponse {
  /// Model that answered
  #[serde(default)]
  pub model:       String,
  /// The assistant turn
  pub message:     Message,
  /// False only for partial replies, which are never requested
  #[serde(default)]
  pub done:        bool,
  /// `stop` or `length`; the latter means `num_predict` cut the reply short
  #[serde(default)]
  pub done_reason: Option<String>,
  /// Tokens in the reply
  #[serde(default)]
  pub eval_count:  Option<u64>,
}

impl LlamaRequest {
  /// An empty request with the default sampling options.
  pub fn new() -> Self { Self::default() }

  /// Sets the host of the Ollama service. The chat endpoint is appended.
  pub fn with_host(mut self, host: &str) -> Self {
    let base = if host.ends_with('/') { host.to_string() } else { format!("{host}/") };
    self.url = Url::parse(&base).and_then(|base| base.join(CHAT_ENDPOINT)).ok();
    if self.url.is_none() {
      warn!("Invalid host {host:?}, falling back to localhost");
    }
    self
  }

  /// Chooses the model.
  pub fn with_model(mut self, model: Model) -> Self {
    self.model.replace(model);
    self
  }

  /// Adds a system message.
  pub fn with_system(mut self, content: &str) -> Self {
    self.messages.push(Message { role: "system".to_string(), content: content.to_string() });
    self
  }

  /// Adds a user message to the conversation.
  pub fn with_message(mut self, content: &str) -> Self {
    self.messages.push(Message { role: "user".to_string(), content: content.to_string() });
    self
  }

  /// Sends the request with `client`.
  ///
  /// # Errors
  ///
  /// [`PaperflowError::LLMMissingModel`] or [`PaperflowError::LLMMissingMessage`] for an
  /// incomplete request, [`PaperflowError::Network`] when the service is unreachable, answers
  /// with an error status or replies with something other than a chat response.
  pub async fn send(&self, client: &reqwest::Client) -> Result<LlamaResponse> {
    let url = match &self.url {
      Some(url) => url.clone(),
      None => {
        warn!("No host set, using localhost");
        Url::parse(DEFAULT_HOST)?.join(CHAT_ENDPOINT)?
      },
    };

    if self.model.is_none() {
      return Err(PaperflowError::LLMMissingModel);
    }

    if self.messages.is_empty() {
      return Err(PaperflowError::LLMMissingMessage);
    }

    trace!(%url, model = ?self.model, "sending chat request");
    let response = client.post(url).json(&self).send().await?.error_for_status()?;
    let llama_response: LlamaResponse = response.json().await?;
    Ok(llama_response)
  }
}

/// The flavour of summary requested from a [`TextGenerator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStyle {
  /// Short prose, roughly 500 characters, stored in the metadata.
  Brief,
  /// Structured Chinese Markdown (标题/关键词/研究问题/方法/创新点/结论) for the summary document.
  Structured,
}

/// A text-generation capability.
///
/// Only [`generate`](TextGenerator::generate) must be provided; the task methods build their
/// prompts on top of it.
#[async_trait]
pub trait TextGenerator: Send + Sync {
  /// Completes a single prompt.
  async fn generate(&self, prompt: &str) -> Result<String>;

  /// Summarizes `text` in the requested style. The result is trimmed.
  ///
  /// [`SummaryStyle::Structured`] sends the full text; [`SummaryStyle::Brief`] only its first
  /// characters.
  async fn summarize(&self, text: &str, style: SummaryStyle) -> Result<String> {
    let (prompt, body) = match style {
      SummaryStyle::Brief => (BRIEF_PROMPT, truncate_chars(text, MAX_PROMPT_CHARS)),
      SummaryStyle::Structured => (STRUCTURED_PROMPT, text),
    };
    let response = self.generate(&format!("{prompt}{body}")).await?;
    Ok(response.trim().to_string())
  }

  /// Picks the labels from `pool` that describe `text`.
  async fn classify(&self, text: &str, pool: &[String]) -> Result<Vec<String>> {
    if pool.is_empty() {
      return Ok(Vec::new());
    }
    let prompt = format!(
      "Choose the topic labels that apply to the paper excerpt below from this list: {}.\nAnswer \
       with the chosen labels separated by commas and nothing else. Answer with an empty line if \
       none apply.\n\n{}",
      pool.join(", "),
      truncate_chars(text, MAX_PROMPT_CHARS)
    );
    Ok(parse_labels(&self.generate(&prompt).await?, pool))
  }
}

/// Keeps the labels of a model response that belong to `pool`, in response order and without
/// repeats. Matching ignores case and surrounding quotes or bullets; the pool's spelling wins.
pub fn parse_labels(response: &str, pool: &[String]) -> Vec<String> {
  let mut labels: Vec<String> = Vec::new();
  for candidate in response.split([',', '，', '\n', ';', '；']) {
    let candidate = candidate.trim().trim_matches(|c: char| "\"'`*-•. ".contains(c));
    if candidate.is_empty() {
      continue;
    }
    if let Some(label) = pool.iter().find(|l| l.trim().eq_ignore_ascii_case(candidate)) {
      if !labels.contains(label) {
        labels.push(label.clone());
      }
    }
  }
  labels
}

/// The first `max` characters of `text`.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
  match text.char_indices().nth(max) {
    Some((idx, _)) => &text[..idx],
    None => text,
  }
}

/// [`TextGenerator`] talking to an Ollama chat endpoint.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
  /// HTTP client carrying the generation timeout
  client: reqwest::Client,
  /// Service host
  host:   String,
  /// Model to run
  model:  Model,
}

impl OllamaGenerator {
  /// Builds a generator from a model entry of the configuration.
  pub fn new(config: &ModelConfig) -> Result<Self> {
    let client =
      reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
    Ok(Self { client, host: config.host.clone(), model: Model::new(config.model.clone()) })
  }

  /// Builds the generator for an optional model entry.
  pub fn from_config(config: Option<&ModelConfig>) -> Result<Option<Arc<dyn TextGenerator>>> {
    match config {
      Some(config) => Ok(Some(Arc::new(Self::new(config)?))),
      None => Ok(None),
    }
  }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
  async fn generate(&self, prompt: &str) -> Result<String> {
    let response = LlamaRequest::new()
      .with_host(&self.host)
      .with_model(self.model.clone())
      .with_message(prompt)
      .send(&self.client)
      .await?;
    debug!(model = %self.model, tokens = ?response.eval_count, "generation finished");
    Ok(response.message.content)
  }
}
