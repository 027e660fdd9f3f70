//! The paper record and typed partial updates.
//!
//! A [`Paper`] mirrors one row of the `AIpaper` table. Stages never write whole rows back;
//! they describe the columns they changed with a [`Fields`] map, which the store merges into
//! the existing row. Column names come exclusively from [`Field::column`], so nothing user
//! supplied is ever interpolated into SQL.
//!
//! # Examples
//!
//! ```
//! use paperflow::record::{Field, Fields, Paper, Lifecycle};
//!
//! let mut paper = Paper::new("https://arxiv.org/pdf/2401.01234.pdf").with_subject("fintech");
//! assert_eq!(paper.stage(), Lifecycle::Discovered);
//!
//! let fields = Fields::new().with(Field::PublishTime, "2024-03-05");
//! paper.apply(&fields);
//! assert_eq!(paper.publish_time.as_deref(), Some("2024-03-05"));
//! ```

use std::collections::BTreeMap;

use super::*;

/// Comma-like separators accepted between labels of a multi-label subject.
const LABEL_SEPARATORS: [char; 3] = [',', '，', '\n'];

/// A tracked paper.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Paper {
  /// Store assigned id, absent until the record is first persisted.
  pub id:           Option<i64>,
  /// Canonical source URL. Unique across the store.
  pub url_link:     String,
  /// Downloaded PDF.
  pub pdf_link:     Option<PathBuf>,
  /// Markdown rendering of the PDF.
  pub md_link:      Option<PathBuf>,
  /// Summary document.
  pub summary_link: Option<PathBuf>,
  /// Serialized [`Meta`](crate::classify::Meta).
  pub meta:         Option<String>,
  /// `YYYY-MM-DD` or `YYYY`.
  pub publish_time: Option<String>,
  /// Topic label or comma-joined labels.
  pub subject:      Option<String>,
}

/// Lifecycle stage derived from which artifacts exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Lifecycle {
  /// Only the URL is known.
  Discovered,
  /// A PDF is on disk.
  PdfAcquired,
  /// The Markdown rendering is on disk.
  Converted,
  /// Metadata has been extracted.
  Classified,
  /// The summary document is on disk.
  Summarized,
}

impl Display for Lifecycle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Self::Discovered => "discovered",
      Self::PdfAcquired => "pdf acquired",
      Self::Converted => "converted",
      Self::Classified => "classified",
      Self::Summarized => "summarized",
    };
    write!(f, "{name}")
  }
}

/// Returns true when the optional path points at an existing file.
fn exists(path: &Option<PathBuf>) -> bool { path.as_ref().is_some_and(|p| p.is_file()) }

impl Paper {
  /// Creates an unsaved record for `url`.
  pub fn new(url: impl Into<String>) -> Self { Self { url_link: url.into(), ..Self::default() } }

  /// Sets the subject.
  pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
    self.subject = Some(subject.into());
    self
  }

  /// True when `pdf_link` is set and the file exists.
  pub fn has_pdf(&self) -> bool { exists(&self.pdf_link) }

  /// True when `md_link` is set and the file exists.
  pub fn has_markdown(&self) -> bool { exists(&self.md_link) }

  /// True when `summary_link` is set and the file exists.
  pub fn has_summary(&self) -> bool { exists(&self.summary_link) }

  /// Reports the furthest lifecycle stage this record has reached.
  ///
  /// File-backed stages only count when the file is still on disk, so a record whose PDF was
  /// deleted reports [`Lifecycle::Discovered`] again and will be re-acquired.
  pub fn stage(&self) -> Lifecycle {
    if !self.has_pdf() {
      Lifecycle::Discovered
    } else if !self.has_markdown() {
      Lifecycle::PdfAcquired
    } else if self.has_summary() {
      Lifecycle::Summarized
    } else if self.meta.is_some() {
      Lifecycle::Classified
    } else {
      Lifecycle::Converted
    }
  }

  /// Individual labels of the subject, trimmed and without empties.
  pub fn subjects(&self) -> Vec<&str> {
    self
      .subject
      .as_deref()
      .map(|s| s.split(LABEL_SEPARATORS).map(str::trim).filter(|l| !l.is_empty()).collect())
      .unwrap_or_default()
  }

  /// Merges a partial update into this record.
  pub fn apply(&mut self, fields: &Fields) {
    for (field, value) in fields.iter() {
      let value = value.clone();
      match field {
        Field::PdfLink => self.pdf_link = value.map(PathBuf::from),
        Field::MdLink => self.md_link = value.map(PathBuf::from),
        Field::SummaryLink => self.summary_link = value.map(PathBuf::from),
        Field::Meta => self.meta = value,
        Field::PublishTime => self.publish_time = value,
        Field::Subject => self.subject = value,
      }
    }
  }

  /// Builds a record from a row selected with [`COLUMNS`](crate::database::COLUMNS).
  pub(crate) fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           Some(row.get(0)?),
      url_link:     row.get(1)?,
      pdf_link:     row.get::<_, Option<String>>(2)?.map(PathBuf::from),
      md_link:      row.get::<_, Option<String>>(3)?.map(PathBuf::from),
      summary_link: row.get::<_, Option<String>>(4)?.map(PathBuf::from),
      meta:         row.get(5)?,
      publish_time: row.get(6)?,
      subject:      row.get(7)?,
    })
  }
}

/// A mutable column of the `AIpaper` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
  /// `pdfLink`
  PdfLink,
  /// `mdLink`
  MdLink,
  /// `summaryLink`
  SummaryLink,
  /// `meta`
  Meta,
  /// `publishTime`
  PublishTime,
  /// `subject`
  Subject,
}

impl Field {
  /// The SQL column name.
  pub fn column(self) -> &'static str {
    match self {
      Self::PdfLink => "pdfLink",
      Self::MdLink => "mdLink",
      Self::SummaryLink => "summaryLink",
      Self::Meta => "meta",
      Self::PublishTime => "publishTime",
      Self::Subject => "subject",
    }
  }
}

/// A typed partial update: the columns to change and their new values.
///
/// A `None` value clears the column. Setting the same field twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<Field, Option<String>>);

impl Fields {
  /// Creates an empty update.
  pub fn new() -> Self { Self::default() }

  /// Sets `field` to `value`.
  pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
    self.0.insert(field, Some(value.into()));
    self
  }

  /// Sets `field` to the display form of `path`.
  pub fn with_path(self, field: Field, path: &Path) -> Self {
    self.with(field, path.to_string_lossy())
  }

  /// Sets `field` to `value` when it is present, leaves the update untouched otherwise.
  pub fn with_opt(self, field: Field, value: Option<impl Into<String>>) -> Self {
    match value {
      Some(value) => self.with(field, value),
      None => self,
    }
  }

  /// Clears `field`.
  pub fn clear(mut self, field: Field) -> Self {
    self.0.insert(field, None);
    self
  }

  /// True when nothing would change.
  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// Number of columns touched.
  pub fn len(&self) -> usize { self.0.len() }

  /// Iterates in column order.
  pub fn iter(&self) -> impl Iterator<Item = (&Field, &Option<String>)> { self.0.iter() }
}
