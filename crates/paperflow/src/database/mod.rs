//! Local SQLite store for paper records.
//!
//! The store is a single `AIpaper` table keyed by an autoincrement id with a unique index on
//! the source URL. All reads and writes go through [`DatabaseInstruction`]s executed against
//! a [`Database`]; the convenience methods on [`Database`] are thin wrappers over them.
//!
//! Every instruction commits before it returns and storage errors are propagated unchanged.
//!
//! # Examples
//!
//! ```no_run
//! use paperflow::{
//!   database::{Database, SubjectFilter},
//!   record::{Field, Fields, Paper},
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut db = Database::open("papers.db").await?;
//!
//! let id = db.insert(&Paper::new("https://arxiv.org/abs/2401.01234")).await?;
//! db.update_fields(id, &Fields::new().with(Field::Subject, "fintech")).await?;
//!
//! for paper in db.list(SubjectFilter::Contains("fintech".into())).await? {
//!   println!("{:?} {}", paper.id, paper.url_link);
//! }
//! # Ok(())
//! # }
//! ```

use tokio_rusqlite::Connection;

use super::*;

pub mod instruction;

pub use self::instruction::*;

/// Column list matching [`Paper::from_row`].
pub(crate) const COLUMNS: &str =
  "id, urlLink, pdfLink, mdLink, summaryLink, meta, publishTime, subject";

/// Handle for interacting with the paper store.
///
/// Wraps an async SQLite connection. The schema is created on open when absent.
pub struct Database {
  /// Async SQLite connection handle
  pub conn: Connection,
}

impl Database {
  /// Opens an existing database or creates a new one at the specified path.
  ///
  /// The parent directory is created if needed and the schema from `migrations/init.sql` is
  /// applied idempotently.
  ///
  /// # Examples
  ///
  /// ```no_run
  /// # use paperflow::database::Database;
  /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
  /// let db = Database::open(Database::default_path()).await?;
  /// # Ok(())
  /// # }
  /// ```
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }

    debug!("Opening database at {}", path.display());
    let conn = Connection::open(path).await?;
    conn
      .call(|conn| {
        conn.execute_batch(include_str!(concat!(
          env!("CARGO_MANIFEST_DIR"),
          "/migrations/init.sql"
        )))?;
        Ok(())
      })
      .await?;

    Ok(Self { conn })
  }

  /// Returns the default path for the database file.
  ///
  /// - On Unix: `~/.local/share/paperflow/papers.db`
  /// - On macOS: `~/Library/Application Support/paperflow/papers.db`
  /// - On Windows: `%APPDATA%\paperflow\papers.db`
  /// - Fallback: `./paperflow/papers.db`
  pub fn default_path() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("paperflow").join("papers.db")
  }

  /// Returns the default directory for downloaded PDFs and their derived documents.
  ///
  /// - On Unix and macOS: `~/Documents/paperflow/papers`
  /// - On Windows: `Documents\paperflow\papers`
  /// - Fallback: `./paperflow/papers`
  pub fn default_storage_path() -> PathBuf {
    dirs::document_dir().unwrap_or_else(|| PathBuf::from(".")).join("paperflow").join("papers")
  }

  /// Inserts a new record and returns its id.
  pub async fn insert(&mut self, paper: &Paper) -> Result<i64> {
    Add::new(paper.clone()).execute(self).await
  }

  /// Merges `fields` into the record with `id`.
  pub async fn update_fields(&mut self, id: i64, fields: &Fields) -> Result<()> {
    Update::new(id, fields.clone()).execute(self).await
  }

  /// Deletes the record with `id`.
  pub async fn delete(&mut self, id: i64) -> Result<()> { Remove::by_id(id).execute(self).await }

  /// Looks a record up by its URL.
  pub async fn find_by_url(&mut self, url: &str) -> Result<Option<Paper>> {
    Ok(Query::by_url(url).execute(self).await?.into_iter().next())
  }

  /// Looks a record up by its id.
  pub async fn find_by_id(&mut self, id: i64) -> Result<Option<Paper>> {
    Ok(Query::by_id(id).execute(self).await?.into_iter().next())
  }

  /// Lists records, most recent id first.
  pub async fn list(&mut self, filter: SubjectFilter) -> Result<Vec<Paper>> {
    Query::list(filter).execute(self).await
  }

  /// Updates the record for `url` when it exists, inserts it otherwise. Returns the id.
  pub async fn upsert_by_url(&mut self, url: &str, fields: &Fields) -> Result<i64> {
    Upsert::new(url, fields.clone()).execute(self).await
  }
}
