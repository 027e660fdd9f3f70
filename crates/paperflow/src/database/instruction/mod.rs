//! Database instruction implementations.
//!
//! Each operation on the store is a small command object implementing
//! [`DatabaseInstruction`]: [`Add`], [`Update`], [`Upsert`], [`Remove`] and [`Query`].
//! Instructions borrow the database mutably for the duration of their execution.

use rusqlite::{params, OptionalExtension};

use super::*;

pub mod add;
pub mod query;
pub mod remove;
pub mod update;
pub mod upsert;

pub use self::{add::Add, query::*, remove::Remove, update::Update, upsert::Upsert};

/// A single operation against the record store.
#[async_trait]
pub trait DatabaseInstruction {
  /// The value produced by the instruction.
  type Output;

  /// Runs the instruction against `db`.
  // Take &mut reference to avoid taking ownership and allow multiple operations
  async fn execute(&self, db: &mut Database) -> Result<Self::Output>;
}

/// Inserts `paper` and returns the new id.
pub(crate) fn insert_row(conn: &rusqlite::Connection, paper: &Paper) -> rusqlite::Result<i64> {
  let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.to_string_lossy().into_owned());
  conn.prepare_cached(
    "INSERT INTO AIpaper (urlLink, pdfLink, mdLink, summaryLink, meta, publishTime, subject)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
     RETURNING id",
  )?
  .query_row(
    params![
      paper.url_link,
      path(&paper.pdf_link),
      path(&paper.md_link),
      path(&paper.summary_link),
      paper.meta,
      paper.publish_time,
      paper.subject,
    ],
    |row| row.get(0),
  )
}

/// Applies `fields` to the row with `id` and returns the number of rows changed.
pub(crate) fn update_row(
  conn: &rusqlite::Connection,
  id: i64,
  fields: &Fields,
) -> rusqlite::Result<usize> {
  let assignments = fields
    .iter()
    .enumerate()
    .map(|(i, (field, _))| format!("{} = ?{}", field.column(), i + 1))
    .collect::<Vec<_>>()
    .join(", ");
  let sql = format!("UPDATE AIpaper SET {assignments} WHERE id = ?{}", fields.len() + 1);

  let mut values: Vec<rusqlite::types::Value> = fields
    .iter()
    .map(|(_, value)| match value {
      Some(v) => rusqlite::types::Value::Text(v.clone()),
      None => rusqlite::types::Value::Null,
    })
    .collect();
  values.push(rusqlite::types::Value::Integer(id));

  conn.prepare_cached(&sql)?.execute(rusqlite::params_from_iter(values))
}
