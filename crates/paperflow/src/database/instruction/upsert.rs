//! Upsert instruction: update the record for a URL or create it.

use super::*;

/// Updates the record for a URL when present, inserts a new one otherwise.
///
/// The look-up and the write happen in one transaction.
pub struct Upsert {
  /// Record URL
  url:    String,
  /// Columns to write
  fields: Fields,
}

impl Upsert {
  /// Creates an upsert of `url` with `fields`.
  pub fn new(url: impl Into<String>, fields: Fields) -> Self { Self { url: url.into(), fields } }
}

#[async_trait]
impl DatabaseInstruction for Upsert {
  type Output = i64;

  async fn execute(&self, db: &mut Database) -> Result<Self::Output> {
    let url = self.url.clone();
    let fields = self.fields.clone();

    db.conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let existing: Option<i64> = tx
          .prepare_cached("SELECT id FROM AIpaper WHERE urlLink = ?1")?
          .query_row(params![url], |row| row.get(0))
          .optional()?;

        let id = match existing {
          Some(id) => {
            if !fields.is_empty() {
              update_row(&tx, id, &fields)?;
            }
            id
          },
          None => {
            let mut paper = Paper::new(url);
            paper.apply(&fields);
            insert_row(&tx, &paper)?
          },
        };
        tx.commit()?;
        Ok(id)
      })
      .await
      .map_err(PaperflowError::from)
  }
}
