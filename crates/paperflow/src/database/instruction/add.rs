//! Add instruction for inserting new records.
//!
//! Insertion refuses URLs that are already stored; callers that want "reuse or create"
//! semantics should look the URL up first or use [`Upsert`](super::Upsert).

use super::*;

/// Inserts a new paper record.
pub struct Add {
  /// The record to insert. Its `id` is ignored.
  paper: Paper,
}

impl Add {
  /// Creates an insert instruction for `paper`.
  pub fn new(paper: Paper) -> Self { Self { paper } }
}

#[async_trait]
impl DatabaseInstruction for Add {
  type Output = i64;

  async fn execute(&self, db: &mut Database) -> Result<Self::Output> {
    let paper = self.paper.clone();
    let url = paper.url_link.clone();

    let id = db
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists = tx
          .prepare_cached("SELECT 1 FROM AIpaper WHERE urlLink = ?1")?
          .exists(params![paper.url_link])?;
        if exists {
          return Ok(None);
        }
        let id = insert_row(&tx, &paper)?;
        tx.commit()?;
        Ok(Some(id))
      })
      .await?;

    match id {
      Some(id) => {
        trace!(id, url = %url, "inserted record");
        Ok(id)
      },
      None => Err(PaperflowError::DuplicateUrl(url)),
    }
  }
}
