//! Remove instruction for administrative deletion of records.
//!
//! The pipeline itself never deletes records. Removal only drops the row; files referenced
//! by the record stay on disk.

use super::*;

/// Deletes a record by id.
pub struct Remove {
  /// Target record id
  id:      i64,
  /// When true, only checks that the record exists
  dry_run: bool,
}

impl Remove {
  /// Creates a remove instruction for `id`.
  pub fn by_id(id: i64) -> Self { Self { id, dry_run: false } }

  /// Only checks that the record exists without deleting it.
  pub fn dry_run(mut self) -> Self {
    self.dry_run = true;
    self
  }
}

#[async_trait]
impl DatabaseInstruction for Remove {
  type Output = ();

  async fn execute(&self, db: &mut Database) -> Result<Self::Output> {
    let id = self.id;
    let dry_run = self.dry_run;

    let affected = db
      .conn
      .call(move |conn| {
        let affected = if dry_run {
          conn.prepare_cached("SELECT 1 FROM AIpaper WHERE id = ?1")?.exists(params![id])? as usize
        } else {
          conn.prepare_cached("DELETE FROM AIpaper WHERE id = ?1")?.execute(params![id])?
        };
        Ok(affected)
      })
      .await?;

    if affected == 0 {
      return Err(PaperflowError::NotFound(id));
    }
    if !dry_run {
      info!(id, "removed record");
    }
    Ok(())
  }
}
