//! Update instruction for partial merges into an existing record.

use super::*;

/// Merges a [`Fields`] map into the record with the given id.
///
/// Columns not named in the map are left untouched. An empty map is a no-op that does not even
/// check the id exists.
pub struct Update {
  /// Target record id
  id:     i64,
  /// Columns to write
  fields: Fields,
}

impl Update {
  /// Creates an update of `id` with `fields`.
  pub fn new(id: i64, fields: Fields) -> Self { Self { id, fields } }
}

#[async_trait]
impl DatabaseInstruction for Update {
  type Output = ();

  async fn execute(&self, db: &mut Database) -> Result<Self::Output> {
    if self.fields.is_empty() {
      return Ok(());
    }

    let id = self.id;
    let fields = self.fields.clone();
    let changed = db.conn.call(move |conn| Ok(update_row(conn, id, &fields)?)).await?;

    if changed == 0 {
      return Err(PaperflowError::NotFound(id));
    }
    trace!(id, columns = self.fields.len(), "updated record");
    Ok(())
  }
}
