//! Query instruction for reading records back out of the store.
//!
//! Queries are built from a [`QueryCriteria`] and always return a list; look-ups by URL or id
//! return at most one record.

use super::*;

/// How [`Query::list`] filters on the subject column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubjectFilter {
  /// Every record.
  #[default]
  All,
  /// Records whose subject equals the string exactly.
  Exact(String),
  /// Records whose comma-joined subject contains the string as one of its labels.
  Contains(String),
}

impl SubjectFilter {
  /// Builds a filter from optional CLI-style inputs, `exact` taking precedence.
  pub fn from_options(exact: Option<String>, contains: Option<String>) -> Self {
    match (exact, contains) {
      (Some(subject), _) => Self::Exact(subject),
      (None, Some(label)) => Self::Contains(label),
      (None, None) => Self::All,
    }
  }
}

/// Represents different ways to query papers in the database.
#[derive(Debug)]
pub enum QueryCriteria<'a> {
  /// The record with this URL
  Url(&'a str),
  /// The record with this id
  Id(i64),
  /// All records matching the subject filter
  List(SubjectFilter),
}

/// A query for retrieving papers from the database
#[derive(Debug)]
pub struct Query<'a> {
  /// What to match
  criteria: QueryCriteria<'a>,
}

impl<'a> Query<'a> {
  /// Creates a new query with the given criteria
  pub fn new(criteria: QueryCriteria<'a>) -> Self { Self { criteria } }

  /// Creates a query for the record with `url`
  pub fn by_url(url: &'a str) -> Self { Self::new(QueryCriteria::Url(url)) }

  /// Creates a query for the record with `id`
  pub fn by_id(id: i64) -> Self { Self::new(QueryCriteria::Id(id)) }

  /// Creates a listing query, most recent id first
  pub fn list(filter: SubjectFilter) -> Self { Self::new(QueryCriteria::List(filter)) }

  /// Creates a query that returns all papers
  pub fn list_all() -> Self { Self::list(SubjectFilter::All) }

  /// Builds the SQL and its single optional parameter.
  fn build_sql(&self) -> (String, Option<rusqlite::types::Value>) {
    use rusqlite::types::Value;

    let select = format!("SELECT {COLUMNS} FROM AIpaper");
    match &self.criteria {
      QueryCriteria::Url(url) =>
        (format!("{select} WHERE urlLink = ?1"), Some(Value::Text((*url).to_string()))),
      QueryCriteria::Id(id) => (format!("{select} WHERE id = ?1"), Some(Value::Integer(*id))),
      QueryCriteria::List(SubjectFilter::All) => (format!("{select} ORDER BY id DESC"), None),
      QueryCriteria::List(SubjectFilter::Exact(subject)) =>
        (format!("{select} WHERE subject = ?1 ORDER BY id DESC"), Some(Value::Text(subject.clone()))),
      QueryCriteria::List(SubjectFilter::Contains(label)) => (
        format!("{select} WHERE instr(subject, ?1) > 0 ORDER BY id DESC"),
        Some(Value::Text(label.trim().to_string())),
      ),
    }
  }
}

#[async_trait]
impl DatabaseInstruction for Query<'_> {
  type Output = Vec<Paper>;

  async fn execute(&self, db: &mut Database) -> Result<Self::Output> {
    let (sql, param) = self.build_sql();

    let mut papers = db
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&sql)?;
        let papers = stmt
          .query_map(rusqlite::params_from_iter(param), Paper::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(papers)
      })
      .await?;

    // `instr` narrows the candidates, label boundaries are checked here.
    if let QueryCriteria::List(SubjectFilter::Contains(label)) = &self.criteria {
      let label = label.trim();
      papers.retain(|paper| paper.subjects().contains(&label));
    }

    debug!(count = papers.len(), criteria = ?self.criteria, "query finished");
    Ok(papers)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[traced_test]
  #[tokio::test]
  async fn test_list_filters() {
    let dir = tempdir().unwrap();
    let mut db = Database::open(dir.path().join("papers.db")).await.unwrap();

    db.insert(&Paper::new("https://a.org/1").with_subject("fintech")).await.unwrap();
    db.insert(&Paper::new("https://a.org/2").with_subject("ai,fintech")).await.unwrap();
    db.insert(&Paper::new("https://a.org/3").with_subject("fintechnology")).await.unwrap();
    db.insert(&Paper::new("https://a.org/4")).await.unwrap();

    let all = Query::list_all().execute(&mut db).await.unwrap();
    let urls: Vec<_> = all.iter().map(|p| p.url_link.as_str()).collect();
    assert_eq!(urls, ["https://a.org/4", "https://a.org/3", "https://a.org/2", "https://a.org/1"]);

    let exact = Query::list(SubjectFilter::Exact("fintech".into())).execute(&mut db).await.unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].url_link, "https://a.org/1");

    let contains =
      Query::list(SubjectFilter::Contains("fintech".into())).execute(&mut db).await.unwrap();
    let urls: Vec<_> = contains.iter().map(|p| p.url_link.as_str()).collect();
    assert_eq!(urls, ["https://a.org/2", "https://a.org/1"]);
  }

  #[test]
  fn test_filter_from_options() {
    assert_eq!(SubjectFilter::from_options(None, None), SubjectFilter::All);
    assert_eq!(
      SubjectFilter::from_options(Some("a".into()), Some("b".into())),
      SubjectFilter::Exact("a".into())
    );
    assert_eq!(
      SubjectFilter::from_options(None, Some("b".into())),
      SubjectFilter::Contains("b".into())
    );
  }
}
