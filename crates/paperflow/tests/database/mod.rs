use super::*;

/// Record store behaviour through the public instructions
mod store {
  use super::*;

  #[traced_test]
  #[tokio::test]
  async fn test_records_survive_reopen() -> TestResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("nested").join("papers.db");

    let id = {
      let mut db = Database::open(&path).await?;
      Add::new(Paper::new("https://a.org/x.pdf").with_subject("fintech")).execute(&mut db).await?
    };

    let mut db = Database::open(&path).await?;
    let stored = db.find_by_id(id).await?.expect("record should persist");
    assert_eq!(stored.url_link, "https://a.org/x.pdf");
    assert_eq!(stored.subject.as_deref(), Some("fintech"));
    assert_eq!(stored.stage(), Lifecycle::Discovered);
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_partial_update_leaves_other_columns() -> TestResult<()> {
    let (mut db, _dir) = create_test_database().await;
    let id = db.insert(&Paper::new("https://a.org/x.pdf")).await?;

    let full = Fields::new()
      .with(Field::PdfLink, "/papers/x.pdf")
      .with(Field::MdLink, "/papers/x.md")
      .with(Field::SummaryLink, "/papers/x.summary.md")
      .with(Field::Meta, "{}")
      .with(Field::PublishTime, "2024");
    Update::new(id, full).execute(&mut db).await?;
    Update::new(id, Fields::new().with(Field::Subject, "quant")).execute(&mut db).await?;

    let stored = db.find_by_id(id).await?.unwrap();
    assert_eq!(stored.subject.as_deref(), Some("quant"));
    assert_eq!(stored.pdf_link.as_deref(), Some(Path::new("/papers/x.pdf")));
    assert_eq!(stored.md_link.as_deref(), Some(Path::new("/papers/x.md")));
    assert_eq!(stored.summary_link.as_deref(), Some(Path::new("/papers/x.summary.md")));
    assert_eq!(stored.meta.as_deref(), Some("{}"));
    assert_eq!(stored.publish_time.as_deref(), Some("2024"));
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_duplicate_add_is_rejected() -> TestResult<()> {
    let (mut db, _dir) = create_test_database().await;
    Add::new(Paper::new("https://a.org/x.pdf")).execute(&mut db).await?;

    let err = Add::new(Paper::new("https://a.org/x.pdf")).execute(&mut db).await.unwrap_err();
    assert!(matches!(err, PaperflowError::DuplicateUrl(_)));
    assert_eq!(Query::list_all().execute(&mut db).await?.len(), 1);
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_upsert_then_remove() -> TestResult<()> {
    let (mut db, _dir) = create_test_database().await;
    let fields = Fields::new().with(Field::Subject, "fintech");

    let id = Upsert::new("https://a.org/x.pdf", fields.clone()).execute(&mut db).await?;
    let again = Upsert::new("https://a.org/x.pdf", fields).execute(&mut db).await?;
    assert_eq!(id, again);

    Remove::by_id(id).dry_run().execute(&mut db).await?;
    assert!(db.find_by_id(id).await?.is_some());

    Remove::by_id(id).execute(&mut db).await?;
    assert!(db.find_by_id(id).await?.is_none());
    assert!(matches!(db.delete(id).await, Err(PaperflowError::NotFound(_))));
    Ok(())
  }
}

/// Subject filters, including comma-joined multi-label subjects
mod subject_filter {
  use super::*;

  async fn seeded() -> (Database, TempDir) {
    let (mut db, dir) = create_test_database().await;
    for (url, subject) in [
      ("https://a.org/1.pdf", "fintech"),
      ("https://a.org/2.pdf", "fintech,LLM"),
      ("https://a.org/3.pdf", "quant"),
      ("https://a.org/4.pdf", "fintechs"),
    ] {
      db.insert(&Paper::new(url).with_subject(subject)).await.unwrap();
    }
    db.insert(&Paper::new("https://a.org/5.pdf")).await.unwrap();
    (db, dir)
  }

  fn urls(papers: &[Paper]) -> Vec<&str> { papers.iter().map(|p| p.url_link.as_str()).collect() }

  #[traced_test]
  #[tokio::test]
  async fn test_exact_match() -> TestResult<()> {
    let (mut db, _dir) = seeded().await;
    let papers = db.list(SubjectFilter::Exact("fintech".into())).await?;
    assert_eq!(urls(&papers), ["https://a.org/1.pdf"]);
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_membership_match() -> TestResult<()> {
    let (mut db, _dir) = seeded().await;
    let papers = db.list(SubjectFilter::Contains("fintech".into())).await?;
    assert_eq!(urls(&papers), ["https://a.org/2.pdf", "https://a.org/1.pdf"]);

    let papers = db.list(SubjectFilter::Contains("LLM".into())).await?;
    assert_eq!(urls(&papers), ["https://a.org/2.pdf"]);
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_list_all_newest_first() -> TestResult<()> {
    let (mut db, _dir) = seeded().await;
    let papers = db.list(SubjectFilter::All).await?;
    assert_eq!(papers.len(), 5);
    assert_eq!(papers[0].url_link, "https://a.org/5.pdf");
    Ok(())
  }
}

/// Harvesting into the store
mod harvest {
  use super::*;

  #[traced_test]
  #[tokio::test]
  async fn test_harvest_is_idempotent() -> TestResult<()> {
    let (mut db, _dir) = create_test_database().await;
    let texts = vec!["https://a.org/x.pdf https://a.org/y.pdf".to_string()];

    let first = Harvester::new().from_texts(&mut db, &texts, None).await?;
    let second = Harvester::new().from_texts(&mut db, &texts, None).await?;

    assert_eq!(first.len(), 2);
    for (a, b) in first.iter().zip(&second) {
      assert_eq!(a.id, b.id);
      let found = db.find_by_url(&a.url_link).await?.unwrap();
      assert_eq!(found.id, a.id);
    }
    assert_eq!(db.list(SubjectFilter::All).await?.len(), 2);
    Ok(())
  }
}
