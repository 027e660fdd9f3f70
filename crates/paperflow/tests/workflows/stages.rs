use async_trait::async_trait;
use paperflow::llm::TextGenerator;

use super::*;

/// Inserts a record whose markdown file holds `content`.
async fn record_with_markdown(db: &mut Database, dir: &Path, name: &str, content: &str) -> Paper {
  let md = dir.join(format!("{name}.md"));
  std::fs::write(&md, content).unwrap();
  let mut paper = Paper::new(format!("https://a.org/{name}.pdf"));
  paper.md_link = Some(md);
  paper.id = Some(db.insert(&paper).await.unwrap());
  paper
}

/// Answers label prompts with `labels` and everything else with `summary`.
struct Scripted {
  labels:  &'static str,
  summary: &'static str,
}

#[async_trait]
impl TextGenerator for Scripted {
  async fn generate(&self, prompt: &str) -> paperflow::error::Result<String> {
    if prompt.starts_with("Choose the topic labels") {
      Ok(self.labels.to_string())
    } else {
      Ok(self.summary.to_string())
    }
  }
}

/// Conversion
mod convert {
  use super::*;

  #[traced_test]
  #[tokio::test]
  async fn test_existing_markdown_is_not_regenerated() -> TestResult<()> {
    let (mut db, _db_dir) = create_test_database().await;
    let storage = tempdir()?;
    let pdf = storage.path().join("paper.pdf");
    std::fs::write(&pdf, PDF_BODY)?;

    let mut paper = Paper::new("https://a.org/paper.pdf");
    paper.pdf_link = Some(pdf.clone());
    paper.id = Some(db.insert(&paper).await?);
    let mut papers = vec![paper];

    let extractor = CountingExtractor::new(&["DEEP HEDGING", "Body text."]);
    let converter = Converter::new().with_extractor(extractor.clone());

    let report = run_stage(&converter, &mut db, &mut papers).await?;
    assert_eq!(report.generated, 1);
    assert_eq!(extractor.calls(), 1);

    let md = storage.path().join("paper.md");
    assert_eq!(std::fs::read_to_string(&md)?, "# Deep Hedging\n\nBody text.\n");

    // A record that lost its md link still reuses the file on disk.
    papers[0].md_link = None;
    std::fs::write(&md, "edited by hand\n")?;
    let report = run_stage(&converter, &mut db, &mut papers).await?;
    assert_eq!(report.reused, 1);
    assert_eq!(extractor.calls(), 1);
    assert_eq!(std::fs::read_to_string(&md)?, "edited by hand\n");
    assert_eq!(papers[0].md_link.as_deref(), Some(md.as_path()));
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_records_without_pdf_are_skipped() -> TestResult<()> {
    let (mut db, _db_dir) = create_test_database().await;
    let mut paper = Paper::new("https://a.org/missing.pdf");
    paper.pdf_link = Some("/definitely/not/here.pdf".into());
    paper.id = Some(db.insert(&paper).await?);
    let mut papers = vec![paper];

    let extractor = CountingExtractor::new(&["text"]);
    let converter = Converter::new().with_extractor(extractor.clone());
    let report = run_stage(&converter, &mut db, &mut papers).await?;

    assert_eq!(report, StageReport { skipped: 1, ..StageReport::default() });
    assert_eq!(extractor.calls(), 0);
    Ok(())
  }
}

/// Classification
mod classify {
  use super::*;

  #[traced_test]
  #[tokio::test]
  async fn test_publish_dates() -> TestResult<()> {
    let (mut db, _db_dir) = create_test_database().await;
    let dir = tempdir()?;

    let mut papers = vec![
      record_with_markdown(&mut db, dir.path(), "full", "# Paper\nPublished 2024-03-05\n").await,
      record_with_markdown(&mut db, dir.path(), "year", "# Paper\nIn 2021 we found out.\n").await,
      record_with_markdown(&mut db, dir.path(), "none", "# Paper\nNo dates at all.\n").await,
    ];

    let report = run_stage(&Classifier::new(Vec::new()), &mut db, &mut papers).await?;
    assert_eq!(report.generated, 3);

    let times: Vec<Option<&str>> = papers.iter().map(|p| p.publish_time.as_deref()).collect();
    assert_eq!(times, [Some("2024-03-05"), Some("2021"), None]);

    let stored = db.find_by_id(papers[1].id.unwrap()).await?.unwrap();
    assert_eq!(stored.publish_time.as_deref(), Some("2021"));
    let meta: paperflow::classify::Meta = serde_json::from_str(stored.meta.as_deref().unwrap())?;
    assert_eq!(meta.title, "Paper");
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_rerun_reuses_unchanged_classification() -> TestResult<()> {
    let (mut db, _db_dir) = create_test_database().await;
    let dir = tempdir()?;
    let content = "# Paper\nPublished 2024-03-05\n";
    let mut papers = vec![record_with_markdown(&mut db, dir.path(), "again", content).await];
    let classifier = Classifier::new(Vec::new()).with_subject(Some("fintech".into()));

    let first = run_stage(&classifier, &mut db, &mut papers).await?;
    assert_eq!(first, StageReport { generated: 1, ..StageReport::default() });

    // A fresh copy of the stored record, as the next run would load it.
    let mut reloaded = vec![db.find_by_id(papers[0].id.unwrap()).await?.unwrap()];
    let second = run_stage(&classifier, &mut db, &mut reloaded).await?;
    assert_eq!(second, StageReport { reused: 1, ..StageReport::default() });
    assert_eq!(reloaded[0].meta, papers[0].meta);
    assert_eq!(reloaded[0].publish_time.as_deref(), Some("2024-03-05"));

    let relabeled = Classifier::new(Vec::new()).with_subject(Some("quant".into()));
    let third = run_stage(&relabeled, &mut db, &mut reloaded).await?;
    assert_eq!(third.generated, 1);
    assert_eq!(reloaded[0].subject.as_deref(), Some("quant"));
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_labels_from_generator() -> TestResult<()> {
    let (mut db, _db_dir) = create_test_database().await;
    let dir = tempdir()?;
    let mut papers = vec![
      record_with_markdown(&mut db, dir.path(), "labeled", "# Markets\nAbout payments.\n").await,
    ];

    let generator = Scripted { labels: "crypto, LLM\nfintech", summary: "A short summary." };
    let classifier = Classifier::new(vec!["fintech".into(), "LLM".into()])
      .with_subject(Some("fallback".into()))
      .with_generator(Some(Arc::new(generator)));
    run_stage(&classifier, &mut db, &mut papers).await?;

    let stored = db.find_by_id(papers[0].id.unwrap()).await?.unwrap();
    assert_eq!(stored.subject.as_deref(), Some("LLM,fintech"));
    assert!(stored.meta.as_deref().unwrap().contains("A short summary."));
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_subject_fallbacks() -> TestResult<()> {
    let (mut db, _db_dir) = create_test_database().await;
    let dir = tempdir()?;
    let mut kept = record_with_markdown(&mut db, dir.path(), "kept", "# A\n").await;
    kept.subject = Some("quant".into());
    db.update_fields(kept.id.unwrap(), &Fields::new().with(Field::Subject, "quant")).await?;

    let generator = Scripted { labels: "", summary: "" };
    let classifier =
      Classifier::new(vec!["fintech".into()]).with_generator(Some(Arc::new(generator)));
    let mut papers = vec![kept];
    run_stage(&classifier, &mut db, &mut papers).await?;
    assert_eq!(papers[0].subject.as_deref(), Some("quant"));

    let fixed = Classifier::new(Vec::new()).with_subject(Some("fintech".into()));
    run_stage(&fixed, &mut db, &mut papers).await?;
    assert_eq!(papers[0].subject.as_deref(), Some("fintech"));
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_missing_markdown_is_skipped() -> TestResult<()> {
    let (mut db, _db_dir) = create_test_database().await;
    let mut paper = Paper::new("https://a.org/x.pdf");
    paper.id = Some(db.insert(&paper).await?);
    let before = paper.clone();
    let mut papers = vec![paper];

    let report = run_stage(&Classifier::default(), &mut db, &mut papers).await?;
    assert_eq!(report, StageReport { skipped: 1, ..StageReport::default() });
    assert_eq!(papers[0], before);
    Ok(())
  }
}

/// Summaries
mod summarize {
  use super::*;

  #[traced_test]
  #[tokio::test]
  async fn test_heuristic_summary_written_once() -> TestResult<()> {
    let (mut db, _db_dir) = create_test_database().await;
    let dir = tempdir()?;
    let mut papers =
      vec![record_with_markdown(&mut db, dir.path(), "paper", "# Deep Hedging\nLine one.\n").await];

    let report = run_stage(&Summarizer::new(), &mut db, &mut papers).await?;
    assert_eq!(report.generated, 1);

    let target = dir.path().join("paper.summary.md");
    assert_eq!(std::fs::read_to_string(&target)?, "主题：Deep Hedging\n摘要：\nLine one.\n");
    assert_eq!(papers[0].summary_link.as_deref(), Some(target.as_path()));

    let generator = Scripted { labels: "", summary: "## 标题\nnew" };
    let summarizer = Summarizer::new().with_generator(Some(Arc::new(generator)));
    let report = run_stage(&summarizer, &mut db, &mut papers).await?;
    assert_eq!(report.reused, 1);
    assert!(std::fs::read_to_string(&target)?.starts_with("主题："));
    Ok(())
  }
}
