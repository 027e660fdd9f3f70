use mockito::{Mock, Server, ServerGuard};

use super::*;

/// Serves an abstract page linking to a PDF, and the PDF itself. The mocks live as long as the
/// returned handles.
async fn arxiv_like_server() -> (ServerGuard, Vec<Mock>) {
  let mut server = Server::new_async().await;
  let page = server
    .mock("GET", "/abs/2401.01234")
    .with_status(200)
    .with_header("content-type", "text/html")
    .with_body(r#"<html><a href="/pdf/2401.01234.pdf">Download PDF</a></html>"#)
    .create_async()
    .await;
  let head = server
    .mock("HEAD", "/pdf/2401.01234.pdf")
    .with_status(200)
    .with_header("content-type", "application/pdf")
    .create_async()
    .await;
  let pdf = server
    .mock("GET", "/pdf/2401.01234.pdf")
    .with_status(200)
    .with_header("content-type", "application/pdf")
    .with_body(PDF_BODY)
    .create_async()
    .await;
  (server, vec![page, head, pdf])
}

const PAGES: &[&str] =
  &["Deep Hedging", "Keywords: hedging, fintech\nPublished 2024-03-05\nWe study."];

#[traced_test]
#[tokio::test]
async fn test_text_run_processes_every_url() -> TestResult<()> {
  let (server, _mocks) = arxiv_like_server().await;
  let dir = tempdir()?;
  let mut db = Database::open(dir.path().join("papers.db")).await?;

  let extractor = CountingExtractor::new(PAGES);
  let pipeline = Pipeline::new(test_config(dir.path()))?
    .with_converter(Converter::new().with_extractor(extractor.clone()));

  let abs = format!("{}/abs/2401.01234", server.url());
  let pdf = format!("{}/pdf/2401.01234.pdf", server.url());
  let texts = vec![format!("See {abs} and {pdf}")];

  let (papers, report) = pipeline.run_texts(&mut db, &texts, Some("fintech")).await?;

  assert_eq!(report.harvested, 2);
  let urls: Vec<&str> = papers.iter().map(|p| p.url_link.as_str()).collect();
  assert_eq!(urls, [abs.as_str(), pdf.as_str()]);
  for stage in ["acquire", "convert", "classify", "summarize"] {
    assert_eq!(report.stage(stage).unwrap().generated, 2, "stage {stage}");
  }

  let storage = dir.path().join("papers");
  assert_eq!(papers[0].pdf_link.as_deref(), Some(storage.join("2401.01234.pdf").as_path()));
  assert_eq!(papers[1].pdf_link.as_deref(), Some(storage.join("2401.01234_2.pdf").as_path()));

  for paper in &papers {
    assert_eq!(paper.stage(), Lifecycle::Summarized);
    let stored = db.find_by_url(&paper.url_link).await?.unwrap();
    assert_eq!(&stored, paper);
    assert_eq!(stored.subject.as_deref(), Some("fintech"));
    assert_eq!(stored.publish_time.as_deref(), Some("2024-03-05"));
  }

  let summary = std::fs::read_to_string(papers[0].summary_link.as_ref().unwrap())?;
  assert!(summary.starts_with("主题：Deep Hedging\n摘要：\n"));
  assert_eq!(extractor.calls(), 2);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_second_run_reuses_artifacts() -> TestResult<()> {
  let (server, _mocks) = arxiv_like_server().await;
  let dir = tempdir()?;
  let mut db = Database::open(dir.path().join("papers.db")).await?;

  let extractor = CountingExtractor::new(PAGES);
  let pipeline = Pipeline::new(test_config(dir.path()))?
    .with_converter(Converter::new().with_extractor(extractor.clone()));
  let texts = vec![format!("{}/pdf/2401.01234.pdf", server.url())];

  let (papers, _) = pipeline.run_texts(&mut db, &texts, None).await?;
  let markdown = std::fs::read_to_string(papers[0].md_link.as_ref().unwrap())?;

  let (again, report) = pipeline.run_texts(&mut db, &texts, None).await?;
  assert_eq!(again, papers);
  assert_eq!(report.stage("acquire").unwrap().reused, 1);
  assert_eq!(report.stage("convert").unwrap().reused, 1);
  assert_eq!(report.stage("classify").unwrap().reused, 1);
  assert_eq!(report.stage("summarize").unwrap().reused, 1);
  assert_eq!(extractor.calls(), 1);
  assert_eq!(std::fs::read_to_string(papers[0].md_link.as_ref().unwrap())?, markdown);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_unreachable_urls_stop_at_discovery() -> TestResult<()> {
  let dir = tempdir()?;
  let mut db = Database::open(dir.path().join("papers.db")).await?;
  let pipeline = Pipeline::new(test_config(dir.path()))?;

  let texts = vec!["http://127.0.0.1:9/abs/1 and http://127.0.0.1:9/paper.pdf".to_string()];
  let (papers, report) = pipeline.run_texts(&mut db, &texts, None).await?;

  assert_eq!(papers.len(), 2);
  assert!(papers.iter().all(|p| p.stage() == Lifecycle::Discovered));
  assert_eq!(report.stage("acquire").unwrap().skipped, 2);
  assert_eq!(report.stage("convert").unwrap().skipped, 2);
  assert_eq!(report.stage("summarize").unwrap().skipped, 2);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_nothing_harvested() -> TestResult<()> {
  let dir = tempdir()?;
  let mut db = Database::open(dir.path().join("papers.db")).await?;
  let pipeline = Pipeline::new(test_config(dir.path()))?;

  let (papers, report) = pipeline.run_texts(&mut db, &["no links".to_string()], None).await?;
  assert!(papers.is_empty());
  assert_eq!(report.harvested, 0);
  assert!(report.stages.iter().all(|(_, r)| r.total() == 0));
  Ok(())
}
