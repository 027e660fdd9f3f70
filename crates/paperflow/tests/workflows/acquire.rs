use mockito::Server;

use super::*;

/// Validation of candidate URLs
mod validation {
  use super::*;

  #[traced_test]
  #[tokio::test]
  async fn test_magic_bytes_win_over_content_type() -> TestResult<()> {
    let mut server = Server::new_async().await;
    let _head = server
      .mock("HEAD", "/mislabeled")
      .with_status(200)
      .with_header("content-type", "application/octet-stream")
      .create_async()
      .await;
    let _get = server
      .mock("GET", "/mislabeled")
      .with_status(200)
      .with_header("content-type", "application/octet-stream")
      .with_body(PDF_BODY)
      .create_async()
      .await;

    let dir = tempdir()?;
    let fetcher = test_fetcher(dir.path());
    assert!(fetcher.validate(&format!("{}/mislabeled", server.url())).await);
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_declared_pdf_is_accepted_without_body() -> TestResult<()> {
    let mut server = Server::new_async().await;
    let _head = server
      .mock("HEAD", "/typed")
      .with_status(200)
      .with_header("content-type", "Application/PDF; charset=binary")
      .create_async()
      .await;

    let dir = tempdir()?;
    let fetcher = test_fetcher(dir.path());
    assert!(fetcher.validate(&format!("{}/typed", server.url())).await);
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_html_and_errors_are_rejected() -> TestResult<()> {
    let mut server = Server::new_async().await;
    let _head = server
      .mock("HEAD", "/landing")
      .with_status(200)
      .with_header("content-type", "text/html")
      .create_async()
      .await;
    let _get = server
      .mock("GET", "/landing")
      .with_status(200)
      .with_header("content-type", "text/html")
      .with_body("<html><body>Not a pdf</body></html>")
      .create_async()
      .await;
    let _gone =
      server.mock("GET", "/gone").with_status(404).with_body(PDF_BODY).create_async().await;

    let dir = tempdir()?;
    let fetcher = test_fetcher(dir.path());
    assert!(!fetcher.validate(&format!("{}/landing", server.url())).await);
    assert!(!fetcher.validate(&format!("{}/gone", server.url())).await);
    assert!(!fetcher.validate("http://127.0.0.1:9/unreachable.pdf").await);
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_head_type_needs_success_status() -> TestResult<()> {
    let mut server = Server::new_async().await;
    let _head = server
      .mock("HEAD", "/withdrawn.pdf")
      .with_status(404)
      .with_header("content-type", "application/pdf")
      .create_async()
      .await;
    let _get = server
      .mock("GET", "/withdrawn.pdf")
      .with_status(404)
      .with_header("content-type", "application/pdf")
      .create_async()
      .await;
    let _no_head = server
      .mock("HEAD", "/no-head.pdf")
      .with_status(405)
      .with_header("content-type", "application/pdf")
      .create_async()
      .await;
    let _served = server
      .mock("GET", "/no-head.pdf")
      .with_status(200)
      .with_header("content-type", "application/pdf")
      .with_body(PDF_BODY)
      .create_async()
      .await;

    let dir = tempdir()?;
    let fetcher = test_fetcher(dir.path());
    assert!(!fetcher.validate(&format!("{}/withdrawn.pdf", server.url())).await);
    // A server refusing HEAD is still checked through the body.
    assert!(fetcher.validate(&format!("{}/no-head.pdf", server.url())).await);
    Ok(())
  }
}

/// Downloads and the acquisition stage
mod download {
  use super::*;

  #[traced_test]
  #[tokio::test]
  async fn test_second_download_gets_suffix() -> TestResult<()> {
    let mut server = Server::new_async().await;
    let pdf = server
      .mock("GET", "/files/paper.pdf")
      .with_status(200)
      .with_header("content-type", "application/pdf")
      .with_body(PDF_BODY)
      .expect(2)
      .create_async()
      .await;

    let dir = tempdir()?;
    let fetcher = test_fetcher(dir.path());
    let url = format!("{}/files/paper.pdf", server.url());

    let first = fetcher.download(&url).await?;
    let second = fetcher.download(&url).await?;

    assert_eq!(first, dir.path().join("paper.pdf"));
    assert_eq!(second, dir.path().join("paper_2.pdf"));
    assert_eq!(std::fs::read(&first)?, PDF_BODY);
    assert_eq!(std::fs::read(&second)?, PDF_BODY);
    pdf.assert_async().await;
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_stage_follows_landing_page() -> TestResult<()> {
    let mut server = Server::new_async().await;
    let _page = server
      .mock("GET", "/abs/7")
      .with_status(200)
      .with_header("content-type", "text/html")
      .with_body(r#"<a href="/about">About</a> <a href="/files/deep7.pdf">Full text</a>"#)
      .create_async()
      .await;
    let _head = server
      .mock("HEAD", "/files/deep7.pdf")
      .with_status(200)
      .with_header("content-type", "application/pdf")
      .create_async()
      .await;
    let _pdf = server
      .mock("GET", "/files/deep7.pdf")
      .with_status(200)
      .with_header("content-type", "application/pdf")
      .with_body(PDF_BODY)
      .create_async()
      .await;

    let (mut db, _db_dir) = create_test_database().await;
    let storage = tempdir()?;
    let fetcher = test_fetcher(storage.path());

    let mut paper = Paper::new(format!("{}/abs/7", server.url()));
    paper.id = Some(db.insert(&paper).await?);
    let mut papers = vec![paper];

    let report = run_stage(&fetcher, &mut db, &mut papers).await?;
    assert_eq!(report.generated, 1);

    let expected = storage.path().join("deep7.pdf");
    assert_eq!(papers[0].pdf_link.as_deref(), Some(expected.as_path()));
    let stored = db.find_by_id(papers[0].id.unwrap()).await?.unwrap();
    assert_eq!(stored.pdf_link.as_deref(), Some(expected.as_path()));
    assert_eq!(stored.stage(), Lifecycle::PdfAcquired);

    // An existing file is not downloaded again.
    let report = run_stage(&fetcher, &mut db, &mut papers).await?;
    assert_eq!(report, StageReport { reused: 1, ..StageReport::default() });
    Ok(())
  }

  #[traced_test]
  #[tokio::test]
  async fn test_no_valid_pdf_leaves_record_unchanged() -> TestResult<()> {
    let mut server = Server::new_async().await;
    let _page = server
      .mock("GET", "/abs/8")
      .with_status(200)
      .with_header("content-type", "text/html")
      .with_body(r#"<a href="/about">About</a>"#)
      .create_async()
      .await;

    let (mut db, _db_dir) = create_test_database().await;
    let storage = tempdir()?;
    let fetcher = test_fetcher(storage.path());

    let mut paper = Paper::new(format!("{}/abs/8", server.url()));
    paper.id = Some(db.insert(&paper).await?);
    let before = paper.clone();
    let mut papers = vec![paper];

    let report = run_stage(&fetcher, &mut db, &mut papers).await?;
    assert_eq!(report, StageReport { skipped: 1, ..StageReport::default() });
    assert_eq!(papers[0], before);
    assert_eq!(db.find_by_id(before.id.unwrap()).await?.unwrap(), before);
    Ok(())
  }
}
