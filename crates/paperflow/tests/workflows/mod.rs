use std::time::Duration;

use super::*;

mod acquire;
mod end_to_end;
mod stages;

/// A fetcher downloading into `dir` with a short timeout.
fn test_fetcher(dir: &Path) -> PdfFetcher {
  PdfFetcher::new(FetchConfig::new(dir).with_timeout(Duration::from_secs(5))).unwrap()
}

/// A minimal body that passes the magic byte check.
const PDF_BODY: &[u8] = b"%PDF-1.4\n% test document\n%%EOF\n";
