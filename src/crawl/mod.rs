//! Sequential catalog traversal.
//!
//! The controller walks catalog pages 1, 2, 3, ... until a page cannot be
//! fetched, lists no items, or the page bound is reached. Every item linked
//! from a page is fetched, extracted and written before the next catalog page
//! is requested. Nothing runs in parallel.
//!
//! Failures below catalog level never stop the crawl: an item that cannot be
//! fetched, extracted or written is logged and skipped.

mod pagination;

use std::fmt;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

pub use pagination::{CatalogTemplate, PAGE_PLACEHOLDER};

use crate::extract::{ItemExtractor, LinkSelector};
use crate::fetch::{DEFAULT_WAIT_TIMEOUT, FetchOutcome, FetchRequest, Fetcher, RetryCoordinator};
use crate::sink::RecordSink;

/// Default upper bound on catalog pages.
pub const DEFAULT_MAX_PAGES: u32 = 500;

/// Why the crawl ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A catalog page yielded no document after retries.
    CatalogUnavailable,
    /// A catalog page after the first listed no items.
    CatalogEnd,
    /// The first catalog page listed no items; usually a wrong link selector.
    NoItemsOnFirstPage,
    /// The page bound was reached.
    PageLimit,
    /// The catalog template has no page placeholder.
    SinglePage,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CatalogUnavailable => "catalog page unavailable",
            Self::CatalogEnd => "end of catalog",
            Self::NoItemsOnFirstPage => "no items on first page",
            Self::PageLimit => "page limit reached",
            Self::SinglePage => "single-page catalog done",
        };
        f.write_str(text)
    }
}

/// Summary of a finished crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Catalog pages that listed at least one item.
    pub pages: u32,
    /// Records written to the sink.
    pub written: u32,
    /// Items that produced no record.
    pub skipped: u32,
    /// Why the crawl ended.
    pub stop_reason: StopReason,
}

/// Position in the catalog. Pages are 1-based; `max_pages` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlCursor {
    page: u32,
    max_pages: u32,
}

impl CrawlCursor {
    /// Starts at page 1.
    #[must_use]
    pub fn new(max_pages: u32) -> Self {
        Self {
            page: 1,
            max_pages: max_pages.max(1),
        }
    }

    /// Current page number.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Whether this is the first page.
    #[must_use]
    pub fn is_first(&self) -> bool {
        self.page == 1
    }

    /// Moves to the next page. Returns `false` once the bound is reached.
    pub fn advance(&mut self) -> bool {
        if self.page >= self.max_pages {
            return false;
        }
        self.page += 1;
        true
    }
}

/// Static inputs of a crawl.
#[derive(Debug, Clone)]
pub struct CrawlPlan {
    /// Catalog URL template.
    pub catalog: CatalogTemplate,
    /// Item link selector for catalog pages.
    pub links: LinkSelector,
    /// Field table for item pages.
    pub extractor: ItemExtractor,
    /// Selector the browser waits for on catalog pages.
    pub catalog_wait_selector: Option<String>,
    /// Selector the browser waits for on item pages.
    pub item_wait_selector: Option<String>,
    /// Bound for each browser wait.
    pub wait_timeout: Duration,
    /// Last catalog page to visit.
    pub max_pages: u32,
}

impl CrawlPlan {
    /// Creates a plan with default waits and page bound.
    #[must_use]
    pub fn new(catalog: CatalogTemplate, links: LinkSelector, extractor: ItemExtractor) -> Self {
        Self {
            catalog,
            links,
            extractor,
            catalog_wait_selector: None,
            item_wait_selector: None,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    fn catalog_request(&self, url: &str) -> FetchRequest {
        FetchRequest::new(url)
            .with_wait_selector(self.catalog_wait_selector.as_deref())
            .with_timeout(self.wait_timeout)
    }

    fn item_request(&self, url: &str) -> FetchRequest {
        FetchRequest::new(url)
            .with_wait_selector(self.item_wait_selector.as_deref())
            .with_timeout(self.wait_timeout)
    }
}

/// Drives a crawl over one fetch strategy.
#[derive(Debug)]
pub struct CrawlController {
    plan: CrawlPlan,
    retry: RetryCoordinator,
}

impl CrawlController {
    /// Creates a controller.
    #[must_use]
    pub fn new(plan: CrawlPlan, retry: RetryCoordinator) -> Self {
        Self { plan, retry }
    }

    /// Crawls the catalog, writing every extracted record to `sink`.
    ///
    /// Item-level fetch, extraction and write failures are logged and counted
    /// in [`CrawlReport::skipped`].
    #[instrument(skip_all, fields(strategy = fetcher.name(), catalog = %self.plan.catalog.as_str()))]
    pub async fn run(&self, fetcher: &dyn Fetcher, sink: &mut dyn RecordSink) -> CrawlReport {
        let mut cursor = CrawlCursor::new(self.plan.max_pages);
        let mut pages = 0;
        let mut written = 0;
        let mut skipped = 0;

        let stop_reason = loop {
            let page = cursor.page();
            let Some(url) = self.plan.catalog.url_for(page) else {
                break StopReason::SinglePage;
            };
            info!(page, url = %url, "fetching catalog page");

            let Some(html) = self.fetch_document(fetcher, self.plan.catalog_request(&url)).await
            else {
                warn!(page, url = %url, "catalog page unavailable, stopping crawl");
                break StopReason::CatalogUnavailable;
            };

            let links = self.plan.links.extract(&html);
            if links.is_empty() {
                if cursor.is_first() {
                    error!(url = %url, "no item links on the first catalog page, check the item_link selector");
                    break StopReason::NoItemsOnFirstPage;
                }
                info!(page, url = %url, "empty catalog page, end of catalog");
                break StopReason::CatalogEnd;
            }

            pages += 1;
            info!(page, count = links.len(), "found item links");

            for link in &links {
                if self.process_item(fetcher, sink, link).await {
                    written += 1;
                } else {
                    skipped += 1;
                }
            }

            if !cursor.advance() {
                info!(max_pages = self.plan.max_pages, "page limit reached");
                break StopReason::PageLimit;
            }
        };

        let report = CrawlReport {
            pages,
            written,
            skipped,
            stop_reason,
        };
        info!(
            pages = report.pages,
            written = report.written,
            skipped = report.skipped,
            reason = %report.stop_reason,
            "crawl finished"
        );
        report
    }

    /// Fetches through the retry coordinator. An empty body counts as no
    /// document.
    async fn fetch_document(&self, fetcher: &dyn Fetcher, request: FetchRequest) -> Option<String> {
        match self.retry.fetch(fetcher, &request).await {
            FetchOutcome::Success(html) if html.trim().is_empty() => {
                warn!(url = %request.url, "fetched an empty document");
                None
            }
            outcome => outcome.into_document(),
        }
    }

    /// Returns whether a record was written.
    async fn process_item(
        &self,
        fetcher: &dyn Fetcher,
        sink: &mut dyn RecordSink,
        url: &str,
    ) -> bool {
        let html = match self.retry.fetch(fetcher, &self.plan.item_request(url)).await {
            FetchOutcome::Success(html) => html,
            outcome => {
                warn!(url, attempts = outcome.attempts(), "skipping item");
                return false;
            }
        };

        let record = match self.plan.extractor.extract(&html, url) {
            Ok(record) => record,
            Err(error) => {
                warn!(url, error = %error, "extraction failed, skipping item");
                return false;
            }
        };

        if let Err(error) = sink.write(&record).await {
            warn!(url, error = %error, "failed to write record, skipping item");
            return false;
        }
        info!(item = record.label(), "saved item");
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::extract::Record;
    use crate::fetch::{FetchError, RetryPolicy};
    use crate::sink::SinkError;

    /// Serves canned pages; unknown URLs are 404.
    #[derive(Default)]
    struct SiteFake {
        pages: HashMap<String, Result<String, u16>>,
        requests: Mutex<Vec<String>>,
    }

    impl SiteFake {
        fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), Ok(html.to_string()));
            self
        }

        fn status(mut self, url: &str, status: u16) -> Self {
            self.pages.insert(url.to_string(), Err(status));
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        fn count(&self, url: &str) -> usize {
            self.requests().iter().filter(|r| *r == url).count()
        }
    }

    #[async_trait]
    impl Fetcher for SiteFake {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch(&self, request: &FetchRequest) -> Result<String, FetchError> {
            self.requests.lock().unwrap().push(request.url.clone());
            match self.pages.get(&request.url) {
                Some(Ok(html)) => Ok(html.clone()),
                Some(Err(status)) => Err(FetchError::http_status(&request.url, *status)),
                None => Err(FetchError::http_status(&request.url, 404)),
            }
        }

        async fn close(&self) {}
    }

    /// Collects records; the first `failures` writes are refused.
    #[derive(Default)]
    struct MemorySink {
        records: Vec<Record>,
        failures: usize,
    }

    #[async_trait]
    impl RecordSink for MemorySink {
        async fn write(&mut self, record: &Record) -> Result<(), SinkError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(SinkError::Write {
                    path: "memory".into(),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.records.push(record.clone());
            Ok(())
        }
    }

    const BASE: &str = "https://shop.example";

    fn catalog(links: &[&str]) -> String {
        let items: String = links
            .iter()
            .map(|href| format!(r#"<a class="product" href="{href}">item</a>"#))
            .collect();
        format!("<html><body>{items}</body></html>")
    }

    fn item(title: &str) -> String {
        format!("<html><body><h1>{title}</h1><span class=\"price\">1 000 ₽</span></body></html>")
    }

    fn controller(template: &str, max_pages: u32) -> CrawlController {
        let fields = vec![
            ("title".to_string(), "h1".to_string()),
            ("price".to_string(), ".price".to_string()),
        ];
        let mut plan = CrawlPlan::new(
            CatalogTemplate::new(template),
            LinkSelector::new("a.product", BASE).unwrap(),
            ItemExtractor::new(&fields).unwrap(),
        );
        plan.max_pages = max_pages;
        CrawlController::new(
            plan,
            RetryCoordinator::new(RetryPolicy::new(3, Duration::from_secs(3))),
        )
    }

    const TEMPLATE: &str = "https://shop.example/catalog/page/{page}/";

    // ==================== CrawlCursor Tests ====================

    #[test]
    fn test_cursor_bound_is_inclusive() {
        let mut cursor = CrawlCursor::new(3);
        assert_eq!(cursor.page(), 1);
        assert!(cursor.advance());
        assert!(cursor.advance());
        assert_eq!(cursor.page(), 3);
        assert!(!cursor.advance());
        assert_eq!(cursor.page(), 3);
    }

    #[test]
    fn test_cursor_zero_bound_still_visits_first_page() {
        let mut cursor = CrawlCursor::new(0);
        assert!(cursor.is_first());
        assert!(!cursor.advance());
    }

    // ==================== Crawl Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_crawl_walks_pages_until_empty() {
        let site = SiteFake::default()
            .page("https://shop.example/catalog/", &catalog(&["/p/1", "/p/2"]))
            .page("https://shop.example/catalog/page/2/", &catalog(&["/p/3"]))
            .page("https://shop.example/catalog/page/3/", &catalog(&[]))
            .page("https://shop.example/p/1", &item("One"))
            .page("https://shop.example/p/2", &item("Two"))
            .page("https://shop.example/p/3", &item("Three"));
        let mut sink = MemorySink::default();

        let report = controller(TEMPLATE, 500).run(&site, &mut sink).await;

        assert_eq!(report.stop_reason, StopReason::CatalogEnd);
        assert_eq!(report.pages, 2);
        assert_eq!(report.written, 3);
        assert_eq!(report.skipped, 0);
        let titles: Vec<&str> = sink.records.iter().map(|r| r.get("title").unwrap()).collect();
        assert_eq!(titles, vec!["One", "Two", "Three"]);
        assert_eq!(sink.records[0].get("price"), Some("1000"));
        assert_eq!(
            site.requests()[..3],
            [
                "https://shop.example/catalog/".to_string(),
                "https://shop.example/p/1".to_string(),
                "https://shop.example/p/2".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_first_page_is_distinguished() {
        let site = SiteFake::default().page("https://shop.example/catalog/", &catalog(&[]));
        let mut sink = MemorySink::default();

        let report = controller(TEMPLATE, 500).run(&site, &mut sink).await;

        assert_eq!(report.stop_reason, StopReason::NoItemsOnFirstPage);
        assert_eq!(report.pages, 0);
        assert!(sink.records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_catalog_stops_after_retries() {
        let site = SiteFake::default().status("https://shop.example/catalog/", 503);
        let mut sink = MemorySink::default();

        let report = controller(TEMPLATE, 500).run(&site, &mut sink).await;

        assert_eq!(report.stop_reason, StopReason::CatalogUnavailable);
        assert_eq!(site.count("https://shop.example/catalog/"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_items_are_skipped_without_retry() {
        let site = SiteFake::default()
            .page("https://shop.example/catalog/", &catalog(&["/p/gone", "/p/1"]))
            .page("https://shop.example/catalog/page/2/", &catalog(&[]))
            .page("https://shop.example/p/1", &item("One"));
        let mut sink = MemorySink::default();

        let report = controller(TEMPLATE, 500).run(&site, &mut sink).await;

        assert_eq!(report.written, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(site.count("https://shop.example/p/gone"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_item_is_skipped_after_budget() {
        let site = SiteFake::default()
            .page("https://shop.example/catalog/", &catalog(&["/p/flaky", "/p/1"]))
            .page("https://shop.example/catalog/page/2/", &catalog(&[]))
            .status("https://shop.example/p/flaky", 502)
            .page("https://shop.example/p/1", &item("One"));
        let mut sink = MemorySink::default();

        let report = controller(TEMPLATE, 500).run(&site, &mut sink).await;

        assert_eq!(report.written, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(site.count("https://shop.example/p/flaky"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_item_document_is_skipped() {
        let site = SiteFake::default()
            .page("https://shop.example/catalog/", &catalog(&["/p/blank", "/p/1"]))
            .page("https://shop.example/catalog/page/2/", &catalog(&[]))
            .page("https://shop.example/p/blank", "")
            .page("https://shop.example/p/1", &item("One"));
        let mut sink = MemorySink::default();

        let report = controller(TEMPLATE, 500).run(&site, &mut sink).await;

        assert_eq!(report.written, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_limit_stops_crawl() {
        let site = SiteFake::default()
            .page("https://shop.example/catalog/", &catalog(&["/p/1"]))
            .page("https://shop.example/catalog/page/2/", &catalog(&["/p/1"]))
            .page("https://shop.example/catalog/page/3/", &catalog(&["/p/1"]))
            .page("https://shop.example/p/1", &item("One"));
        let mut sink = MemorySink::default();

        let report = controller(TEMPLATE, 2).run(&site, &mut sink).await;

        assert_eq!(report.stop_reason, StopReason::PageLimit);
        assert_eq!(report.pages, 2);
        assert_eq!(site.count("https://shop.example/catalog/page/3/"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_template_without_placeholder_is_single_page() {
        let site = SiteFake::default()
            .page("https://shop.example/sale/", &catalog(&["/p/1"]))
            .page("https://shop.example/p/1", &item("One"));
        let mut sink = MemorySink::default();

        let report = controller("https://shop.example/sale/", 500)
            .run(&site, &mut sink)
            .await;

        assert_eq!(report.stop_reason, StopReason::SinglePage);
        assert_eq!(report.written, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_skips_item_and_crawl_continues() {
        let site = SiteFake::default()
            .page("https://shop.example/catalog/", &catalog(&["/p/1", "/p/2", "/p/3"]))
            .page("https://shop.example/catalog/page/2/", &catalog(&[]))
            .page("https://shop.example/p/1", &item("One"))
            .page("https://shop.example/p/2", &item("Two"))
            .page("https://shop.example/p/3", &item("Three"));
        let mut sink = MemorySink {
            failures: 1,
            ..MemorySink::default()
        };

        let report = controller(TEMPLATE, 500).run(&site, &mut sink).await;

        assert_eq!(report.stop_reason, StopReason::CatalogEnd);
        assert_eq!(report.written, 2);
        assert_eq!(report.skipped, 1);
        let titles: Vec<&str> = sink.records.iter().map(|r| r.get("title").unwrap()).collect();
        assert_eq!(titles, vec!["Two", "Three"]);
        assert_eq!(site.count("https://shop.example/p/2"), 1);
        assert_eq!(site.count("https://shop.example/p/3"), 1);
    }
}
