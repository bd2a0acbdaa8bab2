use async_trait::async_trait;

use ficdl_common::{Report, Uri};
use ficdl_parser::Document;

/// External collaborator turning a location into a parsed document.
///
/// Failures are opaque to the callers; timeouts, cancellation and any
/// retry policy are the loader's own business, the core performs at most
/// one load per resource per call and never retries.
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, url: &Uri) -> Result<Document, Report>;
}

/// Loader fetching pages over HTTP.
pub struct HttpLoader {
    delay: Option<u64>,
}

impl HttpLoader {
    /// `delay` is an optional upper bound, in seconds, for a randomized
    /// pause before every fetch, to stay polite with the source.
    pub fn new(delay: Option<u64>) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl PageLoader for HttpLoader {
    #[tracing::instrument(err, skip(self, url), fields(url = %url.to_string()))]
    async fn load(&self, url: &Uri) -> Result<Document, Report> {
        if let Some(max_secs) = self.delay {
            ficdl_common::utils::sleep(max_secs).await?;
        }

        let html = ficdl_common::utils::req(url).await?;

        Document::parse(&html)
    }
}
