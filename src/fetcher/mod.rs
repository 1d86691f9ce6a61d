use async_trait::async_trait;

use crate::config::Config;
use crate::error::FetchResult;
use crate::models::ObservationMap;

pub mod ccmn;
pub mod chinamoney;
pub mod http;
pub mod json_walk;
pub mod ppi100;
pub mod retry;
pub mod smm;
pub mod text;
pub mod xe;

use http::HttpClient;

/// One downloaded page, kept with its URL for attribution.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub body: String,
}

impl Page {
    pub fn new(url: &str, body: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            body: body.into(),
        }
    }
}

/// Finds the page downloaded from `url`; extraction of a missing page is a parse failure.
pub fn page_for<'a>(pages: &'a [Page], url: &str) -> FetchResult<&'a Page> {
    pages
        .iter()
        .find(|p| p.url == url)
        .ok_or_else(|| crate::error::FetchError::parse(format!("page {} was not fetched", url)))
}

/// A commodity site. Download and extraction are split so extraction can be
/// exercised against recorded pages.
#[async_trait]
pub trait CommoditySource: Send + Sync {
    /// Logical subtask name used in diagnostics (`"au/ag"`, `"steel"`, ...).
    fn name(&self) -> &str;

    async fn fetch_raw(&self) -> FetchResult<Vec<Page>>;

    /// Turns downloaded pages into observations. A line item that cannot be
    /// found yields `value: None`, not an error.
    fn extract(&self, pages: &[Page]) -> FetchResult<ObservationMap>;

    async fn fetch(&self) -> FetchResult<ObservationMap> {
        let pages = self.fetch_raw().await?;
        self.extract(&pages)
    }
}

/// Spot FX converter, one pair per call.
#[async_trait]
pub trait SpotRateSource: Send + Sync {
    /// URL recorded in `fx.sources.spot` when the lookup succeeds.
    fn attribution(&self) -> &str;

    /// Recorded instead of [`attribution`](Self::attribution) when the lookup failed.
    fn fallback_attribution(&self) -> &str {
        self.attribution()
    }

    async fn rate(&self, from: &str, to: &str) -> FetchResult<f64>;
}

/// Central parity feed served from several mirrors.
#[async_trait]
pub trait MidRateSource: Send + Sync {
    fn attribution(&self) -> &str;

    fn endpoints(&self) -> Vec<String>;

    /// `Ok(None)` means the document was fetched but had no USD/CNY entry.
    async fn fetch_mid(&self, url: &str) -> FetchResult<Option<f64>>;
}

/// Every commodity subtask, in the order they are reported.
pub fn commodity_sources(config: &Config, http: &HttpClient) -> Vec<Box<dyn CommoditySource>> {
    vec![
        Box::new(smm::PreciousMetalsSource::new(http.clone())),
        Box::new(ccmn::CcmnSource::copper_aluminum(http.clone())),
        Box::new(ppi100::BasePriceSource::iron_ore(http.clone())),
        Box::new(ppi100::CrudeOilSource::new(http.clone())),
        Box::new(ppi100::BasePriceSource::chemicals(http.clone(), config.retry)),
        Box::new(ppi100::VaneSource::corrugated_paper(http.clone())),
        Box::new(ccmn::CcmnSource::zinc(http.clone())),
        Box::new(ppi100::VaneSource::steel(http.clone(), config.retry)),
    ]
}
