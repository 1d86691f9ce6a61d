use async_trait::async_trait;
use futures::future::try_join_all;
use once_cell::sync::Lazy;
use regex::Regex;

use super::http::HttpClient;
use super::retry::{with_retry, RetryPolicy};
use super::text::{capture_num, page_text};
use super::{page_for, CommoditySource, Page};
use crate::error::{FetchError, FetchResult};
use crate::models::{Observation, ObservationMap};

pub const IRON_ORE_URL: &str = "https://www.100ppi.com/vane/detail-961.html";
pub const CRUDE_OIL_URL: &str = "https://www.100ppi.com/crudeoil/";
pub const PP_URL: &str = "https://www.100ppi.com/vane/detail-718.html";
pub const ABS_URL: &str = "https://www.100ppi.com/vane/detail-713.html";
pub const PVC_URL: &str = "https://www.100ppi.com/vane/detail-107.html";
pub const LITHIUM_URL: &str = "https://www.100ppi.com/vane/detail-1162.html";
pub const CORRUGATED_URL: &str =
    "https://m1.100ppi.com/vane/1250-%E7%93%A6%E6%A5%9E%E5%8E%9F%E7%BA%B8.html";
pub const REBAR_URL: &str = "https://m1.100ppi.com/vane/927-%E8%9E%BA%E7%BA%B9%E9%92%A2.html";
pub const HRC_URL: &str = "https://m1.100ppi.com/vane/195-%E7%83%AD%E8%BD%A7%E6%9D%BF%E5%8D%B7";

static ANY_BASE_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"基准价为([0-9.]+)元/吨").unwrap());
static IRON_ORE_PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"铁矿石\S*?基准价为([0-9.]+)元/吨").unwrap());
static PP_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"PP\S*?基准价为([0-9.]+)元/吨").unwrap());
static ABS_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ABS\S*?基准价为([0-9.]+)元/吨").unwrap());
static PVC_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"PVC\S*?基准价为([0-9.]+)元/吨").unwrap());
static LITHIUM_PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"碳酸锂\S*?基准价为([0-9.]+)元/吨").unwrap());
static WTI: Lazy<Regex> = Lazy::new(|| Regex::new(r"WTI原油\S*?基准价为([0-9.]+)美元/桶").unwrap());
static BRENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Brent原油\S*?基准价为([0-9.]+)美元/桶").unwrap());
// "01-07 2950.00 0.00%": newest row of a vane price table
static VANE_ROW_WITH_CHANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{2}-\d{2}\s+([0-9]+\.[0-9]+)\s+[-+0-9.]+%").unwrap());
static VANE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{2}-\d{2}\s+([0-9]+\.[0-9]+)").unwrap());

/// Downloads every url, each optionally retried; any failure fails the batch.
async fn fetch_pages(http: &HttpClient, urls: &[&'static str], retry: Option<RetryPolicy>) -> FetchResult<Vec<Page>> {
    let downloads = urls.iter().map(|url| async move {
        let body = match retry {
            Some(policy) => with_retry(policy, url, || http.get_text(url)).await?,
            None => http.get_text(url).await?,
        };
        Ok::<Page, FetchError>(Page::new(url, body))
    });
    try_join_all(downloads).await
}

/// "…<product>…基准价为8237.50元/吨" as published on 100ppi detail pages;
/// any benchmark on the page when the product name is not next to it.
pub fn base_price(text: &str, hinted: &Regex) -> Option<f64> {
    capture_num(hinted, text).or_else(|| capture_num(&ANY_BASE_PRICE, text))
}

pub struct BasePriceEntry {
    pub key: &'static str,
    pub url: &'static str,
    pub price: &'static Lazy<Regex>,
}

/// Benchmark prices ("基准价") from one or more 100ppi detail pages.
pub struct BasePriceSource {
    name: &'static str,
    http: HttpClient,
    entries: Vec<BasePriceEntry>,
    retry_each: Option<RetryPolicy>,
}

impl BasePriceSource {
    pub fn iron_ore(http: HttpClient) -> Self {
        Self {
            name: "iron ore",
            http,
            entries: vec![BasePriceEntry { key: "ironOre62", url: IRON_ORE_URL, price: &IRON_ORE_PRICE }],
            retry_each: None,
        }
    }

    pub fn chemicals(http: HttpClient, retry: RetryPolicy) -> Self {
        Self {
            name: "chem",
            http,
            entries: vec![
                BasePriceEntry { key: "ppRaffia", url: PP_URL, price: &PP_PRICE },
                BasePriceEntry { key: "absGeneral", url: ABS_URL, price: &ABS_PRICE },
                BasePriceEntry { key: "pvcSG5", url: PVC_URL, price: &PVC_PRICE },
                BasePriceEntry { key: "lithiumCarbonate", url: LITHIUM_URL, price: &LITHIUM_PRICE },
            ],
            retry_each: Some(retry),
        }
    }
}

#[async_trait]
impl CommoditySource for BasePriceSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch_raw(&self) -> FetchResult<Vec<Page>> {
        let urls: Vec<&'static str> = self.entries.iter().map(|e| e.url).collect();
        fetch_pages(&self.http, &urls, self.retry_each).await
    }

    fn extract(&self, pages: &[Page]) -> FetchResult<ObservationMap> {
        let mut out = ObservationMap::new();
        for entry in &self.entries {
            let text = page_text(&page_for(pages, entry.url)?.body);
            let value = base_price(&text, entry.price);
            out.insert(entry.key.to_string(), Observation::new(value, "CNY/t", entry.url));
        }
        Ok(out)
    }
}

/// WTI and Brent benchmarks from the rolling crude oil channel.
pub struct CrudeOilSource {
    http: HttpClient,
}

impl CrudeOilSource {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl CommoditySource for CrudeOilSource {
    fn name(&self) -> &str {
        "oil"
    }

    async fn fetch_raw(&self) -> FetchResult<Vec<Page>> {
        fetch_pages(&self.http, &[CRUDE_OIL_URL], None).await
    }

    fn extract(&self, pages: &[Page]) -> FetchResult<ObservationMap> {
        let text = page_text(&page_for(pages, CRUDE_OIL_URL)?.body);
        let mut out = ObservationMap::new();
        out.insert(
            "wti".to_string(),
            Observation::new(capture_num(&WTI, &text), "USD/bbl", CRUDE_OIL_URL),
        );
        out.insert(
            "brent".to_string(),
            Observation::new(capture_num(&BRENT, &text), "USD/bbl", CRUDE_OIL_URL),
        );
        Ok(out)
    }
}

pub struct VaneEntry {
    pub key: &'static str,
    pub url: &'static str,
}

/// Latest row of 100ppi mobile "vane" price tables.
pub struct VaneSource {
    name: &'static str,
    http: HttpClient,
    entries: Vec<VaneEntry>,
    row: &'static Lazy<Regex>,
    retry_each: Option<RetryPolicy>,
}

impl VaneSource {
    pub fn corrugated_paper(http: HttpClient) -> Self {
        Self {
            name: "paper",
            http,
            entries: vec![VaneEntry { key: "corrugatedPaper", url: CORRUGATED_URL }],
            row: &VANE_ROW_WITH_CHANGE,
            retry_each: None,
        }
    }

    pub fn steel(http: HttpClient, retry: RetryPolicy) -> Self {
        Self {
            name: "steel",
            http,
            entries: vec![
                VaneEntry { key: "rebarHRB400", url: REBAR_URL },
                VaneEntry { key: "hrc", url: HRC_URL },
            ],
            row: &VANE_ROW,
            retry_each: Some(retry),
        }
    }
}

#[async_trait]
impl CommoditySource for VaneSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch_raw(&self) -> FetchResult<Vec<Page>> {
        let urls: Vec<&'static str> = self.entries.iter().map(|e| e.url).collect();
        fetch_pages(&self.http, &urls, self.retry_each).await
    }

    fn extract(&self, pages: &[Page]) -> FetchResult<ObservationMap> {
        let mut out = ObservationMap::new();
        for entry in &self.entries {
            let text = page_text(&page_for(pages, entry.url)?.body);
            let value = capture_num(self.row, &text);
            out.insert(entry.key.to_string(), Observation::new(value, "CNY/t", entry.url));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fetcher::http::testing::{canned_server, local_client};

    fn http() -> HttpClient {
        HttpClient::new(&Config::default())
    }

    #[test]
    fn test_base_price_prefers_hint() {
        let text = "1月7日生意社PP基准价为7312.50元/吨 同期ABS基准价为11000.00元/吨";
        assert_eq!(base_price(text, &ABS_PRICE), Some(11000.0));
        assert_eq!(base_price(text, &PP_PRICE), Some(7312.5));
        assert_eq!(base_price(text, &PVC_PRICE), Some(7312.5));
        assert_eq!(base_price("no price today", &PVC_PRICE), None);
    }

    #[test]
    fn test_chemicals_attribute_each_page() {
        let pages = vec![
            Page::new(PP_URL, "<body>1月7日生意社PP(拉丝级)基准价为7312.50元/吨</body>"),
            Page::new(ABS_URL, "<body>1月7日生意社ABS基准价为11000.00元/吨</body>"),
            Page::new(PVC_URL, "<body>1月7日生意社PVC基准价为4875.00元/吨</body>"),
            Page::new(LITHIUM_URL, "<body>页面维护中</body>"),
        ];
        let out = BasePriceSource::chemicals(http(), RetryPolicy::default())
            .extract(&pages)
            .unwrap();
        assert_eq!(out["ppRaffia"].value, Some(7312.5));
        assert_eq!(out["ppRaffia"].source, PP_URL);
        assert_eq!(out["absGeneral"].value, Some(11000.0));
        assert_eq!(out["pvcSG5"].value, Some(4875.0));
        assert_eq!(out["pvcSG5"].source, PVC_URL);
        assert_eq!(out["lithiumCarbonate"].value, None);
        assert_eq!(out["lithiumCarbonate"].source, LITHIUM_URL);
    }

    #[test]
    fn test_missing_page_is_parse_error() {
        let err = BasePriceSource::iron_ore(http()).extract(&[]).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_crude_oil() {
        let html = "<body><p>1月7日生意社WTI原油(期货)基准价为72.35美元/桶</p>\
                    <p>1月7日生意社Brent原油(期货)基准价为76.10美元/桶</p></body>";
        // adjacent paragraphs flatten without a separator; each benchmark still reads its own figure
        let out = CrudeOilSource::new(http())
            .extract(&[Page::new(CRUDE_OIL_URL, html)])
            .unwrap();
        assert_eq!(out["wti"].value, Some(72.35));
        assert_eq!(out["brent"].value, Some(76.1));
        assert_eq!(out["brent"].unit, "USD/bbl");
    }

    #[tokio::test]
    async fn test_steel_fails_when_one_page_fails() {
        let rebar = canned_server("200 OK", "<body>日期 价格 01-07 3237.66 0.00%</body>").await;
        let hrc = canned_server("503 Service Unavailable", "busy").await;
        // entry urls are 'static
        let rebar: &'static str = Box::leak(rebar.into_boxed_str());
        let hrc: &'static str = Box::leak(hrc.into_boxed_str());

        let steel = VaneSource {
            name: "steel",
            http: local_client(),
            entries: vec![
                VaneEntry { key: "rebarHRB400", url: rebar },
                VaneEntry { key: "hrc", url: hrc },
            ],
            row: &VANE_ROW,
            retry_each: Some(RetryPolicy::new(2, std::time::Duration::from_millis(5))),
        };

        let err = steel.fetch_raw().await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Status {
                url: hrc.to_string(),
                status: 503
            }
        );
        assert!(steel.fetch().await.is_err());
    }

    #[test]
    fn test_vane_tables() {
        let paper = "<table>
            <tr><td>01-07</td> <td>2950.00</td> <td>0.00%</td></tr>
            <tr><td>01-06</td> <td>2940.00</td> <td>-0.34%</td></tr>
        </table>";
        let out = VaneSource::corrugated_paper(http())
            .extract(&[Page::new(CORRUGATED_URL, paper)])
            .unwrap();
        assert_eq!(out["corrugatedPaper"].value, Some(2950.0));

        let pages = vec![
            Page::new(REBAR_URL, "<body>日期 价格 01-07 3237.66 0.00%</body>"),
            Page::new(HRC_URL, "<body>暂无数据</body>"),
        ];
        let out = VaneSource::steel(http(), RetryPolicy::default())
            .extract(&pages)
            .unwrap();
        assert_eq!(out["rebarHRB400"].value, Some(3237.66));
        assert_eq!(out["hrc"].value, None);
        assert_eq!(out["hrc"].source, HRC_URL);
    }
}
