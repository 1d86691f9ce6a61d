use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::http::HttpClient;
use super::text::{capture_num, first_grouped_number, loose_num, page_text, table_rows};
use super::{page_for, CommoditySource, Page};
use crate::error::FetchResult;
use crate::models::{Observation, ObservationMap};

pub const PRECIOUS_METALS_URL: &str = "https://hq.smm.cn/h5/precious-metals-price";

struct MetalSpec {
    key: &'static str,
    unit: &'static str,
    row_names: &'static [&'static str],
    fallbacks: &'static Lazy<Vec<Regex>>,
}

// Page text looks like "99黄金价格 998.0 - 999.0 998.4 +1.2 元/克 01-07":
// name, low - high, average. The average is preferred, the first number is the last resort.
static GOLD_FALLBACKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"99黄金价格[^\d]*[0-9]+(?:\.[0-9]+)?\s*-\s*[0-9]+(?:\.[0-9]+)?\s*([0-9]+(?:\.[0-9]+)?)").unwrap(),
        Regex::new(r"99黄金价格[^\d]*([0-9]+(?:\.[0-9]+)?)").unwrap(),
    ]
});

static SILVER_FALLBACKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?:IC-)?Ag99\.99白银价格[^\d]*[0-9]+(?:\.[0-9]+)?\s*-\s*[0-9]+(?:\.[0-9]+)?\s*([0-9]+(?:\.[0-9]+)?)").unwrap(),
        Regex::new(r"(?:IC-)?Ag99\.99白银价格[^\d]*([0-9]+(?:\.[0-9]+)?)").unwrap(),
    ]
});

static METALS: [MetalSpec; 2] = [
    MetalSpec {
        key: "au9999",
        unit: "CNY/g",
        row_names: &["99黄金价格"],
        fallbacks: &GOLD_FALLBACKS,
    },
    MetalSpec {
        key: "ag9999",
        unit: "CNY/kg",
        row_names: &["Ag99.99白银价格", "IC-Ag99.99白银价格"],
        fallbacks: &SILVER_FALLBACKS,
    },
];

/// Row layout on the SMM H5 page: name | range | average | change | unit | date.
/// Columns drift, so the average falls back to numbers embedded in the
/// average cell and then the range cell.
fn average_from_rows(rows: &[Vec<String>], names: &[&str]) -> Option<f64> {
    let cells = rows
        .iter()
        .find(|cells| names.iter().any(|n| cells[0].contains(n)))?;

    let avg_cell = cells.get(2).map(String::as_str).unwrap_or("");
    let range_cell = cells.get(1).map(String::as_str).unwrap_or("");

    loose_num(avg_cell)
        .or_else(|| first_grouped_number(avg_cell))
        .or_else(|| first_grouped_number(range_cell))
}

/// Gold and silver from the SMM precious metals quote page.
pub struct PreciousMetalsSource {
    http: HttpClient,
}

impl PreciousMetalsSource {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl CommoditySource for PreciousMetalsSource {
    fn name(&self) -> &str {
        "au/ag"
    }

    async fn fetch_raw(&self) -> FetchResult<Vec<Page>> {
        let body = self.http.get_text(PRECIOUS_METALS_URL).await?;
        Ok(vec![Page::new(PRECIOUS_METALS_URL, body)])
    }

    fn extract(&self, pages: &[Page]) -> FetchResult<ObservationMap> {
        let page = page_for(pages, PRECIOUS_METALS_URL)?;
        let rows = table_rows(&page.body, 5);
        let text = page_text(&page.body);

        let mut out = ObservationMap::new();
        for metal in METALS.iter() {
            let value = average_from_rows(&rows, metal.row_names).or_else(|| {
                debug!("{}: no table row, trying page text", metal.key);
                metal.fallbacks.iter().find_map(|re| capture_num(re, &text))
            });
            out.insert(
                metal.key.to_string(),
                Observation::new(value, metal.unit, PRECIOUS_METALS_URL),
            );
        }
        Ok(out)
    }
}
