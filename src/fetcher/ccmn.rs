use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::http::HttpClient;
use super::text::{capture_num, page_text};
use super::{page_for, CommoditySource, Page};
use crate::error::FetchResult;
use crate::models::{Observation, ObservationMap};

pub const CCMN_URL: &str = "https://m.ccmn.cn/";

// quote lines read `<label> low—high average`; zinc is sometimes typed with an ASCII dash
static COPPER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"1#铜\s*[0-9,]+—[0-9,]+\s*([0-9,]+)").unwrap());
static ALUMINUM_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"A00铝\s*[0-9,]+—[0-9,]+\s*([0-9,]+)").unwrap());
static ZINC_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0#锌\s*[0-9,]+[—-][0-9,]+\s*([0-9,]+)").unwrap());

struct QuoteLine {
    key: &'static str,
    pattern: &'static Lazy<Regex>,
}

/// Spot base metals from the Changjiang nonferrous metals mobile page.
pub struct CcmnSource {
    name: &'static str,
    http: HttpClient,
    lines: Vec<QuoteLine>,
}

impl CcmnSource {
    pub fn copper_aluminum(http: HttpClient) -> Self {
        Self {
            name: "cu/al",
            http,
            lines: vec![
                QuoteLine { key: "copper1", pattern: &COPPER_LINE },
                QuoteLine { key: "aluminumA00", pattern: &ALUMINUM_LINE },
            ],
        }
    }

    pub fn zinc(http: HttpClient) -> Self {
        Self {
            name: "zinc",
            http,
            lines: vec![QuoteLine { key: "zinc0", pattern: &ZINC_LINE }],
        }
    }
}

#[async_trait]
impl CommoditySource for CcmnSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch_raw(&self) -> FetchResult<Vec<Page>> {
        let body = self.http.get_text(CCMN_URL).await?;
        Ok(vec![Page::new(CCMN_URL, body)])
    }

    fn extract(&self, pages: &[Page]) -> FetchResult<ObservationMap> {
        let text = page_text(&page_for(pages, CCMN_URL)?.body);
        Ok(self
            .lines
            .iter()
            .map(|line| {
                let value = capture_num(line.pattern, &text);
                (line.key.to_string(), Observation::new(value, "CNY/t", CCMN_URL))
            })
            .collect())
    }
}
