use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::http::HttpClient;
use super::json_walk::JsonRule;
use super::MidRateSource;
use crate::error::FetchResult;

pub const CCPR_ENDPOINTS: [&str; 2] = [
    "https://iftp.chinamoney.com.cn/r/cms/www/chinamoney/data/fx/ccpr.json",
    "https://www.chinamoney.com.cn/r/cms/www/chinamoney/data/fx/ccpr.json",
];
pub const CCPR_ATTRIBUTION: &str = "chinamoney.com.cn (ccpr.json)";

// The feed layout changes between mirrors and over time, so the USD/CNY
// entry is located by label and the value by a list of known field names.
static USD_CNY_RULE: Lazy<JsonRule> = Lazy::new(|| JsonRule {
    label_fields: vec!["ccyPair", "currencyPair", "vrtEName", "vrtEname", "pair", "name"],
    label_patterns: vec![Regex::new(r"美元\s*/\s*人民币").unwrap()],
    blob_patterns: vec![
        Regex::new(r"USD\s*/\s*CNY").unwrap(),
        Regex::new(r"USD\s*CNY").unwrap(),
        Regex::new(r"美元\s*/\s*人民币").unwrap(),
    ],
    value_fields: vec!["middleRate", "centralParity", "parity", "mid", "price", "value", "last"],
});

/// First USD/CNY central parity found in a ccpr document, in document order.
pub fn extract_usd_cny_mid(doc: &Value) -> Option<f64> {
    USD_CNY_RULE.first_match(doc)
}

/// CFETS central parity (中间价) published by chinamoney.com.cn.
pub struct ChinaMoneySource {
    http: HttpClient,
}

impl ChinaMoneySource {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl MidRateSource for ChinaMoneySource {
    fn attribution(&self) -> &str {
        CCPR_ATTRIBUTION
    }

    fn endpoints(&self) -> Vec<String> {
        CCPR_ENDPOINTS.iter().map(|u| u.to_string()).collect()
    }

    async fn fetch_mid(&self, url: &str) -> FetchResult<Option<f64>> {
        let doc = self.http.get_json(url).await?;
        Ok(extract_usd_cny_mid(&doc))
    }
}
