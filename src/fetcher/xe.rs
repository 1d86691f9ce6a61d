use async_trait::async_trait;
use regex::RegexBuilder;

use super::http::HttpClient;
use super::text::{page_text, safe_num};
use super::SpotRateSource;
use crate::error::{FetchError, FetchResult};

pub const XE_ATTRIBUTION: &str = "https://www.xe.com/zh-cn/currencyconverter/";
/// Recorded as the spot provenance when the lookup failed.
pub const XE_FALLBACK_ATTRIBUTION: &str = "xe.com";

pub fn converter_url(from: &str, to: &str) -> String {
    format!(
        "https://www.xe.com/zh-cn/currencyconverter/convert/?Amount=1&From={}&To={}",
        from, to
    )
}

/// Reads "1.00 USD = 7.0123 CNY" from the converter page text.
pub fn extract_rate(html: &str, from: &str, to: &str) -> FetchResult<f64> {
    let text = page_text(html);
    let pattern = format!(
        r"1\.00\s*{}\s*=\s*([0-9.,\s]+)\s*{}",
        regex::escape(from),
        regex::escape(to)
    );
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| FetchError::parse(format!("bad XE pattern for {}->{}: {}", from, to, e)))?;

    re.captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| safe_num(m.as_str()))
        .ok_or_else(|| FetchError::parse(format!("XE parse failed for {}->{}", from, to)))
}

/// XE currency converter, one page per pair.
pub struct XeSource {
    http: HttpClient,
}

impl XeSource {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SpotRateSource for XeSource {
    fn attribution(&self) -> &str {
        XE_ATTRIBUTION
    }

    fn fallback_attribution(&self) -> &str {
        XE_FALLBACK_ATTRIBUTION
    }

    async fn rate(&self, from: &str, to: &str) -> FetchResult<f64> {
        let html = self.http.get_text(&converter_url(from, to)).await?;
        extract_rate(&html, from, to)
    }
}
