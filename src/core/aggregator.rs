use futures::future::join_all;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{FetchError, FetchResult};
use crate::fetcher::chinamoney::ChinaMoneySource;
use crate::fetcher::http::HttpClient;
use crate::fetcher::retry::{with_retry, RetryPolicy};
use crate::fetcher::xe::XeSource;
use crate::fetcher::{commodity_sources, CommoditySource, MidRateSource, SpotRateSource};
use crate::models::{
    CommodityBatch, FxRates, FxSources, ObservationMap, RecordErrors, Snapshot, SpotRates,
};

/// Internal (source-side) commodity key -> public key used in the record.
pub static KEY_ALIASES: &[(&str, &str)] = &[
    ("aluminumA00", "alA00"),
    ("zinc0", "zn0"),
    ("rebarHRB400", "rebar"),
    ("corrugatedPaper", "corrugated"),
    ("ppRaffia", "pp"),
    ("absGeneral", "abs"),
    ("pvcSG5", "pvc"),
];

/// Keys without an alias pass through unchanged.
pub fn public_key(internal: &str) -> &str {
    KEY_ALIASES
        .iter()
        .find(|(from, _)| *from == internal)
        .map(|(_, to)| *to)
        .unwrap_or(internal)
}

/// Folds per-subtask outcomes into one commodity map.
///
/// Null fields are kept under their public key and reported under their
/// internal key as `parse_failed (<subtask>)`; a failed subtask contributes
/// nothing but a `subtask:<name>` entry.
pub fn merge_outcomes<'a, I>(outcomes: I) -> CommodityBatch
where
    I: IntoIterator<Item = (&'a str, FetchResult<ObservationMap>)>,
{
    let mut batch = CommodityBatch::default();
    let mut attempted = 0;
    let mut failed = 0;

    for (name, outcome) in outcomes {
        attempted += 1;
        match outcome {
            Ok(observations) => {
                for (key, obs) in observations {
                    if obs.is_missing() {
                        warn!("Commodity parsed null: {} ({})", key, name);
                        batch
                            .errors
                            .insert(key.clone(), format!("parse_failed ({})", name));
                    }
                    batch.commodities.insert(public_key(&key).to_string(), obs);
                }
            }
            Err(e) => {
                warn!("Commodity subtask failed: {}: {}", name, e);
                failed += 1;
                batch.errors.insert(format!("subtask:{}", name), e.to_string());
            }
        }
    }

    if attempted > 0 && failed == attempted {
        batch.failure = Some(format!("all {} commodity subtasks failed", attempted));
    }
    batch
}

/// Builds the snapshot from the three top-level subtask outcomes.
pub fn assemble(
    spot: FetchResult<SpotRates>,
    spot_fallback: &str,
    mid: FetchResult<f64>,
    mid_source: &str,
    batch: CommodityBatch,
) -> Snapshot {
    let mut errors = RecordErrors::default();

    let mut fx = match spot {
        Ok(rates) => FxRates {
            usd_cny: rates.usd_cny,
            usd_brl: rates.usd_brl,
            brl_cny: rates.brl_cny,
            sources: FxSources {
                spot: rates.source,
                ..Default::default()
            },
            ..Default::default()
        },
        Err(e) => {
            errors.fx_spot = Some(e.to_string());
            FxRates {
                sources: FxSources {
                    spot: spot_fallback.to_string(),
                    ..Default::default()
                },
                ..Default::default()
            }
        }
    };

    match mid {
        Ok(rate) => fx.usd_cny_mid = Some(rate),
        Err(e) => errors.usd_cny_mid = Some(e.to_string()),
    }
    fx.sources.mid = mid_source.to_string();

    errors.commodities = batch.failure;
    errors.commodities_detailed = Some(batch.errors);

    Snapshot {
        fx,
        commodities: batch.commodities,
        errors,
    }
}

/// Runs every source for one capture.
pub struct Aggregator {
    commodities: Vec<Box<dyn CommoditySource>>,
    spot: Box<dyn SpotRateSource>,
    mid: Box<dyn MidRateSource>,
    retry: RetryPolicy,
    mid_retry: RetryPolicy,
}

impl Aggregator {
    pub fn new(config: &Config, http: &HttpClient) -> Self {
        Self::with_sources(
            commodity_sources(config, http),
            Box::new(XeSource::new(http.clone())),
            Box::new(ChinaMoneySource::new(http.clone())),
            config.retry,
            config.mid_retry,
        )
    }

    pub fn with_sources(
        commodities: Vec<Box<dyn CommoditySource>>,
        spot: Box<dyn SpotRateSource>,
        mid: Box<dyn MidRateSource>,
        retry: RetryPolicy,
        mid_retry: RetryPolicy,
    ) -> Self {
        Self {
            commodities,
            spot,
            mid,
            retry,
            mid_retry,
        }
    }

    /// All commodity subtasks concurrently; no failure cancels a sibling.
    pub async fn collect_commodities(&self) -> CommodityBatch {
        let runs = self.commodities.iter().map(|source| async move {
            let outcome = with_retry(self.retry, source.name(), || source.fetch()).await;
            (source.name(), outcome)
        });
        let outcomes = join_all(runs).await;
        merge_outcomes(outcomes)
    }

    async fn spot_pair(&self, from: &str, to: &str) -> FetchResult<f64> {
        let label = format!("spot {}->{}", from, to);
        with_retry(self.retry, &label, || self.spot.rate(from, to)).await
    }

    /// USD/CNY, USD/BRL and BRL/CNY concurrently. Any failure fails all three.
    pub async fn fetch_spot(&self) -> FetchResult<SpotRates> {
        let (usd_cny, usd_brl, brl_cny) = tokio::try_join!(
            self.spot_pair("USD", "CNY"),
            self.spot_pair("USD", "BRL"),
            self.spot_pair("BRL", "CNY")
        )?;
        Ok(SpotRates {
            usd_cny: Some(usd_cny),
            usd_brl: Some(usd_brl),
            brl_cny: Some(brl_cny),
            source: self.spot.attribution().to_string(),
        })
    }

    /// Mirrors in order, each retried; the first one with a rate wins.
    pub async fn fetch_mid(&self) -> FetchResult<f64> {
        let mut last_error = None;
        for url in self.mid.endpoints() {
            match with_retry(self.mid_retry, &url, || self.mid.fetch_mid(&url)).await {
                Ok(Some(rate)) => return Ok(rate),
                Ok(None) => {
                    warn!("No USD/CNY mid entry in {}", url);
                    last_error = Some(FetchError::parse(format!("no USD/CNY mid rate in {}", url)));
                }
                Err(e) => {
                    warn!("Mid-rate mirror failed: {}", e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| FetchError::parse("no mid-rate endpoints configured")))
    }

    pub async fn snapshot(&self) -> Snapshot {
        let (spot, mid, batch) =
            tokio::join!(self.fetch_spot(), self.fetch_mid(), self.collect_commodities());

        if let Err(e) = &spot {
            warn!("FX spot failed: {}", e);
        }
        if let Err(e) = &mid {
            warn!("USD/CNY mid failed: {}", e);
        }
        info!(
            "Collected {} commodities ({} diagnostics)",
            batch.commodities.len(),
            batch.errors.len()
        );

        assemble(
            spot,
            self.spot.fallback_attribution(),
            mid,
            self.mid.attribution(),
            batch,
        )
    }
}
