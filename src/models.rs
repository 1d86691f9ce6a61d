use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Commodity/FX key -> observation, as produced by one source.
pub type ObservationMap = BTreeMap<String, Observation>;

/// Fields written by other tools; carried through untouched.
pub type Extra = BTreeMap<String, Value>;

/// Reads an explicit `null` as the type's default. Legacy rows carry
/// `"ts": null` and similar.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One scraped number. `value` is `None` when the field was attempted but
/// could not be parsed; it is never dropped from the map.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Observation {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unit: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Observation {
    pub fn new(value: Option<f64>, unit: &str, source: &str) -> Self {
        Self {
            value,
            unit: unit.to_string(),
            source: source.to_string(),
            extra: Extra::new(),
        }
    }

    /// True when the value is missing or not a usable number.
    pub fn is_missing(&self) -> bool {
        !matches!(self.value, Some(v) if v.is_finite())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct FxSources {
    #[serde(default, deserialize_with = "null_as_default")]
    pub spot: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mid: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FxRates {
    #[serde(default)]
    pub usd_cny: Option<f64>,
    #[serde(default)]
    pub usd_brl: Option<f64>,
    #[serde(default)]
    pub brl_cny: Option<f64>,
    #[serde(default)]
    pub usd_cny_mid: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sources: FxSources,
    #[serde(flatten)]
    pub extra: Extra,
}

impl FxRates {
    /// Named rates in display order, used by alerting and inspection.
    pub fn named(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("usdCnyMid", self.usd_cny_mid),
            ("usdCny", self.usd_cny),
            ("usdBrl", self.usd_brl),
            ("brlCny", self.brl_cny),
        ]
    }
}

/// Spot rates from the three paired lookups. Only ever built when all three
/// succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotRates {
    pub usd_cny: Option<f64>,
    pub usd_brl: Option<f64>,
    pub brl_cny: Option<f64>,
    pub source: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecordErrors {
    #[serde(default)]
    pub fx_spot: Option<String>,
    #[serde(default)]
    pub usd_cny_mid: Option<String>,
    #[serde(default)]
    pub commodities: Option<String>,
    #[serde(default)]
    pub commodities_detailed: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl RecordErrors {
    pub fn major(&self) -> Vec<&str> {
        [&self.fx_spot, &self.usd_cny_mid, &self.commodities]
            .into_iter()
            .filter_map(|e| e.as_deref())
            .collect()
    }

    pub fn detailed_count(&self) -> usize {
        self.commodities_detailed.as_ref().map_or(0, |m| m.len())
    }

    pub fn is_partial_failure(&self) -> bool {
        !self.major().is_empty() || self.detailed_count() > 0
    }
}

/// Merged commodity results plus per-field/per-subtask diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommodityBatch {
    pub commodities: ObservationMap,
    pub errors: BTreeMap<String, String>,
    /// Set only when no subtask produced anything.
    pub failure: Option<String>,
}

/// Everything one run captured, before it gets a date and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub fx: FxRates,
    pub commodities: ObservationMap,
    pub errors: RecordErrors,
}

/// A snapshot as persisted in the time series file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_ts: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fx: FxRates,
    #[serde(default, deserialize_with = "null_as_default")]
    pub commodities: ObservationMap,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: RecordErrors,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Record {
    pub fn from_snapshot(date: String, ts: String, snapshot: Snapshot) -> Self {
        Self {
            date,
            ts,
            run_ts: None,
            fx: snapshot.fx,
            commodities: snapshot.commodities,
            errors: snapshot.errors,
            extra: Extra::new(),
        }
    }

    /// Ordering key: `ts`, or `date` for legacy rows without one.
    pub fn sort_key(&self) -> &str {
        if self.ts.is_empty() {
            &self.date
        } else {
            &self.ts
        }
    }

    pub fn commodity_value(&self, key: &str) -> Option<f64> {
        self.commodities.get(key).and_then(|o| o.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_dashboard_shape() {
        let mut commodities = ObservationMap::new();
        commodities.insert(
            "alA00".to_string(),
            Observation::new(Some(20310.0), "CNY/t", "https://m.ccmn.cn/"),
        );
        commodities.insert(
            "wti".to_string(),
            Observation::new(None, "USD/bbl", "https://www.100ppi.com/crudeoil/"),
        );

        let record = Record::from_snapshot(
            "2026-01-07".to_string(),
            "2026-01-07T09:31:00.000+08:00".to_string(),
            Snapshot {
                fx: FxRates {
                    usd_cny: Some(7.01),
                    ..Default::default()
                },
                commodities,
                errors: RecordErrors::default(),
            },
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["fx"]["usdCny"], json!(7.01));
        assert_eq!(value["fx"]["usdCnyMid"], Value::Null);
        assert_eq!(value["commodities"]["alA00"]["value"], json!(20310.0));
        assert_eq!(value["commodities"]["wti"]["value"], Value::Null);
        assert_eq!(value["errors"]["fxSpot"], Value::Null);
        assert!(value.get("runTs").is_none());
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = json!({
            "date": "2026-01-07",
            "ts": "2026-01-07T16:02:00.000+08:00",
            "runTs": "2026-01-07T16:05:00.000+08:00",
            "note": "manual fix",
            "fx": { "usdCny": 7.0 },
            "commodities": {},
            "errors": {}
        });

        let record: Record = serde_json::from_value(raw).unwrap();
        assert_eq!(record.run_ts.as_deref(), Some("2026-01-07T16:05:00.000+08:00"));
        assert_eq!(record.extra.get("note"), Some(&json!("manual fix")));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["note"], json!("manual fix"));
        assert_eq!(back["runTs"], json!("2026-01-07T16:05:00.000+08:00"));
    }

    #[test]
    fn test_nested_unknown_fields_survive_round_trip() {
        let raw = json!({
            "date": "2026-01-07",
            "ts": "2026-01-07T16:02:00.000+08:00",
            "fx": { "usdCny": 7.0, "eurCny": 7.9, "sources": { "spot": "xe.com", "mid": "", "eur": "ecb" } },
            "commodities": { "wti": { "value": 72.0, "unit": "USD/bbl", "source": "x", "change": -0.4 } },
            "errors": { "other": "kept" }
        });

        let record: Record = serde_json::from_value(raw).unwrap();
        assert_eq!(record.fx.extra.get("eurCny"), Some(&json!(7.9)));
        assert_eq!(record.commodities["wti"].extra.get("change"), Some(&json!(-0.4)));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["fx"]["eurCny"], json!(7.9));
        assert_eq!(back["fx"]["sources"]["eur"], json!("ecb"));
        assert_eq!(back["commodities"]["wti"]["change"], json!(-0.4));
        assert_eq!(back["errors"]["other"], json!("kept"));
        assert_eq!(back["fx"]["usdCny"], json!(7.0));
    }

    #[test]
    fn test_legacy_nulls_read_as_defaults() {
        let raw = json!({
            "date": "2025-12-30",
            "ts": null,
            "fx": { "usdCny": 7.1, "sources": null },
            "commodities": { "wti": { "value": 72.0 }, "brent": { "value": null, "unit": null } },
            "errors": null
        });

        let record: Record = serde_json::from_value(raw).unwrap();
        assert_eq!(record.ts, "");
        assert_eq!(record.sort_key(), "2025-12-30");
        assert_eq!(record.fx.sources, FxSources::default());
        assert_eq!(record.commodities["wti"].value, Some(72.0));
        assert_eq!(record.commodities["wti"].unit, "");
        assert_eq!(record.commodities["brent"].source, "");
        assert_eq!(record.errors, RecordErrors::default());
    }

    #[test]
    fn test_wrong_types_still_fail() {
        let raw = json!({ "date": "2026-01-07", "ts": 1736238000, "commodities": {} });
        assert!(serde_json::from_value::<Record>(raw).is_err());
    }

    #[test]
    fn test_sort_key_falls_back_to_date() {
        let record = Record {
            date: "2025-12-30".to_string(),
            ..Default::default()
        };
        assert_eq!(record.sort_key(), "2025-12-30");
    }

    #[test]
    fn test_missing_detects_nan() {
        let obs = Observation::new(Some(f64::NAN), "CNY/t", "x");
        assert!(obs.is_missing());
        assert!(!Observation::new(Some(1.0), "CNY/t", "x").is_missing());
    }
}
