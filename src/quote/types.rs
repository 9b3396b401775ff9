use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The quote endpoint sends `null` for fields it has no value for; treat
/// that the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A quote figure as the quote endpoint sends it: sometimes a JSON number,
/// sometimes preformatted text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Figure {
    Number(f64),
    Text(String),
}

impl Figure {
    /// Only genuine numbers count; numeric-looking text does not.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Figure::Number(n) if !n.is_nan() => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Figure::Number(n) => write!(f, "{}", n),
            Figure::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub market: String,
    #[serde(default)]
    pub price: Option<Figure>,
    #[serde(default)]
    pub change: Option<Figure>,
    #[serde(default)]
    pub change_percent: Option<Figure>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pts_price: Option<Figure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pts_time: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub industry: String,
    #[serde(default)]
    pub unit: Option<Figure>,
    #[serde(default)]
    pub per: Option<Figure>,
    #[serde(default)]
    pub pbr: Option<Figure>,
    #[serde(default)]
    pub dividend: Option<Figure>,
    #[serde(default)]
    pub credit_ratio: Option<Figure>,
    #[serde(default)]
    pub market_cap: Option<Figure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earnings_date: Option<String>,
}

/// One historical price bar
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBar {
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default)]
    pub open: Option<Figure>,
    #[serde(default)]
    pub high: Option<Figure>,
    #[serde(default)]
    pub low: Option<Figure>,
    #[serde(default)]
    pub close: Option<Figure>,
    #[serde(default)]
    pub change: Option<Figure>,
    #[serde(default)]
    pub change_percent: Option<Figure>,
    #[serde(default)]
    pub volume: Option<Figure>,
}

/// Last-known info of a security plus its price history. Replaced wholesale
/// on every fetch, never patched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub info: StockInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prices: Vec<PriceBar>,
}

impl QuoteSnapshot {
    /// Usable for a live diagnosis: named, positively priced, classified,
    /// and carrying at least one valuation ratio.
    pub fn is_valid(&self) -> bool {
        let info = &self.info;

        let has_name = !info.name.trim().is_empty();
        let has_price = info
            .price
            .as_ref()
            .and_then(Figure::as_number)
            .is_some_and(|p| p > 0.0);
        let has_industry = !info.industry.trim().is_empty();
        let has_ratio = [&info.per, &info.pbr]
            .iter()
            .any(|ratio| ratio.as_ref().and_then(Figure::as_number).is_some());

        has_name && has_price && has_industry && has_ratio
    }
}

/// Validity of an optional snapshot; absence is never valid.
pub fn is_snapshot_valid(snapshot: Option<&QuoteSnapshot>) -> bool {
    snapshot.is_some_and(QuoteSnapshot::is_valid)
}

/// Fields the validity check looks at, for diagnostics.
pub fn required_fields() -> &'static [&'static str] {
    &["name", "price", "industry", "per or pbr"]
}
