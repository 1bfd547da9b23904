//! J-Quants daily quotes provider.
//!
//! `GET /v1/prices/daily_quotes?code=..&date_from=..&date_to=..` with a bearer
//! token. The API has shipped both `daily_quotes` and `data` as the array key
//! and both `Open` and `OpeningPrice` style field names, so the body is read
//! as loose JSON and mapped through the shared alias table.

use super::columns::{canonical_column, parse_date, parse_number, Column};
use super::provider::{DataError, DataProvider, DataSource, FetchResult, RawBar};
use chrono::NaiveDate;
use serde_json::Value;
use std::time::Duration;

pub const DAILY_QUOTES_URL: &str = "https://api.jquants.com/v1/prices/daily_quotes";

/// Environment variable holding the API token.
pub const API_KEY_ENV: &str = "JQUANTS_API_KEY";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// J-Quants HTTP provider. No retries; a failed request is an error.
pub struct JQuantsProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
}

impl JQuantsProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, DataError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(DataError::AuthenticationRequired(format!(
                "{API_KEY_ENV} is empty"
            )));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DataError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            base_url: DAILY_QUOTES_URL.to_string(),
        })
    }

    /// Read the token from `JQUANTS_API_KEY`.
    pub fn from_env() -> Result<Self, DataError> {
        let key = std::env::var(API_KEY_ENV)
            .map_err(|_| DataError::AuthenticationRequired(format!("{API_KEY_ENV} is not set")))?;
        Self::new(key)
    }

    /// Point the provider at another endpoint (a proxy or a local stub).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value, DataError> {
        let resp = self
            .client
            .get(&self.base_url)
            .bearer_auth(&self.api_key)
            .query(&[
                ("code", code.to_string()),
                ("date_from", start.format("%Y-%m-%d").to_string()),
                ("date_to", end.format("%Y-%m-%d").to_string()),
            ])
            .send()
            .map_err(|e| DataError::Network(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DataError::AuthenticationRequired(format!(
                "J-Quants rejected the token (HTTP {status})"
            )));
        }
        if !status.is_success() {
            return Err(DataError::Http {
                provider: "jquants".into(),
                status: status.as_u16(),
            });
        }

        resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {code}: {e}"))
        })
    }
}

impl DataProvider for JQuantsProvider {
    fn name(&self) -> &str {
        "jquants"
    }

    fn fetch(
        &self,
        instrument_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        tracing::info!(instrument = instrument_id, %start, %end, "requesting J-Quants daily quotes");
        let body = self.request(instrument_id, start, end)?;
        let bars = parse_quotes(&body, instrument_id)?;
        if bars.is_empty() {
            return Err(DataError::NoData {
                instrument_id: instrument_id.to_string(),
                start,
                end,
            });
        }
        Ok(FetchResult {
            instrument_id: instrument_id.to_string(),
            bars,
            source: DataSource::JQuants,
        })
    }
}

/// Map a daily-quotes response body to raw bars stamped with `code`.
///
/// Quotes without a parseable date are skipped.
pub fn parse_quotes(body: &Value, code: &str) -> Result<Vec<RawBar>, DataError> {
    let quotes = match body {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("daily_quotes")
            .or_else(|| map.get("data"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                DataError::ResponseFormatChanged(
                    "expected a 'daily_quotes' or 'data' array".into(),
                )
            })?,
        _ => {
            return Err(DataError::ResponseFormatChanged(
                "response body is not a JSON object".into(),
            ))
        }
    };

    let mut bars = Vec::with_capacity(quotes.len());
    for quote in quotes {
        let Some(fields) = quote.as_object() else {
            continue;
        };
        let mut bar: Option<RawBar> = None;
        let mut values = [f64::NAN; 5];
        for (key, value) in fields {
            match canonical_column(key) {
                Some(Column::Date) => {
                    bar = value.as_str().and_then(parse_date).map(RawBar::empty);
                }
                Some(Column::Open) => values[0] = json_number(value),
                Some(Column::High) => values[1] = json_number(value),
                Some(Column::Low) => values[2] = json_number(value),
                Some(Column::Close) => values[3] = json_number(value),
                Some(Column::Volume) => values[4] = json_number(value),
                Some(Column::Code) | None => {}
            }
        }
        let Some(mut bar) = bar else {
            continue;
        };
        let [open, high, low, close, volume] = values;
        bar.instrument_id = Some(code.to_string());
        bar.open = open;
        bar.high = high;
        bar.low = low;
        bar.close = close;
        bar.volume = volume;
        bars.push(bar);
    }
    Ok(bars)
}

fn json_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => parse_number(s),
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_daily_quotes_key() {
        let body = json!({
            "daily_quotes": [
                {"Date": "2024-01-04", "Code": "72030", "Open": 2500.0, "High": 2560.0,
                 "Low": 2480.0, "Close": 2540.0, "Volume": 1200000.0},
                {"Date": "2024-01-05", "Code": "72030", "Open": null, "High": 2600.0,
                 "Low": 2500.0, "Close": 2590.0, "Volume": 900000}
            ]
        });
        let bars = parse_quotes(&body, "7203").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 2540.0);
        assert_eq!(bars[0].instrument_id.as_deref(), Some("7203"));
        assert!(bars[1].open.is_nan());
        assert_eq!(bars[1].volume, 900_000.0);
    }

    #[test]
    fn parses_data_key_with_long_field_names() {
        let body = json!({
            "data": [
                {"Date": "2024-01-04", "OpeningPrice": 10, "HighPrice": 12,
                 "LowPrice": 9, "ClosingPrice": 11, "TradingVolume": 500}
            ]
        });
        let bars = parse_quotes(&body, "6758").unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].open, 10.0);
        assert_eq!(bars[0].high, 12.0);
        assert_eq!(bars[0].low, 9.0);
        assert_eq!(bars[0].close, 11.0);
        assert_eq!(bars[0].volume, 500.0);
    }

    #[test]
    fn quotes_without_dates_are_skipped() {
        let body = json!({"daily_quotes": [{"Open": 1.0}, {"Date": "bad", "Open": 1.0}]});
        assert!(parse_quotes(&body, "7203").unwrap().is_empty());
    }

    #[test]
    fn unexpected_shape_is_format_error() {
        let body = json!({"message": "The incoming token is invalid or expired."});
        assert!(matches!(
            parse_quotes(&body, "7203"),
            Err(DataError::ResponseFormatChanged(_))
        ));
        assert!(matches!(
            parse_quotes(&json!("oops"), "7203"),
            Err(DataError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            JQuantsProvider::new("  "),
            Err(DataError::AuthenticationRequired(_))
        ));
    }
}
