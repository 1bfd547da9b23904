//! Column-name normalization shared by the CSV and J-Quants providers.
//!
//! Sources disagree on header spelling (`Close`, `close_price`,
//! `ClosingPrice`, ...). Every header is trimmed, lowercased and looked up in
//! one alias table.

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Date,
    Code,
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Column {
    /// Columns every source must provide. `Code` is optional.
    pub const REQUIRED: [Column; 6] = [
        Column::Date,
        Column::Open,
        Column::High,
        Column::Low,
        Column::Close,
        Column::Volume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Date => "date",
            Column::Code => "code",
            Column::Open => "open",
            Column::High => "high",
            Column::Low => "low",
            Column::Close => "close",
            Column::Volume => "volume",
        }
    }
}

/// Map a source header to its canonical column, if recognised.
pub fn canonical_column(header: &str) -> Option<Column> {
    let key = header.trim().to_ascii_lowercase();
    let column = match key.as_str() {
        "date" => Column::Date,
        "code" | "stock_code" => Column::Code,
        "open" | "open_price" | "openingprice" => Column::Open,
        "high" | "high_price" | "highprice" => Column::High,
        "low" | "low_price" | "lowprice" => Column::Low,
        "close" | "close_price" | "closingprice" => Column::Close,
        "volume" | "trading_volume" | "tradingvolume" => Column::Volume,
        _ => return None,
    };
    Some(column)
}

/// Parse a numeric cell, coercing blanks and garbage to `NaN`.
pub fn parse_number(cell: &str) -> f64 {
    let cell = cell.trim().replace(',', "");
    if cell.is_empty() {
        return f64::NAN;
    }
    cell.parse::<f64>().unwrap_or(f64::NAN)
}

/// Parse a date cell. Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYYMMDD`, and
/// datetimes whose first ten characters are one of the dashed/slashed forms.
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(cell, fmt) {
            return Some(date);
        }
    }
    let prefix = cell.get(..10)?;
    ["%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(prefix, fmt).ok())
}
