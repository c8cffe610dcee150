use crate::error::{ReceiptSearchError, Result};
use crate::forecast::ExtrapolationJitter;
use crate::retry::RetryPolicy;
use crate::utils::parse_iso_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A known receipt number issued on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub date: NaiveDate,
    pub number: i64,
}

impl Reference {
    pub fn new(date: NaiveDate, number: i64) -> Self {
        Self { date, number }
    }
}

/// Meter numbers arrive as strings from the web form but as numbers from scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeterField {
    Number(i64),
    Text(String),
}

/// Raw body of a `POST /check-receipts` request.
///
/// Every field is optional here so that a missing field surfaces as
/// [`ReceiptSearchError::MissingParameters`] instead of a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub numero_cliente: Option<String>,
    #[serde(default)]
    pub numero_medidor: Option<MeterField>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub day_range: Option<Vec<i64>>,
}

/// Validated search parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub customer_id: String,
    pub meter_id: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Days of month to try, in caller order, without duplicates.
    pub day_candidates: Vec<u32>,
}

impl SearchRequest {
    pub fn validate(&self) -> Result<SearchParams> {
        let customer_id = self
            .numero_cliente
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ReceiptSearchError::MissingParameters)?;
        if !customer_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ReceiptSearchError::InvalidCustomer(customer_id.to_string()));
        }
        let start_raw = non_blank(self.start_date.as_deref())?;
        let end_raw = non_blank(self.end_date.as_deref())?;
        let days = self
            .day_range
            .as_ref()
            .filter(|days| !days.is_empty())
            .ok_or(ReceiptSearchError::MissingParameters)?;

        let start_date = parse_iso_date(start_raw)?;
        let end_date = parse_iso_date(end_raw)?;
        if end_date < start_date {
            return Err(ReceiptSearchError::EndBeforeStart);
        }

        let mut day_candidates: Vec<u32> = Vec::with_capacity(days.len());
        for &day in days {
            if !(1..=31).contains(&day) {
                return Err(ReceiptSearchError::InvalidDay(day));
            }
            let day = day as u32;
            if !day_candidates.contains(&day) {
                day_candidates.push(day);
            }
        }

        let meter_id = match &self.numero_medidor {
            None => None,
            Some(MeterField::Number(n)) => Some(*n),
            Some(MeterField::Text(s)) if s.trim().is_empty() => None,
            Some(MeterField::Text(s)) => Some(
                s.trim()
                    .parse::<i64>()
                    .map_err(|_| ReceiptSearchError::InvalidMeter(s.clone()))?,
            ),
        };

        Ok(SearchParams {
            customer_id: customer_id.to_string(),
            meter_id,
            start_date,
            end_date,
            day_candidates,
        })
    }
}

fn non_blank(value: Option<&str>) -> Result<&str> {
    value
        .filter(|s| !s.trim().is_empty())
        .ok_or(ReceiptSearchError::MissingParameters)
}

/// A receipt located during a search, as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRecord {
    pub url: String,
    /// `DD/MM/YYYY`
    pub date: String,
    pub receipt_number: i64,
}

pub const DEFAULT_SEARCH_RADIUS: u32 = 2_620;
pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_PRE_DELAY_MS: u64 = 50;

/// Knobs for the candidate prober.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Largest offset magnitude tried around the forecast.
    pub search_radius: u32,
    /// Number of candidates checked concurrently.
    pub batch_size: usize,
    /// Pause before every existence check.
    pub pre_delay_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            search_radius: DEFAULT_SEARCH_RADIUS,
            batch_size: DEFAULT_BATCH_SIZE,
            pre_delay_ms: DEFAULT_PRE_DELAY_MS,
            retry: RetryPolicy::default(),
        }
    }
}

/// Static configuration: the generic reference table of a known meter plus tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptFinderConfig {
    /// Meter the generic references were collected from.
    pub reference_meter_id: i64,
    pub references: Vec<Reference>,
    pub daily_increment: i64,
    pub monthly_increment: i64,
    #[serde(default)]
    pub probe: ProbeSettings,
    #[serde(default)]
    pub extrapolation_jitter: ExtrapolationJitter,
}

impl ReceiptFinderConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.references.is_empty() {
            return Err(ReceiptSearchError::InvalidConfig(
                "at least one generic reference is required".to_string(),
            ));
        }
        if self.monthly_increment < 0 || self.daily_increment < 0 {
            return Err(ReceiptSearchError::InvalidConfig(
                "increments must be non-negative".to_string(),
            ));
        }
        if self.probe.batch_size == 0 {
            return Err(ReceiptSearchError::InvalidConfig(
                "probe batch size must be at least 1".to_string(),
            ));
        }
        self.probe.retry.validate()
    }
}

impl Default for ReceiptFinderConfig {
    fn default() -> Self {
        let table: [(i32, u32, u32, i64); 15] = [
            (2023, 10, 11, 3_394_909),
            (2023, 11, 13, 3_473_215),
            (2023, 12, 12, 3_551_682),
            (2024, 1, 11, 3_630_447),
            (2024, 2, 12, 3_709_720),
            (2024, 3, 12, 3_790_710),
            (2024, 4, 11, 3_871_824),
            (2024, 5, 13, 3_953_051),
            (2024, 6, 11, 4_034_389),
            (2024, 7, 11, 4_115_905),
            (2024, 8, 12, 4_197_587),
            (2024, 9, 11, 4_279_334),
            (2024, 10, 14, 4_361_178),
            (2024, 11, 12, 4_443_046),
            (2024, 12, 11, 4_525_267),
        ];
        let references = table
            .iter()
            .filter_map(|&(y, m, d, number)| {
                NaiveDate::from_ymd_opt(y, m, d).map(|date| Reference::new(date, number))
            })
            .collect();

        Self {
            reference_meter_id: 205_877,
            references,
            daily_increment: 2_620,
            monthly_increment: 81_227,
            probe: ProbeSettings::default(),
            extrapolation_jitter: ExtrapolationJitter::None,
        }
    }
}
