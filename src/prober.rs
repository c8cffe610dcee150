use crate::endpoint::{EndpointError, ReceiptEndpoint, ReceiptQuery};
use crate::error::{ReceiptSearchError, Result};
use crate::retry::retry_with_backoff;
use crate::schema::ProbeSettings;
use futures::future::join_all;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Found {
        receipt_number: i64,
        document_url: String,
    },
    NotFound,
}

impl ProbeResult {
    pub fn is_found(&self) -> bool {
        matches!(self, ProbeResult::Found { .. })
    }
}

/// Offsets around a forecast in the order they are tried: `0, +1, -1, +2, -2, ...`.
pub fn candidate_offsets(radius: u32) -> impl Iterator<Item = i64> {
    std::iter::once(0).chain((1..=i64::from(radius)).flat_map(|i| [i, -i]))
}

/// Walks the candidate window around a forecast until the document service confirms one.
pub struct CandidateProber {
    endpoint: Arc<dyn ReceiptEndpoint>,
    settings: ProbeSettings,
    cancel: CancellationToken,
}

impl CandidateProber {
    pub fn new(
        endpoint: Arc<dyn ReceiptEndpoint>,
        settings: ProbeSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            endpoint,
            settings,
            cancel,
        }
    }

    /// Checks `center + offset` for every offset within the search radius.
    ///
    /// Candidates are checked concurrently in batches of `batch_size`; a batch is
    /// only started once the previous one came back empty. When several
    /// candidates of one batch hit, the one closest to `center` wins.
    pub async fn probe(&self, center: i64, date: &str, customer_id: &str) -> Result<ProbeResult> {
        let offsets: Vec<i64> = candidate_offsets(self.settings.search_radius).collect();
        let batch_size = self.settings.batch_size.max(1);
        let mut checked = 0usize;

        for batch in offsets.chunks(batch_size) {
            if self.cancel.is_cancelled() {
                return Err(ReceiptSearchError::Cancelled);
            }

            let checks = batch
                .iter()
                .map(|offset| center + offset)
                .filter(|number| *number > 0)
                .map(|number| {
                    self.check_candidate(ReceiptQuery {
                        customer_id: customer_id.to_string(),
                        receipt_number: number,
                        date: date.to_string(),
                    })
                });
            let outcomes = join_all(checks).await;
            checked += outcomes.len();

            if let Some(query) = outcomes.into_iter().flatten().next() {
                info!(
                    "Receipt {} confirmed for {} after {} candidates (offset {})",
                    query.receipt_number,
                    date,
                    checked,
                    query.receipt_number - center
                );
                return Ok(ProbeResult::Found {
                    document_url: self.endpoint.document_url(&query),
                    receipt_number: query.receipt_number,
                });
            }
        }

        info!(
            "No receipt for {} within ±{} of {} ({} candidates)",
            date, self.settings.search_radius, center, checked
        );
        Ok(ProbeResult::NotFound)
    }

    /// Returns the query back when the candidate exists and has a non-empty body.
    async fn check_candidate(&self, query: ReceiptQuery) -> Option<ReceiptQuery> {
        if self.settings.pre_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.settings.pre_delay_ms)).await;
        }
        debug!(
            "trying date: {} with receipt number: {}",
            query.date, query.receipt_number
        );

        let exists = retry_with_backoff(
            &self.settings.retry,
            EndpointError::is_transient,
            |attempt, delay, err| {
                warn!(
                    "Receipt {} check failed ({}), retry {} in {:?}",
                    query.receipt_number, err, attempt, delay
                )
            },
            || self.endpoint.exists(&query),
        )
        .await;

        match exists {
            Ok(()) => {}
            Err(EndpointError::NotFound) => return None,
            Err(err) => {
                debug!("Receipt {} treated as absent: {}", query.receipt_number, err);
                return None;
            }
        }

        let body = retry_with_backoff(
            &self.settings.retry,
            EndpointError::is_transient,
            |attempt, delay, err| {
                warn!(
                    "Receipt {} download failed ({}), retry {} in {:?}",
                    query.receipt_number, err, attempt, delay
                )
            },
            || self.endpoint.fetch(&query),
        )
        .await;

        match body {
            Ok(bytes) if !bytes.is_empty() => Some(query),
            Ok(_) => {
                warn!(
                    "Receipt {} exists but returned an empty document",
                    query.receipt_number
                );
                None
            }
            Err(err) => {
                debug!("Receipt {} download failed: {}", query.receipt_number, err);
                None
            }
        }
    }
}
