use crate::endpoint::ReceiptEndpoint;
use crate::error::{ReceiptSearchError, Result};
use crate::forecast::Forecaster;
use crate::prober::{CandidateProber, ProbeResult};
use crate::references::ReferenceStore;
use crate::schema::{ReceiptFinderConfig, ReceiptRecord, Reference, SearchParams, SearchRequest};
use crate::utils::{candidate_date, format_receipt_date, month_anchor};
use log::{debug, info};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs receipt searches against one document service.
///
/// The configuration is shared and immutable; every call to [`ReceiptSearch::run`]
/// gets its own reference store and forecaster.
#[derive(Clone)]
pub struct ReceiptSearch {
    config: Arc<ReceiptFinderConfig>,
    endpoint: Arc<dyn ReceiptEndpoint>,
}

impl ReceiptSearch {
    pub fn new(config: ReceiptFinderConfig, endpoint: Arc<dyn ReceiptEndpoint>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            endpoint,
        })
    }

    #[cfg(all(test, feature = "server"))]
    pub(crate) fn new_unchecked(
        config: ReceiptFinderConfig,
        endpoint: Arc<dyn ReceiptEndpoint>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            endpoint,
        }
    }

    pub fn config(&self) -> &ReceiptFinderConfig {
        &self.config
    }

    /// Validates a raw request and runs it to completion.
    pub async fn handle(&self, request: &SearchRequest) -> Result<Vec<ReceiptRecord>> {
        let params = request.validate()?;
        self.run(&params).await
    }

    pub async fn run(&self, params: &SearchParams) -> Result<Vec<ReceiptRecord>> {
        self.run_with_cancel(params, CancellationToken::new()).await
    }

    /// Searches month by month, at most one receipt per month.
    ///
    /// Month `k` is anchored on the start date moved `k` months forward; months
    /// whose anchor is not before the end date are not searched. Within a month the
    /// day candidates are tried in order and the first confirmed receipt ends the
    /// month. Each confirmed receipt becomes a priority reference for later months.
    pub async fn run_with_cancel(
        &self,
        params: &SearchParams,
        cancel: CancellationToken,
    ) -> Result<Vec<ReceiptRecord>> {
        let mut store = ReferenceStore::new(self.config.references.clone());
        let mut forecaster = Forecaster::new(&self.config);
        let prober = CandidateProber::new(
            self.endpoint.clone(),
            self.config.probe.clone(),
            cancel.clone(),
        );
        let offset = forecaster.meter_offset(params.meter_id);

        info!(
            "Searching receipts for customer {} from {} to {} (days {:?}, meter offset {})",
            params.customer_id, params.start_date, params.end_date, params.day_candidates, offset
        );

        let mut results = Vec::new();
        for month in 0u32.. {
            let Some(anchor) = month_anchor(params.start_date, month) else {
                break;
            };
            if anchor >= params.end_date {
                break;
            }
            if cancel.is_cancelled() {
                return Err(ReceiptSearchError::Cancelled);
            }

            for &day in &params.day_candidates {
                let Some(date) = candidate_date(anchor, day) else {
                    debug!("Skipping day {} in {}: no such date", day, anchor.format("%Y-%m"));
                    continue;
                };
                if date < params.start_date || date > params.end_date {
                    continue;
                }

                let formatted = format_receipt_date(date);
                let center = forecaster.forecast(date, &store, offset)?;
                debug!("Forecast for {}: {}", formatted, center);

                match prober.probe(center, &formatted, &params.customer_id).await? {
                    ProbeResult::Found {
                        receipt_number,
                        document_url,
                    } => {
                        store.add_priority(Reference::new(date, receipt_number));
                        results.push(ReceiptRecord {
                            url: document_url,
                            date: formatted,
                            receipt_number,
                        });
                        break;
                    }
                    ProbeResult::NotFound => {}
                }
            }
        }

        info!(
            "Search for customer {} finished with {} receipts",
            params.customer_id,
            results.len()
        );
        Ok(results)
    }
}
