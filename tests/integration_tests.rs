use async_trait::async_trait;
use chrono::NaiveDate;
use receipt_finder::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Document service backed by a fixed table of valid receipts per date.
#[derive(Default)]
struct SimulatedService {
    receipts: HashMap<String, i64>,
    throttled_calls: AtomicU32,
    exists_calls: AtomicUsize,
    per_date: Mutex<HashMap<String, usize>>,
}

impl SimulatedService {
    fn new(receipts: HashMap<String, i64>) -> Self {
        Self {
            receipts,
            ..Self::default()
        }
    }

    fn calls_for(&self, date: &str) -> usize {
        self.per_date.lock().unwrap().get(date).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ReceiptEndpoint for SimulatedService {
    async fn exists(&self, query: &ReceiptQuery) -> std::result::Result<(), EndpointError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .per_date
            .lock()
            .unwrap()
            .entry(query.date.clone())
            .or_insert(0) += 1;

        let throttled = self
            .throttled_calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            return Err(EndpointError::RateLimited);
        }

        match self.receipts.get(&query.date) {
            Some(number) if *number == query.receipt_number => Ok(()),
            _ => Err(EndpointError::NotFound),
        }
    }

    async fn fetch(&self, query: &ReceiptQuery) -> std::result::Result<Vec<u8>, EndpointError> {
        match self.receipts.get(&query.date) {
            Some(number) if *number == query.receipt_number => Ok(b"%PDF-1.7 receipt".to_vec()),
            _ => Err(EndpointError::NotFound),
        }
    }

    fn document_url(&self, query: &ReceiptQuery) -> String {
        build_document_url(DEFAULT_DOCUMENT_URL, query)
    }
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn config(radius: u32, batch_size: usize) -> ReceiptFinderConfig {
    ReceiptFinderConfig {
        probe: ProbeSettings {
            search_radius: radius,
            batch_size,
            pre_delay_ms: 25,
            retry: RetryPolicy::default(),
        },
        ..ReceiptFinderConfig::default()
    }
}

fn generic(date: NaiveDate) -> i64 {
    two_point_forecast(date, &ReceiptFinderConfig::default().references).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_year_of_receipts_with_constant_meter_gap() {
    // The customer's receipts for each 12th trail the reference meter by 350.
    let mut receipts = HashMap::new();
    for month in 1..=12 {
        let date = ymd(2024, month, 12);
        receipts.insert(format_receipt_date(date), generic(date) - 350);
    }
    let service = Arc::new(SimulatedService::new(receipts.clone()));
    let search = ReceiptSearch::new(config(1_000, 10), service.clone()).unwrap();

    let results = search
        .run(&SearchParams {
            customer_id: "3001234".to_string(),
            meter_id: None,
            start_date: ymd(2024, 1, 1),
            end_date: ymd(2024, 12, 31),
            day_candidates: vec![12],
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 12);
    for (record, month) in results.iter().zip(1..=12) {
        let date = ymd(2024, month, 12);
        assert_eq!(record.date, format_receipt_date(date));
        assert_eq!(record.receipt_number, receipts[&record.date]);
        assert!(record.url.starts_with(DEFAULT_DOCUMENT_URL));
    }

    // January pays for the walk out to -350; every later month is recentred.
    assert_eq!(service.calls_for("12/01/2024"), 710);
    for month in 2..=12 {
        let date = format_receipt_date(ymd(2024, month, 12));
        assert!(
            service.calls_for(&date) <= 10,
            "{} needed {} calls",
            date,
            service.calls_for(&date)
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_meter_offset_centres_first_guess() {
    // Meter 205876 issues receipts one below the reference meter.
    let mut receipts = HashMap::new();
    for (month, day) in [(3, 12), (4, 11), (5, 13)] {
        let date = ymd(2024, month, day);
        receipts.insert(format_receipt_date(date), generic(date) - 1);
    }
    let service = Arc::new(SimulatedService::new(receipts));
    let search = ReceiptSearch::new(config(100, 1), service.clone()).unwrap();

    let request = SearchRequest {
        numero_cliente: Some("3001234".to_string()),
        numero_medidor: Some(MeterField::Text("205876".to_string())),
        start_date: Some("2024-03-01".to_string()),
        end_date: Some("2024-05-31".to_string()),
        day_range: Some(vec![11, 12, 13]),
    };
    let results = search.handle(&request).await.unwrap();

    let dates: Vec<&str> = results.iter().map(|r| r.date.as_str()).collect();
    assert_eq!(dates, vec!["12/03/2024", "11/04/2024", "13/05/2024"]);

    // March: day 11 walks the whole radius, day 12 hits straight away.
    assert_eq!(service.calls_for("11/03/2024"), 201);
    assert_eq!(service.calls_for("12/03/2024"), 1);
    assert_eq!(service.calls_for("11/04/2024"), 1);
    assert_eq!(service.calls_for("12/04/2024"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_throttling_is_absorbed_by_retries() {
    let date = ymd(2024, 6, 11);
    let mut receipts = HashMap::new();
    receipts.insert(format_receipt_date(date), generic(date) + 2);
    let service = Arc::new(SimulatedService {
        throttled_calls: AtomicU32::new(6),
        ..SimulatedService::new(receipts)
    });
    let search = ReceiptSearch::new(config(10, 5), service.clone()).unwrap();

    let results = search
        .run(&SearchParams {
            customer_id: "3001234".to_string(),
            meter_id: None,
            start_date: ymd(2024, 6, 1),
            end_date: ymd(2024, 6, 30),
            day_candidates: vec![11],
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].receipt_number, generic(date) + 2);
}

#[tokio::test(start_paused = true)]
async fn test_months_without_receipts_are_left_out() {
    let mut receipts = HashMap::new();
    let february = ymd(2024, 2, 12);
    receipts.insert(format_receipt_date(february), generic(february));
    let service = Arc::new(SimulatedService::new(receipts));
    let search = ReceiptSearch::new(config(20, 8), service.clone()).unwrap();

    let results = search
        .run(&SearchParams {
            customer_id: "3001234".to_string(),
            meter_id: None,
            start_date: ymd(2024, 1, 5),
            end_date: ymd(2024, 3, 20),
            day_candidates: vec![12],
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].date, "12/02/2024");
    assert_eq!(service.calls_for("12/01/2024"), 41);
    assert_eq!(service.calls_for("12/03/2024"), 41);
}

#[tokio::test(start_paused = true)]
async fn test_extrapolates_past_reference_table() {
    // Past the last reference the counter keeps its December pace.
    let date = ymd(2025, 1, 13);
    let expected = generic(date);
    assert!(expected > 4_525_267);

    let mut receipts = HashMap::new();
    receipts.insert(format_receipt_date(date), expected + 5);
    let service = Arc::new(SimulatedService::new(receipts));
    let search = ReceiptSearch::new(config(10, 4), service.clone()).unwrap();

    let results = search
        .run(&SearchParams {
            customer_id: "3001234".to_string(),
            meter_id: None,
            start_date: ymd(2025, 1, 1),
            end_date: ymd(2025, 1, 31),
            day_candidates: vec![13],
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].receipt_number, expected + 5);
    assert_eq!(results[0].date, "13/01/2025");
}

#[tokio::test(start_paused = true)]
async fn test_invalid_requests_make_no_calls() {
    let service = Arc::new(SimulatedService::default());
    let search = ReceiptSearch::new(config(10, 4), service.clone()).unwrap();

    let reversed = SearchRequest {
        numero_cliente: Some("3001234".to_string()),
        numero_medidor: None,
        start_date: Some("2024-05-01".to_string()),
        end_date: Some("2024-04-01".to_string()),
        day_range: Some(vec![11]),
    };
    let err = search.handle(&reversed).await.unwrap_err();
    assert!(matches!(err, ReceiptSearchError::EndBeforeStart));
    assert!(err.is_validation());

    let no_days = SearchRequest {
        day_range: Some(vec![]),
        ..reversed
    };
    assert!(matches!(
        search.handle(&no_days).await,
        Err(ReceiptSearchError::MissingParameters)
    ));
    assert_eq!(service.exists_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_config_rejects_empty_reference_table() {
    let service: Arc<dyn ReceiptEndpoint> = Arc::new(SimulatedService::default());
    let config = ReceiptFinderConfig {
        references: vec![],
        ..ReceiptFinderConfig::default()
    };
    assert!(matches!(
        ReceiptSearch::new(config, service),
        Err(ReceiptSearchError::InvalidConfig(_))
    ));
}
