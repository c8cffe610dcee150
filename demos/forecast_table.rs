use chrono::NaiveDate;
use receipt_finder::*;

fn main() -> Result<()> {
    let config = ReceiptFinderConfig::default();
    let mut forecaster = Forecaster::new(&config);
    let mut store = ReferenceStore::new(config.references.clone());

    println!("Generic forecast (meter {}):", config.reference_meter_id);
    for month in 1..=6 {
        let Some(date) = NaiveDate::from_ymd_opt(2025, month, 12) else {
            continue;
        };
        let value = forecaster.forecast(date, &store, 0)?;
        println!("  {}  {:>9}", format_receipt_date(date), value);
    }

    // A confirmed receipt 420 below the trend pulls every later guess with it.
    let confirmed = parse_iso_date("2025-01-13")?;
    let trend = forecaster.forecast(confirmed, &store, 0)?;
    store.add_priority(Reference::new(confirmed, trend - 420));

    println!("\nAfter confirming {} on {}:", trend - 420, format_receipt_date(confirmed));
    for month in 2..=6 {
        let Some(date) = NaiveDate::from_ymd_opt(2025, month, 12) else {
            continue;
        };
        let value = forecaster.forecast(date, &store, 0)?;
        println!("  {}  {:>9}", format_receipt_date(date), value);
    }

    let other_meter = 205_876;
    println!(
        "\nMeter {} offset: {}",
        other_meter,
        forecaster.meter_offset(Some(other_meter))
    );

    Ok(())
}
