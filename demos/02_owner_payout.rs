/// owner payout - settle a month of completed bookings
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use court_booking_rs::{
    BookingEngine, BookingPolicy, Court, CourtPricingConfig, CreateBookingRequest, Money,
    PayoutView, SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== owner payout ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let engine = BookingEngine::in_memory(BookingPolicy::default())?;
    let owner = Uuid::new_v4();
    let court = Court::new(owner, "Riverside", "tennis", CourtPricingConfig::flat(Money::from_major(40), "USD"));
    let court_id = engine.add_court(court)?;

    // three evenings of play
    for day in [3, 4, 5] {
        let date = NaiveDate::from_ymd_opt(2024, 6, day).unwrap();
        let request = CreateBookingRequest::new(court_id, Uuid::new_v4(), date, "18:00", "19:30")?;
        let booking = engine.create_booking(request, &time)?;
        engine.confirm_booking(booking.id, None, &time)?;
    }

    controller.advance(Duration::days(30));
    let completed = engine.complete_elapsed(&time)?;
    println!("completed {} bookings by {}", completed.len(), time.now().format("%Y-%m-%d"));

    let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    let preview = engine.calculate_owner_payout(owner, start, end)?;
    println!("revenue: {}", preview.total_revenue);
    println!("commission: {}", preview.platform_fee);
    println!("net: {}", preview.net_amount);

    let payout = engine.create_payout(owner, start, end, &time)?;
    engine.mark_payout_processing(payout.id, &time)?;
    let payout = engine.complete_payout(payout.id, Some("tr_0001".to_string()), &time)?;

    // nothing left to claim for the same period
    match engine.create_payout(owner, start, end, &time) {
        Ok(_) => println!("\nunexpected second payout"),
        Err(e) => println!("\nsecond payout refused: {e}"),
    }

    println!("\n{}", PayoutView::from_payout(&payout).to_json_pretty()?);

    Ok(())
}
