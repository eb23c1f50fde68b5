/// cancellation - refund tiers as the start time approaches
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use court_booking_rs::{
    BookingEngine, BookingPolicy, CancelledBy, Court, CourtPricingConfig, CreateBookingRequest,
    Money, SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== refund tiers ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let engine = BookingEngine::in_memory(BookingPolicy::default())?;
    let court = Court::new(Uuid::new_v4(), "Court 2", "padel", CourtPricingConfig::flat(Money::from_major(60), "USD"));
    let court_id = engine.add_court(court)?;

    let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
    let player = Uuid::new_v4();
    let booking = engine.create_booking(
        CreateBookingRequest::new(court_id, player, date, "14:00", "16:00")?,
        &time,
    )?;
    engine.confirm_booking(booking.id, Some("pay_123".to_string()), &time)?;
    println!("booked {} for {}", booking.reference, booking.total_amount());

    // walk the clock towards the start and preview the refund
    let start = Utc.with_ymd_and_hms(2024, 6, 10, 14, 0, 0).unwrap();
    for hours_before in [72, 30, 10] {
        let target = start - Duration::hours(hours_before);
        controller.advance(target - time.now());
        let refund = engine.calculate_refund(booking.id, &time)?;
        println!(
            "  {}h before: eligible={} {}% = {}",
            hours_before, refund.eligible, refund.percentage, refund.amount
        );
    }

    // cancelling late still cancels, just without a refund
    let outcome = engine.cancel_booking(booking.id, CancelledBy::User(player), Some("injury".to_string()), &time)?;
    println!("\nstatus: {:?}, refund: {}", outcome.booking.status(), outcome.refund.amount);
    if let Some(reason) = outcome.refund.reason {
        println!("reason: {reason}");
    }

    println!("\nevents:");
    for event in engine.take_events() {
        println!("  {:?}", event);
    }

    Ok(())
}
