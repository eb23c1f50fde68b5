/// quick start - register a court, quote a slot and book it
use chrono::{NaiveDate, TimeZone, Utc};
use court_booking_rs::{
    BookingEngine, BookingPolicy, BookingView, Court, CourtPricingConfig, CreateBookingRequest,
    Money, PriceOptions, SafeTimeProvider, TimeSource, Uuid,
};
use rust_decimal_macros::dec;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    ));
    let engine = BookingEngine::in_memory(BookingPolicy::default())?;

    // a $60/hour tennis court
    let owner = Uuid::new_v4();
    let court = Court::new(owner, "Centre Court", "tennis", CourtPricingConfig::flat(Money::from_major(60), "USD"));
    let court_id = engine.add_court(court)?;

    let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
    let player = Uuid::new_v4();

    // quote before booking
    let quote = engine.calculate_price(court_id, date, "14:00", "16:00", dec!(2), &PriceOptions::for_user(player), &time)?;
    println!("quote for 14:00-16:00: {} {}", quote.total_amount, quote.currency);

    let request = CreateBookingRequest::new(court_id, player, date, "14:00", "16:00")?;
    let booking = engine.create_booking(request, &time)?;
    println!("booked {}", booking.reference);

    // the neighbouring hour is blocked by the buffer
    let availability = engine.check_availability(court_id, date, "16:00", "17:00")?;
    println!("16:00-17:00 available: {}", availability.is_available());

    println!("{}", BookingView::from_booking(&booking).to_json_pretty()?);

    Ok(())
}
