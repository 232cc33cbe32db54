use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticket_scanner::{
    authority_client::ScanAuthority,
    config::{Config, LogFormat},
    models::{Booking, BookingStatus, ScanOutcome, SeatTypeId},
    services::scan_session::ScanSession,
    AppState,
};

#[derive(Debug, Parser)]
#[command(name = "ticket-scanner", version, about = "Redeem booked tickets at the venue entrance")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show a booking and what is left to scan
    Lookup { code: String },
    /// Redeem everything remaining on a booking
    Full { code: String },
    /// Redeem tickets of one seat type
    Single {
        code: String,
        #[arg(long)]
        seat: i64,
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Redeem several seat types at once, e.g. --seat 7=2 --seat 8=1
    Bulk {
        code: String,
        #[arg(long = "seat", value_parser = parse_seat_quantity, required = true)]
        seats: Vec<(i64, i64)>,
    },
}

fn parse_seat_quantity(raw: &str) -> Result<(i64, i64), String> {
    let (seat, quantity) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SEAT=QUANTITY, got '{raw}'"))?;
    let seat = seat.trim().parse().map_err(|_| format!("invalid seat type '{seat}'"))?;
    let quantity = quantity
        .trim()
        .parse()
        .map_err(|_| format!("invalid quantity '{quantity}'"))?;
    Ok((seat, quantity))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    let registry = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log));
    match config.app.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    info!(environment = %config.app.environment, "Starting ticket scanner");

    let state = AppState::new(config).context("failed to initialize scanner")?;
    let mut session = state.scan_session();

    match cli.command {
        Command::Lookup { code } => {
            load(&mut session, &code).await?;
        }
        Command::Full { code } => {
            if load(&mut session, &code).await? == BookingStatus::Redeemable {
                let outcome = session.submit_full_scan().await?;
                print_outcome(&outcome, session.booking());
            }
        }
        Command::Single {
            code,
            seat,
            quantity,
        } => {
            if load(&mut session, &code).await? == BookingStatus::Redeemable {
                session.select_seat(SeatTypeId(seat))?;
                let staged = session.set_single_quantity(quantity)?;
                if i64::from(staged) != quantity {
                    println!("Quantity adjusted to {staged}");
                }
                let outcome = session.submit_single().await?;
                print_outcome(&outcome, session.booking());
            }
        }
        Command::Bulk { code, seats } => {
            if load(&mut session, &code).await? == BookingStatus::Redeemable {
                session.begin_bulk_selection()?;
                for (seat, quantity) in seats {
                    let staged = session.set_bulk_quantity(SeatTypeId(seat), quantity)?;
                    if i64::from(staged) != quantity {
                        println!("Seat type {seat}: quantity adjusted to {staged}");
                    }
                }
                let outcome = session.submit_bulk().await?;
                print_outcome(&outcome, session.booking());
            }
        }
    }

    Ok(())
}

async fn load<A: ScanAuthority>(
    session: &mut ScanSession<A>,
    code: &str,
) -> anyhow::Result<BookingStatus> {
    let status = session.load_booking(code).await?;
    if let Some(booking) = session.booking() {
        print_booking(booking);
    }
    match status {
        BookingStatus::FullyScanned => println!("All tickets on this booking are already scanned"),
        BookingStatus::NoSeats => println!("This booking has no seats"),
        BookingStatus::Redeemable => {}
    }
    Ok(status)
}

fn print_booking(booking: &Booking) {
    println!(
        "Booking {} (#{}){}",
        booking.booking_code,
        booking.booking_id,
        booking
            .event_name
            .as_deref()
            .map(|name| format!(" - {name}"))
            .unwrap_or_default()
    );
    println!("{:>8}  {:<24} {:>6} {:>8} {:>10}", "SEAT", "NAME", "TOTAL", "SCANNED", "REMAINING");
    for line in &booking.seats {
        println!(
            "{:>8}  {:<24} {:>6} {:>8} {:>10}",
            line.seat_type_id,
            line.seat_name,
            line.quantity,
            line.scanned_quantity,
            line.remaining()
        );
    }
}

fn print_outcome(outcome: &ScanOutcome, booking: Option<&Booking>) {
    println!("Scan status: {:?}", outcome.status);
    if let Some(message) = &outcome.message {
        println!("{message}");
    }
    for result in &outcome.results {
        println!(
            "  seat type {}: requested {}, scanned {}, remaining {}",
            result.seat_type_id,
            result.requested_quantity,
            result.scanned_quantity,
            result.remaining_quantity
        );
    }
    match (outcome.refreshed, booking) {
        (true, Some(booking)) => print_booking(booking),
        _ => println!("Booking could not be refreshed, run lookup to see current counts"),
    }
}
