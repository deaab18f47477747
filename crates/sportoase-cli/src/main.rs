use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::ActorArgs;

#[derive(Parser)]
#[command(name = "sportoase-cli", version, about = "SportOase slot reservations")]
struct Cli {
    #[command(flatten)]
    actor: ActorArgs,

    /// Pin the current time (YYYY-MM-DDTHH:MM:SS)
    #[arg(long, global = true, hide = true)]
    now: Option<NaiveDateTime>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Book students into a slot
    Book(commands::booking::BookArgs),
    /// Replace the details of a reservation
    Edit(commands::booking::EditArgs),
    /// Cancel a reservation
    Cancel {
        /// Reservation id
        id: i64,
    },
    /// Show one reservation
    Show {
        /// Reservation id
        id: i64,
    },
    /// List the caller's reservations
    Mine,
    /// Day schedule with occupancy per period
    Day {
        /// Date (defaults to today)
        date: Option<NaiveDate>,
    },
    /// Monday to Friday overview
    Week {
        /// Any date in the week (defaults to today)
        date: Option<NaiveDate>,
    },
    /// Block a slot (admin)
    Block(commands::admin::BlockArgs),
    /// Reopen a blocked slot (admin)
    Unblock {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, value_parser = commands::parse_period)]
        period: sportoase_core::Period,
    },
    /// Block a date range (admin)
    BulkBlock(commands::admin::BulkBlockArgs),
    /// Offer label overrides
    Offer {
        #[command(subcommand)]
        action: commands::admin::OfferAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let actor = &cli.actor;
    let now = cli.now;
    let result = match cli.command {
        Commands::Book(args) => commands::booking::book(args, actor, now),
        Commands::Edit(args) => commands::booking::edit(args, actor, now),
        Commands::Cancel { id } => commands::booking::cancel(id, actor, now),
        Commands::Show { id } => commands::booking::show(id),
        Commands::Mine => commands::booking::mine(actor),
        Commands::Day { date } => commands::schedule::day(date, now),
        Commands::Week { date } => commands::schedule::week(date, now),
        Commands::Block(args) => commands::admin::block(args, actor),
        Commands::Unblock { date, period } => commands::admin::unblock(date, period, actor),
        Commands::BulkBlock(args) => commands::admin::bulk_block(args, actor),
        Commands::Offer { action } => commands::admin::offer(action, actor),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
