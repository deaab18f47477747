//! Slot administration: blocking and offer labels.

use chrono::{NaiveDate, Weekday};
use clap::{Args, Subcommand};
use sportoase_core::{DateRange, Period};

use super::{parse_period, print_json, ActorArgs, CliResult, Context};

#[derive(Args, Debug)]
pub struct BlockArgs {
    #[arg(long)]
    pub date: NaiveDate,
    #[arg(long, value_parser = parse_period)]
    pub period: Period,
    /// Shown to teachers instead of the offer
    #[arg(long, default_value = "")]
    pub reason: String,
}

#[derive(Args, Debug)]
pub struct BulkBlockArgs {
    /// First day (inclusive)
    #[arg(long)]
    pub from: NaiveDate,
    /// Last day (inclusive)
    #[arg(long)]
    pub to: NaiveDate,
    /// Period to block (repeatable; all six when omitted)
    #[arg(long = "period", value_parser = parse_period)]
    pub periods: Vec<Period>,
    #[arg(long, default_value = "")]
    pub reason: String,
}

#[derive(Subcommand)]
pub enum OfferAction {
    /// Override the offer shown for a weekday and period
    Set {
        /// Weekday (mon, tue, ...)
        weekday: Weekday,
        #[arg(value_parser = parse_period)]
        period: Period,
        label: String,
    },
    /// Remove an override
    Clear {
        weekday: Weekday,
        #[arg(value_parser = parse_period)]
        period: Period,
    },
    /// List all overrides
    List,
}

pub fn block(args: BlockArgs, actor: &ActorArgs) -> CliResult {
    let ctx = Context::open(None)?;
    let identity = actor.identity(&ctx.config)?;
    let blocked = ctx
        .service
        .block_slot(&identity, args.date, args.period, &args.reason)?;
    print_json(&serde_json::json!({
        "date": args.date,
        "period": args.period,
        "blocked": blocked,
    }))
}

pub fn unblock(date: NaiveDate, period: Period, actor: &ActorArgs) -> CliResult {
    let ctx = Context::open(None)?;
    let identity = actor.identity(&ctx.config)?;
    let removed = ctx.service.unblock_slot(&identity, date, period)?;
    print_json(&serde_json::json!({
        "date": date,
        "period": period,
        "unblocked": removed,
    }))
}

pub fn bulk_block(args: BulkBlockArgs, actor: &ActorArgs) -> CliResult {
    let ctx = Context::open(None)?;
    let identity = actor.identity(&ctx.config)?;
    let range = DateRange::new(args.from, args.to)?;
    let periods = (!args.periods.is_empty()).then_some(args.periods.as_slice());
    let summary = ctx
        .service
        .bulk_block(&identity, range, periods, &args.reason)?;
    print_json(&summary)
}

pub fn offer(action: OfferAction, actor: &ActorArgs) -> CliResult {
    let ctx = Context::open(None)?;
    match action {
        OfferAction::Set {
            weekday,
            period,
            label,
        } => {
            let identity = actor.identity(&ctx.config)?;
            ctx.service
                .set_offer_label(&identity, weekday, period, &label)?;
            println!("ok");
        }
        OfferAction::Clear { weekday, period } => {
            let identity = actor.identity(&ctx.config)?;
            let removed = ctx.service.clear_offer_label(&identity, weekday, period)?;
            println!("{}", if removed { "cleared" } else { "no override" });
        }
        OfferAction::List => print_json(&ctx.service.db().list_slot_name_overrides()?)?,
    }
    Ok(())
}
