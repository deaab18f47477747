use chrono::{NaiveDate, NaiveDateTime};
use sportoase_core::{Clock, SystemClock};

use super::{print_json, CliResult, Context};

/// Explicit date, else the pinned clock, else today in the school's zone.
fn resolve_date(
    ctx: &Context,
    date: Option<NaiveDate>,
    now: Option<NaiveDateTime>,
) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    match (date, now) {
        (Some(date), _) => Ok(date),
        (None, Some(now)) => Ok(now.date()),
        (None, None) => Ok(SystemClock::from_name(&ctx.config.timezone)?.now().date()),
    }
}

/// Print the six periods of a day.
pub fn day(date: Option<NaiveDate>, now: Option<NaiveDateTime>) -> CliResult {
    let ctx = Context::open(now)?;
    let date = resolve_date(&ctx, date, now)?;
    print_json(&ctx.service.day_schedule(date)?)
}

/// Print Monday to Friday of the week containing the date.
pub fn week(date: Option<NaiveDate>, now: Option<NaiveDateTime>) -> CliResult {
    let ctx = Context::open(now)?;
    let date = resolve_date(&ctx, date, now)?;
    print_json(&ctx.service.week_overview(date)?)
}
