use chrono::NaiveDateTime;
use clap::Args;
use sportoase_core::booking::BookingRequest;
use sportoase_core::{ReservationId, Student};

use super::{parse_student, print_json, report, ActorArgs, CliResult, Context};

/// Fields of a booking form.
#[derive(Args, Debug)]
pub struct FormArgs {
    /// Slot date (YYYY-MM-DD)
    #[arg(long)]
    pub date: String,
    /// Period number (1-6)
    #[arg(long)]
    pub period: i64,
    /// Requesting teacher's name
    #[arg(long)]
    pub requester: String,
    /// Requesting teacher's class
    #[arg(long = "class")]
    pub requester_class: String,
    /// Student as NAME:CLASS (repeatable, 1-5)
    #[arg(long = "student", value_name = "NAME:CLASS", value_parser = parse_student)]
    pub students: Vec<Student>,
    /// Module for a free-choice slot
    #[arg(long)]
    pub module: Option<String>,
    #[arg(long, default_value = "")]
    pub notes: String,
}

impl FormArgs {
    fn into_request(self, on_behalf_of: Option<String>) -> BookingRequest {
        BookingRequest {
            date: self.date,
            period: self.period,
            requester_name: self.requester,
            requester_class: self.requester_class,
            students: self.students,
            module: self.module,
            notes: self.notes,
            on_behalf_of,
        }
    }
}

#[derive(Args, Debug)]
pub struct BookArgs {
    #[command(flatten)]
    pub form: FormArgs,
    /// Book for another teacher's id (admin only)
    #[arg(long = "for", value_name = "ID")]
    pub on_behalf_of: Option<String>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Reservation id
    pub id: i64,
    #[command(flatten)]
    pub form: FormArgs,
    /// Hand the reservation to another teacher's id (admin only)
    #[arg(long = "for", value_name = "ID")]
    pub on_behalf_of: Option<String>,
}

pub fn book(args: BookArgs, actor: &ActorArgs, now: Option<NaiveDateTime>) -> CliResult {
    let ctx = Context::open(now)?;
    let identity = actor.identity(&ctx.config)?;
    let request = args.form.into_request(args.on_behalf_of);
    report(ctx.service.book(&identity, &request)?)
}

pub fn edit(args: EditArgs, actor: &ActorArgs, now: Option<NaiveDateTime>) -> CliResult {
    let ctx = Context::open(now)?;
    let identity = actor.identity(&ctx.config)?;
    let request = args.form.into_request(args.on_behalf_of);
    report(ctx.service.edit(&identity, ReservationId(args.id), &request)?)
}

pub fn cancel(id: i64, actor: &ActorArgs, now: Option<NaiveDateTime>) -> CliResult {
    let ctx = Context::open(now)?;
    let identity = actor.identity(&ctx.config)?;
    report(ctx.service.cancel(&identity, ReservationId(id))?)
}

pub fn show(id: i64) -> CliResult {
    let ctx = Context::open(None)?;
    match ctx.service.reservation(ReservationId(id))? {
        Some(reservation) => print_json(&reservation),
        None => Err(format!("reservation {id} not found").into()),
    }
}

pub fn mine(actor: &ActorArgs) -> CliResult {
    let ctx = Context::open(None)?;
    let identity = actor.identity(&ctx.config)?;
    print_json(&ctx.service.reservations_of(&identity)?)
}
