//! # SportOase Core Library
//!
//! Reservation engine for a school activity room: teachers book a small group
//! of students into one of six daily periods, admins close slots and rename
//! offers. All operations are available through the `sportoase-cli` binary,
//! which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Calendar**: period times, fixed weekly offers and the free-module catalog
//! - **Booking**: ordered admission checks, time policy, occupancy and schedule views
//! - **Storage**: SQLite reservation store and TOML configuration
//! - **Notify**: post-commit event bus with pluggable sinks
//! - **Identity**: roles and provider-claim mapping
//!
//! ## Key Components
//!
//! - [`BookingService`]: book, edit, cancel and administer slots
//! - [`AdmissionController`]: decides whether a request may take a slot
//! - [`ReservationDb`]: persistence with serialized slot writes
//! - [`Config`]: application configuration management

pub mod booking;
pub mod calendar;
pub mod clock;
pub mod error;
pub mod identity;
pub mod notify;
pub mod service;
pub mod storage;

pub use booking::{
    AdmissionController, BookingRequest, BookingRules, DateRange, DaySchedule, Outcome,
    RejectReason, Rejection, Reservation, ReservationId, SlotSummary, Student,
};
pub use calendar::{Calendar, Offer, OfferKind, Period};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use identity::{Identity, KeywordRoleMapper, ProviderClaims, Role, RoleMapper, RoleResolution};
pub use notify::{Event, NotificationDispatcher, NotificationSink};
pub use service::BookingService;
pub use storage::{BulkBlockSummary, Config, ReservationDb};
