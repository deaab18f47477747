pub mod admin;
pub mod booking;
pub mod config;
pub mod schedule;

use chrono::NaiveDateTime;
use clap::Args;
use serde::Serialize;
use sportoase_core::booking::Outcome;
use sportoase_core::{
    BookingService, Config, FixedClock, Identity, KeywordRoleMapper, Period, ProviderClaims,
    RoleMapper, RoleResolution, Student,
};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Exit code for requests the booking rules turned down.
pub const EXIT_REJECTED: i32 = 2;

/// Who is running the command.
#[derive(Args, Debug, Default)]
pub struct ActorArgs {
    /// Identity id (defaults to the e-mail address)
    #[arg(long = "as", global = true, value_name = "ID")]
    pub user: Option<String>,
    /// Display name
    #[arg(long, global = true)]
    pub name: Option<String>,
    /// E-mail address used for role mapping
    #[arg(long, global = true)]
    pub email: Option<String>,
    /// Group membership from the sign-in provider (repeatable)
    #[arg(long = "group", global = true, value_name = "GROUP")]
    pub groups: Vec<String>,
}

impl ActorArgs {
    /// Resolve the caller's role from the configured sign-in policy.
    pub fn identity(&self, config: &Config) -> Result<Identity, Box<dyn std::error::Error>> {
        let email = self.email.clone().unwrap_or_default();
        let claims = ProviderClaims {
            email: email.clone(),
            groups: (!self.groups.is_empty()).then(|| self.groups.clone()),
        };
        let role = match KeywordRoleMapper::from_config(&config.identity).resolve(&claims) {
            RoleResolution::Granted(role) => role,
            RoleResolution::Denied(reason) => return Err(format!("access denied: {reason}").into()),
        };
        let id = self
            .user
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| email.clone());
        if id.trim().is_empty() {
            return Err("an identity is required: pass --as or --email".into());
        }
        let name = self.name.clone().unwrap_or_else(|| id.clone());
        Ok(Identity::new(id, name, email, role))
    }
}

/// Loaded configuration and the service built from it.
pub struct Context {
    pub config: Config,
    pub service: BookingService,
}

impl Context {
    /// `now` pins the clock instead of reading the system time.
    pub fn open(now: Option<NaiveDateTime>) -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let mut service = BookingService::open(&config)?;
        if let Some(now) = now {
            service = service.with_clock(Box::new(FixedClock(now)));
        }
        Ok(Self { config, service })
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an outcome as JSON; rejections exit with [`EXIT_REJECTED`].
pub fn report<T: Serialize>(outcome: Outcome<T>) -> CliResult {
    match outcome {
        Outcome::Accepted(value) => print_json(&serde_json::json!({
            "status": "accepted",
            "result": value,
        })),
        Outcome::Rejected(rejection) => {
            print_json(&serde_json::json!({
                "status": "rejected",
                "reason": rejection.reason,
                "message": rejection.message,
            }))?;
            std::process::exit(EXIT_REJECTED);
        }
    }
}

/// Parse `NAME:CLASS`.
pub fn parse_student(value: &str) -> Result<Student, String> {
    let (name, class) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected NAME:CLASS, got '{value}'"))?;
    Ok(Student::new(name.trim(), class.trim()))
}

pub fn parse_period(value: &str) -> Result<Period, String> {
    let number: u8 = value.trim().parse().map_err(|e| format!("{e}"))?;
    Period::new(number).ok_or_else(|| format!("period must be between 1 and 6, got {number}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sportoase_core::Role;

    #[test]
    fn student_argument_splits_on_last_colon() {
        let student = parse_student("Mia Noor: 7b").unwrap();
        assert_eq!(student, Student::new("Mia Noor", "7b"));
        assert!(parse_student("Mia").is_err());
    }

    #[test]
    fn period_argument_is_range_checked() {
        assert_eq!(parse_period("3").unwrap().number(), 3);
        assert!(parse_period("7").is_err());
        assert!(parse_period("x").is_err());
    }

    #[test]
    fn identity_uses_configured_admins_and_groups() {
        let mut config = Config::default();
        config.identity.admin_emails = vec!["leitung@schule.de".into()];

        let admin = ActorArgs {
            email: Some("leitung@schule.de".into()),
            ..ActorArgs::default()
        };
        let identity = admin.identity(&config).unwrap();
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(identity.id, "leitung@schule.de");

        let teacher = ActorArgs {
            user: Some("t-17".into()),
            email: Some("berger@schule.de".into()),
            groups: vec!["Kollegium".into()],
            ..ActorArgs::default()
        };
        assert_eq!(teacher.identity(&config).unwrap().role, Role::Teacher);

        let student = ActorArgs {
            email: Some("kid@schule.de".into()),
            groups: vec!["Klasse 6b".into()],
            ..ActorArgs::default()
        };
        assert!(student.identity(&config).is_err());
    }
}
