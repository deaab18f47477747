//! TOML-based application configuration.
//!
//! Holds the deploy-time settings of the booking engine:
//! - Civil timezone used for every cutoff comparison
//! - Capacity, roster size and time-window rules
//! - Period times, fixed weekly offers and the free-module catalog
//! - Notification fan-out settings
//! - Who may sign in, and who is an administrator
//!
//! Configuration is stored at `~/.config/sportoase/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::calendar::Calendar;
use crate::clock::{SystemClock, DEFAULT_TIMEZONE};
use crate::error::ConfigError;

/// Capacity and time-window rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u32,
    #[serde(default = "default_max_roster_size")]
    pub max_roster_size: u32,
    /// Minimum lead time between booking and period start.
    #[serde(default = "default_60")]
    pub booking_advance_minutes: i64,
    /// How long before period start an owner may still edit or cancel.
    #[serde(default = "default_60")]
    pub modification_window_minutes: i64,
    /// Admin requests skip the past, lead-time and blocked-slot checks.
    #[serde(default)]
    pub admin_bypasses_temporal_guards: bool,
}

/// Wall-clock times of one period, "HH:MM".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodTimeConfig {
    pub period: u8,
    pub start: String,
    pub end: String,
}

/// A preset activity for one weekday and period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedOfferConfig {
    /// Weekday code, e.g. "Mon".
    pub weekday: String,
    pub period: u8,
    pub label: String,
}

/// Weekly timetable of the activity room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_periods")]
    pub periods: Vec<PeriodTimeConfig>,
    #[serde(default = "default_fixed_offers")]
    pub fixed_offers: Vec<FixedOfferConfig>,
    #[serde(default = "default_free_modules")]
    pub free_modules: Vec<String>,
    #[serde(default = "default_free_choice_label")]
    pub free_choice_label: String,
}

/// Notification fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Buffered events per live subscriber before the oldest are dropped.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Log every dispatched event at info level.
    #[serde(default = "default_true")]
    pub log_events: bool,
    /// Append every event as a JSON line to this file for external mailers.
    #[serde(default)]
    pub outbox_path: Option<String>,
}

/// Sign-in policy used to map provider claims to a role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// E-mail addresses that always resolve to the admin role.
    #[serde(default)]
    pub admin_emails: Vec<String>,
    /// Only addresses `@<domain>` may sign in, when set.
    #[serde(default)]
    pub allowed_domain: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/sportoase/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

// Default functions
fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_max_capacity() -> u32 {
    5
}
fn default_max_roster_size() -> u32 {
    5
}
fn default_60() -> i64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_channel_capacity() -> usize {
    64
}
fn default_free_choice_label() -> String {
    "Freie Wahl".into()
}
fn default_periods() -> Vec<PeriodTimeConfig> {
    [
        (1, "07:50", "08:35"),
        (2, "08:35", "09:20"),
        (3, "09:40", "10:25"),
        (4, "10:25", "11:20"),
        (5, "11:40", "12:25"),
        (6, "12:25", "13:10"),
    ]
    .into_iter()
    .map(|(period, start, end)| PeriodTimeConfig {
        period,
        start: start.into(),
        end: end.into(),
    })
    .collect()
}
fn default_fixed_offers() -> Vec<FixedOfferConfig> {
    [
        ("Mon", 1, "Wochenstart-Aktivierung"),
        ("Mon", 3, "Konflikt-Reset & Deeskalation"),
        ("Mon", 5, "Koordinationszirkel"),
        ("Wed", 1, "Sozialtraining / Gruppenreset"),
        ("Wed", 3, "Aktivierung Mini-Fitness"),
        ("Wed", 5, "Motorik-Parcours"),
        ("Thu", 2, "Konflikt-Reset"),
        ("Thu", 5, "Turnen + Balance"),
        ("Fri", 2, "Atem & Reflexion"),
        ("Fri", 4, "Bodyscan Light"),
        ("Fri", 5, "Ruhezone / Entspannung"),
    ]
    .into_iter()
    .map(|(weekday, period, label)| FixedOfferConfig {
        weekday: weekday.into(),
        period,
        label: label.into(),
    })
    .collect()
}
fn default_free_modules() -> Vec<String> {
    vec![
        "Aktivierung".into(),
        "Regulation / Entspannung".into(),
        "Konflikt-Reset".into(),
        "Egal / flexibel".into(),
    ]
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            max_roster_size: default_max_roster_size(),
            booking_advance_minutes: 60,
            modification_window_minutes: 60,
            admin_bypasses_temporal_guards: false,
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            periods: default_periods(),
            fixed_offers: default_fixed_offers(),
            free_modules: default_free_modules(),
            free_choice_label: default_free_choice_label(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            log_events: true,
            outbox_path: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            booking: BookingConfig::default(),
            calendar: CalendarConfig::default(),
            notifications: NotificationsConfig::default(),
            identity: IdentityConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::InvalidValue {
            key: key.to_string(),
            message: "unknown config key".to_string(),
        };
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(invalid("config key is empty".to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(format!("cannot parse '{value}' as bool: {e}")))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as integer")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation, or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load from an explicit path, writing defaults if the file is absent.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Check every rule the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        SystemClock::from_name(&self.timezone)?;
        Calendar::from_config(&self.calendar)?;

        let booking = &self.booking;
        if booking.max_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "booking.max_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if booking.max_roster_size == 0 || booking.max_roster_size > booking.max_capacity {
            return Err(ConfigError::InvalidValue {
                key: "booking.max_roster_size".to_string(),
                message: format!("must be between 1 and max_capacity ({})", booking.max_capacity),
            });
        }
        for (key, minutes) in [
            ("booking.booking_advance_minutes", booking.booking_advance_minutes),
            ("booking.modification_window_minutes", booking.modification_window_minutes),
        ] {
            if minutes < 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must not be negative".to_string(),
                });
            }
        }
        if self.notifications.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "notifications.channel_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key. The result must still validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed or
    /// the updated config is invalid. `self` is left unchanged on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.booking.max_capacity, 5);
        assert_eq!(parsed.calendar.periods.len(), 6);
        assert_eq!(parsed.calendar.fixed_offers.len(), 11);
    }

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let parsed: Config = toml::from_str(
            "[booking]\nadmin_bypasses_temporal_guards = true\n",
        )
        .unwrap();
        assert!(parsed.booking.admin_bypasses_temporal_guards);
        assert_eq!(parsed.booking.booking_advance_minutes, 60);
        assert_eq!(parsed.timezone, "Europe/Berlin");
        assert_eq!(parsed.calendar.free_modules.len(), 4);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("booking.max_capacity").as_deref(), Some("5"));
        assert_eq!(cfg.get("timezone").as_deref(), Some("Europe/Berlin"));
        assert!(cfg.get("booking.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_bool() {
        let mut cfg = Config::default();
        cfg.set("booking.admin_bypasses_temporal_guards", "true").unwrap();
        assert!(cfg.booking.admin_bypasses_temporal_guards);
    }

    #[test]
    fn set_updates_nested_number() {
        let mut cfg = Config::default();
        cfg.set("booking.booking_advance_minutes", "30").unwrap();
        assert_eq!(cfg.booking.booking_advance_minutes, 30);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(cfg.set("booking.nonexistent_key", "1").is_err());
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.set("booking.admin_bypasses_temporal_guards", "maybe").is_err());
    }

    #[test]
    fn set_rejects_values_that_fail_validation() {
        let mut cfg = Config::default();
        assert!(cfg.set("booking.max_roster_size", "9").is_err());
        assert_eq!(cfg.booking.max_roster_size, 5);
        assert!(cfg.set("timezone", "Nowhere/Land").is_err());
        assert_eq!(cfg.timezone, "Europe/Berlin");
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.booking.max_capacity, 5);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.calendar.free_choice_label, "Freie Wahl");
    }

    #[test]
    fn load_from_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[booking]\nmax_capacity = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
