//! Authenticated callers and how their role is derived.
//!
//! The booking engine only needs an [`Identity`] with a role. Where that role
//! comes from is a [`RoleMapper`]: the school's sign-in provider hands over an
//! e-mail address and a list of group names, and [`KeywordRoleMapper`] turns
//! those into admin, teacher or no access at all.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::config::IdentityConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller of a booking operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable id from the sign-in provider; owns reservations.
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: email.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// What the sign-in provider tells us about a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderClaims {
    pub email: String,
    /// Group and role names. `None` when the provider sent no group data.
    pub groups: Option<Vec<String>>,
}

/// Result of mapping claims to a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleResolution {
    Granted(Role),
    Denied(String),
}

impl RoleResolution {
    pub fn role(&self) -> Option<Role> {
        match self {
            RoleResolution::Granted(role) => Some(*role),
            RoleResolution::Denied(_) => None,
        }
    }
}

pub trait RoleMapper: Send + Sync {
    fn resolve(&self, claims: &ProviderClaims) -> RoleResolution;
}

const STUDENT_KEYWORDS: &[&str] = &[
    "schüler", "schueler", "schülerin", "schuelerin", "schülerinnen", "schuelerinnen",
    "ef", "q1", "q2", "einführungsphase", "qualifikationsphase",
    "11a", "11b", "11c", "11d", "11e", "11f",
    "12a", "12b", "12c", "12d", "12e", "12f",
    "13a", "13b", "13c", "13d", "13e", "13f",
    "5a", "5b", "5c", "5d", "5e", "5f", "5g", "5h",
    "6a", "6b", "6c", "6d", "6e", "6f", "6g", "6h",
    "7a", "7b", "7c", "7d", "7e", "7f", "7g", "7h",
    "8a", "8b", "8c", "8d", "8e", "8f", "8g", "8h",
    "9a", "9b", "9c", "9d", "9e", "9f", "9g", "9h",
    "10a", "10b", "10c", "10d", "10e", "10f", "10g", "10h",
];

/// Staff groups that contain "schüler" as part of their name.
const STUDENT_KEYWORD_EXCEPTIONS: &[&str] = &["beratung", "vertretung", "sprecher", "koordinat"];

const STAFF_KEYWORDS: &[&str] = &[
    "lehrer", "lehrerin", "lehrkraft", "lehrkräfte", "kollegium",
    "mitarbeiter", "mitarbeitende",
    "pädagogisch", "paedagogisch", "pädagogische", "paedagogische",
    "sekretariat", "verwaltung", "schulleitung", "leitung", "direktor", "direktion",
    "referendar", "praktikant", "fsj", "bufdi", "bundesfreiwilligendienst",
    "sozialpädagog", "sozialpaedagog", "sozialpädagogin", "sozialarbeit",
    "schulassist", "integrationshelfer", "administrator", "admin",
    "päd. mitarbeiter", "päd mitarbeiter", "pm",
    "beratung", "fairplaycoach", "fairplay", "coach",
];

/// Group-name based role mapping.
///
/// Rules, first match wins:
/// 1. configured admin e-mail: admin
/// 2. e-mail outside the allowed domain: denied
/// 3. no group data at all: denied
/// 4. any student group: denied
/// 5. any staff group: teacher
/// 6. otherwise denied
#[derive(Debug, Clone)]
pub struct KeywordRoleMapper {
    admin_emails: Vec<String>,
    allowed_domain: Option<String>,
    student_keywords: Vec<String>,
    staff_keywords: Vec<String>,
}

impl KeywordRoleMapper {
    pub fn new(admin_emails: Vec<String>, allowed_domain: Option<String>) -> Self {
        Self {
            admin_emails: admin_emails.iter().map(|e| e.trim().to_lowercase()).collect(),
            allowed_domain: allowed_domain
                .map(|d| d.trim().trim_start_matches('@').to_lowercase())
                .filter(|d| !d.is_empty()),
            student_keywords: STUDENT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            staff_keywords: STAFF_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn from_config(config: &IdentityConfig) -> Self {
        Self::new(config.admin_emails.clone(), config.allowed_domain.clone())
    }

    fn is_student_group(&self, text: &str) -> Option<&str> {
        // Provider ids can look like class names ("5ca49ea7-...").
        if Uuid::try_parse(text).is_ok() || text.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        self.student_keywords
            .iter()
            .find(|keyword| {
                let starts_word = text.split_whitespace().any(|word| word.starts_with(keyword.as_str()));
                if !starts_word {
                    return false;
                }
                let is_schueler = keyword.as_str() == "schüler" || keyword.as_str() == "schueler";
                !(is_schueler && STUDENT_KEYWORD_EXCEPTIONS.iter().any(|x| text.contains(x)))
            })
            .map(String::as_str)
    }

    fn is_staff_group(&self, text: &str) -> bool {
        self.staff_keywords.iter().any(|keyword| text.contains(keyword.as_str()))
    }
}

impl RoleMapper for KeywordRoleMapper {
    fn resolve(&self, claims: &ProviderClaims) -> RoleResolution {
        let email = claims.email.trim().to_lowercase();
        if !email.is_empty() && self.admin_emails.contains(&email) {
            return RoleResolution::Granted(Role::Admin);
        }

        if let Some(domain) = &self.allowed_domain {
            if !email.ends_with(&format!("@{domain}")) {
                return RoleResolution::Denied(format!("e-mail is not an @{domain} address"));
            }
        }

        let Some(groups) = &claims.groups else {
            return RoleResolution::Denied("no group information from provider".to_string());
        };
        let texts: Vec<String> = groups
            .iter()
            .map(|g| g.trim().to_lowercase())
            .filter(|g| !g.is_empty())
            .collect();

        for text in &texts {
            if let Some(keyword) = self.is_student_group(text) {
                return RoleResolution::Denied(format!("student group '{text}' ({keyword})"));
            }
        }

        if texts.iter().any(|text| self.is_staff_group(text)) {
            return RoleResolution::Granted(Role::Teacher);
        }

        RoleResolution::Denied("no authorized group".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> KeywordRoleMapper {
        KeywordRoleMapper::new(vec!["Leitung@Schule.de ".into()], Some("schule.de".into()))
    }

    fn claims(email: &str, groups: Option<&[&str]>) -> ProviderClaims {
        ProviderClaims {
            email: email.into(),
            groups: groups.map(|g| g.iter().map(|s| s.to_string()).collect()),
        }
    }

    #[test]
    fn admin_email_wins_without_groups() {
        let resolution = mapper().resolve(&claims("leitung@schule.de", None));
        assert_eq!(resolution, RoleResolution::Granted(Role::Admin));
    }

    #[test]
    fn foreign_domain_is_denied() {
        let resolution = mapper().resolve(&claims("x@other.de", Some(&["Lehrer"])));
        assert!(resolution.role().is_none());
    }

    #[test]
    fn missing_group_data_is_denied() {
        assert!(mapper().resolve(&claims("a@schule.de", None)).role().is_none());
    }

    #[test]
    fn staff_group_grants_teacher() {
        let resolution = mapper().resolve(&claims("a@schule.de", Some(&["Kollegium", "1234"])));
        assert_eq!(resolution.role(), Some(Role::Teacher));
    }

    #[test]
    fn student_group_beats_staff_group() {
        let resolution = mapper().resolve(&claims("a@schule.de", Some(&["Lehrer", "Klasse 7b"])));
        assert!(resolution.role().is_none());
    }

    #[test]
    fn uuid_and_numeric_groups_are_not_classes() {
        let resolution = mapper().resolve(&claims(
            "a@schule.de",
            Some(&["5ca49ea7-1b2c-4d5e-8f90-a1b2c3d4e5f6", "10290", "Verwaltung"]),
        ));
        assert_eq!(resolution.role(), Some(Role::Teacher));
    }

    #[test]
    fn counselling_groups_are_not_students() {
        let resolution = mapper().resolve(&claims("a@schule.de", Some(&["Schüler beratung"])));
        assert_eq!(resolution.role(), Some(Role::Teacher));
    }

    #[test]
    fn unknown_groups_are_denied() {
        let resolution = mapper().resolve(&claims("a@schule.de", Some(&["Eltern"])));
        assert_eq!(
            resolution,
            RoleResolution::Denied("no authorized group".to_string())
        );
    }

    #[test]
    fn no_domain_restriction_when_unset() {
        let open = KeywordRoleMapper::new(Vec::new(), None);
        let resolution = open.resolve(&claims("coach@verein.de", Some(&["Fairplay"])));
        assert_eq!(resolution.role(), Some(Role::Teacher));
    }
}
