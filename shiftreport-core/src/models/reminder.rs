//! Reminder definitions and their recurrence rules

use crate::models::{ConfigError, Configuration, PointRegistry};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use croner::Cron;
use std::collections::HashSet;

/// Cron-style recurrence evaluated in a point's local time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recurrence {
    expression: String,
}

impl Recurrence {
    /// Parse and validate a cron expression (5 fields, optional seconds field)
    pub fn parse(expression: &str) -> Result<Self, String> {
        Self::compile(expression)?;
        Ok(Self {
            expression: expression.trim().to_string(),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next firing strictly after `now`, computed in `tz` and returned in UTC
    pub fn next_after(&self, now: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        let cron = Self::compile(&self.expression).ok()?;
        let local = now.with_timezone(&tz);
        cron.find_next_occurrence(&local, false)
            .ok()
            .map(|next| next.with_timezone(&Utc))
    }

    fn compile(expression: &str) -> Result<Cron, String> {
        Cron::new(expression.trim())
            .with_seconds_optional()
            .parse()
            .map_err(|e| e.to_string())
    }
}

/// A named, recurring report obligation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderDefinition {
    /// Stable key used in callback routing
    pub key: String,
    /// Display name shown to users and in the submitted report
    pub name: String,
    pub recurrence: Recurrence,
    /// Point type filter; `None` applies to every point
    pub point_type: Option<String>,
}

impl ReminderDefinition {
    pub fn applies_to(&self, point_type: &str) -> bool {
        self.point_type
            .as_deref()
            .map_or(true, |filter| filter == point_type)
    }
}

/// Ordered list of reminder definitions
#[derive(Debug, Clone, Default)]
pub struct ReminderCatalog {
    reminders: Vec<ReminderDefinition>,
}

impl ReminderCatalog {
    pub fn new(reminders: Vec<ReminderDefinition>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for reminder in &reminders {
            if !seen.insert(reminder.key.as_str()) {
                return Err(ConfigError::DuplicateReminder(reminder.key.clone()));
            }
        }
        Ok(Self { reminders })
    }

    pub fn from_config(config: &Configuration) -> Result<Self, ConfigError> {
        let reminders = config
            .reminders
            .iter()
            .map(|r| {
                let recurrence =
                    Recurrence::parse(&r.cron).map_err(|reason| ConfigError::InvalidRecurrence {
                        key: r.key.clone(),
                        expression: r.cron.clone(),
                        reason,
                    })?;
                Ok(ReminderDefinition {
                    key: r.key.clone(),
                    name: r.name.clone(),
                    recurrence,
                    point_type: r.point_type.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Self::new(reminders)
    }

    pub fn get(&self, key: &str) -> Option<&ReminderDefinition> {
        self.reminders.iter().find(|r| r.key == key)
    }

    /// Display name for a key, falling back to the key itself
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.get(key).map(|r| r.name.as_str()).unwrap_or(key)
    }

    /// Reminders applying to a point type, in catalog order
    pub fn applicable_to<'a>(
        &'a self,
        point_type: &'a str,
    ) -> impl Iterator<Item = &'a ReminderDefinition> + 'a {
        self.reminders.iter().filter(move |r| r.applies_to(point_type))
    }

    /// Reminders whose point-type filter matches no configured point
    pub fn unmatched<'a>(&'a self, registry: &PointRegistry) -> Vec<&'a ReminderDefinition> {
        let types = registry.point_types();
        self.reminders
            .iter()
            .filter(|r| {
                r.point_type
                    .as_deref()
                    .is_some_and(|t| !types.contains(t))
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReminderDefinition> {
        self.reminders.iter()
    }

    pub fn len(&self) -> usize {
        self.reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reminder(key: &str, point_type: Option<&str>) -> ReminderDefinition {
        ReminderDefinition {
            key: key.to_string(),
            name: key.to_uppercase(),
            recurrence: Recurrence::parse("0 9 * * *").unwrap(),
            point_type: point_type.map(str::to_string),
        }
    }

    #[test]
    fn test_invalid_expression_rejected() {
        assert!(Recurrence::parse("not a cron").is_err());
        assert!(Recurrence::parse("61 * * * *").is_err());
    }

    #[test]
    fn test_next_after_uses_point_timezone() {
        // 09:00 in Tashkent (UTC+5) is 04:00 UTC
        let recurrence = Recurrence::parse("0 9 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 1, 0, 0).unwrap();
        let next = recurrence.next_after(now, chrono_tz::Asia::Tashkent).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 10, 4, 0, 0).unwrap());

        // Same rule in Novosibirsk (UTC+7) fires at 02:00 UTC
        let next = recurrence
            .next_after(now, chrono_tz::Asia::Novosibirsk)
            .unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 10, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_next_after_is_strict() {
        let recurrence = Recurrence::parse("30 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 1, 30, 0).unwrap();
        let next = recurrence.next_after(now, chrono_tz::UTC).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 10, 2, 30, 0).unwrap());
    }

    #[test]
    fn test_point_type_filter() {
        let catalog = ReminderCatalog::new(vec![
            reminder("fridge", Some("kitchen")),
            reminder("floor", None),
            reminder("bar", Some("bar")),
        ])
        .unwrap();

        let keys: Vec<_> = catalog.applicable_to("kitchen").map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["fridge", "floor"]);
        assert_eq!(catalog.display_name("fridge"), "FRIDGE");
        assert_eq!(catalog.display_name("unknown"), "unknown");
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let err = ReminderCatalog::new(vec![reminder("a", None), reminder("a", None)]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateReminder(key) if key == "a"));
    }
}
