//! Points (physical locations) and their registry

use crate::models::{ConfigError, Configuration};
use chrono_tz::Tz;
use std::collections::HashSet;

/// A physical location with its own password, timezone and type
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub name: String,
    pub password: String,
    pub timezone: Tz,
    pub point_type: String,
}

impl Point {
    /// Exact, case-sensitive comparison
    pub fn verify_password(&self, candidate: &str) -> bool {
        self.password == candidate
    }
}

/// Static registry of points, in configuration order
#[derive(Debug, Clone, Default)]
pub struct PointRegistry {
    points: Vec<Point>,
}

impl PointRegistry {
    pub fn new(points: Vec<Point>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for point in &points {
            if !seen.insert(point.name.as_str()) {
                return Err(ConfigError::DuplicatePoint(point.name.clone()));
            }
        }
        Ok(Self { points })
    }

    /// Build from configuration, resolving timezone aliases
    pub fn from_config(config: &Configuration) -> Result<Self, ConfigError> {
        let points = config
            .points
            .iter()
            .map(|p| {
                Ok(Point {
                    name: p.name.clone(),
                    password: p.password.clone(),
                    timezone: config.resolve_timezone(&p.timezone)?,
                    point_type: p.point_type.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Self::new(points)
    }

    pub fn get(&self, name: &str) -> Option<&Point> {
        self.points.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.points.iter().map(|p| p.name.as_str())
    }

    pub fn point_types(&self) -> HashSet<&str> {
        self.points.iter().map(|p| p.point_type.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
