use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::issue::IssuePriority;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlaDeadlines {
    pub response_hours: f64,
    pub resolution_hours: f64,
}

impl SlaDeadlines {
    pub const fn new(response_hours: f64, resolution_hours: f64) -> Self {
        Self {
            response_hours,
            resolution_hours,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SlaPolicyError {
    #[error("{priority}: deadlines must be finite numbers of hours")]
    NonFinite { priority: &'static str },
    #[error("{priority}: deadlines must be positive")]
    NonPositive { priority: &'static str },
    #[error("{priority}: response deadline {response}h exceeds resolution deadline {resolution}h")]
    ResponseAfterResolution {
        priority: &'static str,
        response: f64,
        resolution: f64,
    },
    #[error("{higher} deadlines must be strictly shorter than {lower} deadlines")]
    NotStrictlyDecreasing {
        higher: &'static str,
        lower: &'static str,
    },
    #[error("could not parse deadline override '{0}', expected 'response/resolution'")]
    Unparseable(String),
}

/// Response and resolution deadlines per priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlaPolicy {
    pub urgent: SlaDeadlines,
    pub high: SlaDeadlines,
    pub medium: SlaDeadlines,
    pub low: SlaDeadlines,
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            urgent: SlaDeadlines::new(2.0, 24.0),
            high: SlaDeadlines::new(8.0, 72.0),
            medium: SlaDeadlines::new(24.0, 168.0),
            low: SlaDeadlines::new(72.0, 336.0),
        }
    }
}

impl SlaPolicy {
    pub fn deadlines(&self, priority: IssuePriority) -> SlaDeadlines {
        match priority {
            IssuePriority::Urgent => self.urgent,
            IssuePriority::High => self.high,
            IssuePriority::Medium => self.medium,
            IssuePriority::Low => self.low,
        }
    }

    pub fn with_override(mut self, priority: IssuePriority, deadlines: SlaDeadlines) -> Self {
        match priority {
            IssuePriority::Urgent => self.urgent = deadlines,
            IssuePriority::High => self.high = deadlines,
            IssuePriority::Medium => self.medium = deadlines,
            IssuePriority::Low => self.low = deadlines,
        }
        self
    }

    /// Checks response <= resolution per tier and strictly shorter deadlines
    /// for every more urgent tier.
    pub fn validate(&self) -> Result<(), SlaPolicyError> {
        for priority in IssuePriority::ALL {
            let d = self.deadlines(priority);
            if !d.response_hours.is_finite() || !d.resolution_hours.is_finite() {
                return Err(SlaPolicyError::NonFinite {
                    priority: priority.as_str(),
                });
            }
            if d.response_hours <= 0.0 || d.resolution_hours <= 0.0 {
                return Err(SlaPolicyError::NonPositive {
                    priority: priority.as_str(),
                });
            }
            if d.response_hours > d.resolution_hours {
                return Err(SlaPolicyError::ResponseAfterResolution {
                    priority: priority.as_str(),
                    response: d.response_hours,
                    resolution: d.resolution_hours,
                });
            }
        }

        // ALL runs from most to least urgent.
        for pair in IssuePriority::ALL.windows(2) {
            let (higher, lower) = (self.deadlines(pair[0]), self.deadlines(pair[1]));
            if higher.response_hours >= lower.response_hours
                || higher.resolution_hours >= lower.resolution_hours
            {
                return Err(SlaPolicyError::NotStrictlyDecreasing {
                    higher: pair[0].as_str(),
                    lower: pair[1].as_str(),
                });
            }
        }

        Ok(())
    }
}

/// Parses `"8/72"` into response and resolution hours.
pub fn parse_deadlines(raw: &str) -> Result<SlaDeadlines, SlaPolicyError> {
    let unparseable = || SlaPolicyError::Unparseable(raw.to_string());
    let (response, resolution) = raw.trim().split_once('/').ok_or_else(unparseable)?;
    let response: f64 = response.trim().parse().map_err(|_| unparseable())?;
    let resolution: f64 = resolution.trim().parse().map_err(|_| unparseable())?;
    if !response.is_finite() || !resolution.is_finite() {
        return Err(unparseable());
    }
    Ok(SlaDeadlines::new(response, resolution))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_satisfies_ordering_invariant() {
        let policy = SlaPolicy::default();
        assert_eq!(policy.validate(), Ok(()));

        for priority in IssuePriority::ALL {
            let d = policy.deadlines(priority);
            assert!(d.response_hours <= d.resolution_hours);
        }
        let urgent = policy.deadlines(IssuePriority::Urgent);
        let high = policy.deadlines(IssuePriority::High);
        let medium = policy.deadlines(IssuePriority::Medium);
        let low = policy.deadlines(IssuePriority::Low);
        assert!(urgent.response_hours < high.response_hours);
        assert!(high.response_hours < medium.response_hours);
        assert!(medium.response_hours < low.response_hours);
        assert!(urgent.resolution_hours < high.resolution_hours);
        assert!(high.resolution_hours < medium.resolution_hours);
        assert!(medium.resolution_hours < low.resolution_hours);
    }

    #[test]
    fn high_priority_defaults() {
        let d = SlaPolicy::default().deadlines(IssuePriority::High);
        assert_eq!(d, SlaDeadlines::new(8.0, 72.0));
    }

    #[test]
    fn rejects_response_after_resolution() {
        let policy =
            SlaPolicy::default().with_override(IssuePriority::Low, SlaDeadlines::new(400.0, 336.0));
        assert!(matches!(
            policy.validate(),
            Err(SlaPolicyError::ResponseAfterResolution { priority: "LOW", .. })
        ));
    }

    #[test]
    fn rejects_non_decreasing_tiers() {
        let policy =
            SlaPolicy::default().with_override(IssuePriority::Urgent, SlaDeadlines::new(8.0, 24.0));
        assert_eq!(
            policy.validate(),
            Err(SlaPolicyError::NotStrictlyDecreasing {
                higher: "URGENT",
                lower: "HIGH"
            })
        );
    }

    #[test]
    fn parses_override_strings() {
        assert_eq!(parse_deadlines(" 4/48 "), Ok(SlaDeadlines::new(4.0, 48.0)));
        assert!(parse_deadlines("4-48").is_err());
        assert!(parse_deadlines("x/48").is_err());
    }

    #[test]
    fn rejects_non_finite_deadlines() {
        assert!(parse_deadlines("NaN/NaN").is_err());
        assert!(parse_deadlines("4/inf").is_err());

        let policy = SlaPolicy::default()
            .with_override(IssuePriority::High, SlaDeadlines::new(f64::NAN, 72.0));
        assert_eq!(
            policy.validate(),
            Err(SlaPolicyError::NonFinite { priority: "HIGH" })
        );
    }
}
