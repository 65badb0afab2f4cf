use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::issue::{Issue, IssuePriority};
use crate::models::sla_tracking::SlaTracking;
use crate::sla::assignment::AutoAssigner;
use crate::sla::error::SlaError;
use crate::sla::policy::SlaPolicy;
use crate::sla::scoring::{RankRequest, RankedProvider, ScoringEngine};
use crate::sla::tracker::{hours_between, SlaTracker};

/// Fraction of the resolution deadline after which an open issue is at risk.
pub const AT_RISK_FRACTION: f64 = 0.8;
/// Responses faster than this fraction of the deadline are reported as info.
pub const FAST_RESPONSE_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    ResponseOverdue,
    ResolutionAtRisk,
    FastResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationAlert {
    pub issue_id: Uuid,
    pub property_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub priority: IssuePriority,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub hours_elapsed: f64,
    pub deadline_hours: f64,
    pub hours_overdue: Option<f64>,
    pub hours_remaining: Option<f64>,
    pub response_breached: bool,
    pub resolution_breached: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReassignmentSuggestion {
    pub issue_id: Uuid,
    pub current_provider_id: Option<Uuid>,
    pub candidate: Option<RankedProvider>,
    /// True when the candidate was bound to the issue.
    pub applied: bool,
    /// Set while a recent automatic reassignment holds the current binding.
    #[serde(with = "time::serde::rfc3339::option")]
    pub held_until: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationReport {
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub critical: Vec<EscalationAlert>,
    pub warning: Vec<EscalationAlert>,
    pub info: Vec<EscalationAlert>,
    pub reassignments: Vec<ReassignmentSuggestion>,
}

impl EscalationReport {
    pub fn empty(generated_at: OffsetDateTime) -> Self {
        Self {
            generated_at,
            critical: Vec::new(),
            warning: Vec::new(),
            info: Vec::new(),
            reassignments: Vec::new(),
        }
    }

    fn push(&mut self, alert: EscalationAlert) {
        match alert.severity {
            AlertSeverity::Critical => self.critical.push(alert),
            AlertSeverity::Warning => self.warning.push(alert),
            AlertSeverity::Info => self.info.push(alert),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.critical.is_empty() && self.warning.is_empty() && self.info.is_empty()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Classifies open issues into critical / warning / info alerts. Pure: it
/// reads the records as given and never mutates them.
pub fn detect_escalations(
    issues: &[Issue],
    records: &HashMap<Uuid, SlaTracking>,
    policy: &SlaPolicy,
    now: OffsetDateTime,
) -> EscalationReport {
    let mut report = EscalationReport::empty(now);

    for issue in issues.iter().filter(|i| i.status.is_open()) {
        let record = records.get(&issue.id);
        let deadlines = policy.deadlines(issue.priority);
        let elapsed = hours_between(issue.created_at, now);
        let responded = record.and_then(|r| r.actual_response_time);
        let resolved = record.and_then(|r| r.actual_resolution_time).is_some();
        let provider_id = record
            .and_then(|r| r.provider_id)
            .or(issue.assigned_provider_id);

        let alert = |kind, severity, deadline_hours, overdue, remaining, message| {
            EscalationAlert {
                issue_id: issue.id,
                property_id: issue.property_id,
                provider_id,
                priority: issue.priority,
                kind,
                severity,
                hours_elapsed: round2(elapsed),
                deadline_hours,
                hours_overdue: overdue,
                hours_remaining: remaining,
                response_breached: record.is_some_and(|r| r.response_breached),
                resolution_breached: record.is_some_and(|r| r.resolution_breached),
                message,
            }
        };

        match responded {
            None if elapsed > deadlines.response_hours => {
                let overdue = elapsed - deadlines.response_hours;
                let severity = if elapsed > 2.0 * deadlines.response_hours {
                    AlertSeverity::Critical
                } else {
                    AlertSeverity::Warning
                };
                report.push(alert(
                    AlertKind::ResponseOverdue,
                    severity,
                    deadlines.response_hours,
                    Some(round2(overdue)),
                    None,
                    format!(
                        "{} issue '{}' has no provider response, {:.1}h past the {}h deadline",
                        issue.priority.as_str(),
                        issue.title,
                        overdue,
                        deadlines.response_hours
                    ),
                ));
            }
            Some(hours) if hours < FAST_RESPONSE_FRACTION * deadlines.response_hours => {
                report.push(alert(
                    AlertKind::FastResponse,
                    AlertSeverity::Info,
                    deadlines.response_hours,
                    None,
                    None,
                    format!(
                        "issue '{}' answered in {:.1}h against a {}h deadline",
                        issue.title, hours, deadlines.response_hours
                    ),
                ));
            }
            _ => {}
        }

        if !resolved && elapsed > AT_RISK_FRACTION * deadlines.resolution_hours {
            let remaining = deadlines.resolution_hours - elapsed;
            let severity = if elapsed > deadlines.resolution_hours {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            let message = if remaining < 0.0 {
                format!(
                    "{} issue '{}' is {:.1}h past its {}h resolution deadline",
                    issue.priority.as_str(),
                    issue.title,
                    -remaining,
                    deadlines.resolution_hours
                )
            } else {
                format!(
                    "{} issue '{}' has {:.1}h left before its resolution deadline",
                    issue.priority.as_str(),
                    issue.title,
                    remaining
                )
            };
            report.push(alert(
                AlertKind::ResolutionAtRisk,
                severity,
                deadlines.resolution_hours,
                Some(round2((-remaining).max(0.0))),
                Some(round2(remaining)),
                message,
            ));
        }
    }

    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationMode {
    /// Report only.
    #[default]
    Advisory,
    /// Attach a reassignment candidate to each critical issue.
    Suggest,
    /// Bind the candidate through the auto-assigner.
    Auto,
}

impl FromStr for EscalationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "advisory" => Ok(EscalationMode::Advisory),
            "suggest" => Ok(EscalationMode::Suggest),
            "auto" => Ok(EscalationMode::Auto),
            other => Err(format!("unknown escalation mode '{other}'")),
        }
    }
}

pub struct EscalationCoordinator {
    tracker: Arc<SlaTracker>,
    scoring: Arc<ScoringEngine>,
    assigner: Arc<AutoAssigner>,
    mode: EscalationMode,
    /// Issues rebound in auto mode, keyed to the end of the new provider's
    /// response window.
    holds: DashMap<Uuid, OffsetDateTime>,
}

impl EscalationCoordinator {
    pub fn new(
        tracker: Arc<SlaTracker>,
        scoring: Arc<ScoringEngine>,
        assigner: Arc<AutoAssigner>,
        mode: EscalationMode,
    ) -> Self {
        Self {
            tracker,
            scoring,
            assigner,
            mode,
            holds: DashMap::new(),
        }
    }

    pub fn mode(&self) -> EscalationMode {
        self.mode
    }

    /// Refreshes breach flags on open issues, then classifies them.
    pub async fn scan_for_escalations(
        &self,
        property_id: Option<Uuid>,
        now: OffsetDateTime,
    ) -> Result<EscalationReport, SlaError> {
        let sweep = self.tracker.refresh_open_breaches(property_id, now).await?;
        let mut report =
            detect_escalations(&sweep.issues, &sweep.records, self.tracker.policy(), now);

        if self.mode != EscalationMode::Advisory {
            self.holds.retain(|_, until| *until > now);
            let issues: HashMap<Uuid, &Issue> = sweep.issues.iter().map(|i| (i.id, i)).collect();
            let mut seen = Vec::new();
            for alert in &report.critical {
                if seen.contains(&alert.issue_id) {
                    continue;
                }
                seen.push(alert.issue_id);
                let Some(issue) = issues.get(&alert.issue_id) else {
                    continue;
                };
                report
                    .reassignments
                    .push(self.reassignment_for(issue, alert.provider_id, now).await?);
            }
        }

        info!(
            checked = sweep.checked,
            newly_breached = sweep.newly_breached,
            critical = report.critical.len(),
            warning = report.warning.len(),
            info = report.info.len(),
            reassignments = report.reassignments.len(),
            "escalation scan complete"
        );

        Ok(report)
    }

    async fn reassignment_for(
        &self,
        issue: &Issue,
        current: Option<Uuid>,
        now: OffsetDateTime,
    ) -> Result<ReassignmentSuggestion, SlaError> {
        let exclude: Vec<Uuid> = current.into_iter().collect();
        let candidate = self
            .scoring
            .rank_providers(&RankRequest {
                property_id: issue.property_id,
                category: issue.category,
                priority: issue.priority,
                exclude: exclude.clone(),
            })
            .await?
            .into_iter()
            .next();

        let held_until = self.holds.get(&issue.id).map(|until| *until);
        let mut applied = false;
        if self.mode == EscalationMode::Auto && candidate.is_some() && held_until.is_none() {
            match self.assigner.reassign_excluding(issue.id, exclude).await {
                Ok(outcome) if outcome.changed => {
                    applied = true;
                    let window = self.tracker.policy().deadlines(issue.priority).response_hours;
                    self.holds.insert(
                        issue.id,
                        now + time::Duration::seconds_f64(window * 3600.0),
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(issue_id = %issue.id, %err, "automatic reassignment failed");
                }
            }
        } else if held_until.is_some() {
            debug!(issue_id = %issue.id, ?held_until, "reassignment held after recent rebind");
        }

        Ok(ReassignmentSuggestion {
            issue_id: issue.id,
            current_provider_id: current,
            candidate,
            applied,
            held_until,
        })
    }
}
