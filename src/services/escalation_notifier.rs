use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::{error, info};
use uuid::Uuid;

use crate::db::provider_repository::ProviderRepository;
use crate::services::smtp_mailer::Mailer;
use crate::sla::escalation::{AlertKind, AlertSeverity, EscalationAlert, EscalationReport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
    /// Alerts whose provider has no contact address.
    pub skipped: usize,
    /// Alerts already notified at the same severity on an earlier tick.
    pub repeated: usize,
}

type AlertKey = (Uuid, AlertKind, Option<Uuid>);

fn alert_key(alert: &EscalationAlert) -> AlertKey {
    (alert.issue_id, alert.kind, alert.provider_id)
}

/// Sends escalation alerts to assigned providers and a digest to operations.
pub struct EscalationNotifier {
    mailer: Arc<dyn Mailer>,
    providers: Arc<dyn ProviderRepository>,
    ops_email: Option<String>,
    /// Severity last notified per alert. Entries whose alert has cleared are
    /// dropped on the next dispatch so a recurrence is mailed again.
    notified: Mutex<HashMap<AlertKey, AlertSeverity>>,
}

impl EscalationNotifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        providers: Arc<dyn ProviderRepository>,
        ops_email: Option<String>,
    ) -> Self {
        Self {
            mailer,
            providers,
            ops_email,
            notified: Mutex::new(HashMap::new()),
        }
    }

    /// Mails alerts that are new or changed severity since the last dispatch,
    /// plus an ops digest when anything new was found.
    pub async fn dispatch(&self, report: &EscalationReport) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let alerts: Vec<&EscalationAlert> =
            report.critical.iter().chain(report.warning.iter()).collect();

        let fresh = self.fresh_alerts(&alerts);
        summary.repeated = alerts.len() - fresh.len();
        if fresh.is_empty() {
            return summary;
        }

        let contacts = self.provider_contacts(&fresh).await;
        let mut handled = Vec::with_capacity(fresh.len());
        for alert in &fresh {
            let Some(to) = alert.provider_id.and_then(|id| contacts.get(&id)) else {
                summary.skipped += 1;
                handled.push(*alert);
                continue;
            };
            let subject = format!(
                "[{}] {} issue {} needs attention",
                severity_label(alert.severity),
                alert.priority.as_str(),
                alert.issue_id
            );
            if self.send(to, &subject, &alert.message, &mut summary).await {
                handled.push(*alert);
            }
        }

        if let Some(ops) = &self.ops_email {
            let subject = format!(
                "SLA digest: {} critical, {} warning",
                report.critical.len(),
                report.warning.len()
            );
            self.send(ops, &subject, &digest_body(report), &mut summary)
                .await;
        }

        self.remember(&handled);
        info!(
            sent = summary.sent,
            failed = summary.failed,
            skipped = summary.skipped,
            repeated = summary.repeated,
            "escalation notifications dispatched"
        );
        summary
    }

    /// Alerts not yet notified at their current severity. Forgets alerts that
    /// are no longer reported.
    fn fresh_alerts<'a>(&self, alerts: &[&'a EscalationAlert]) -> Vec<&'a EscalationAlert> {
        let mut notified = match self.notified.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let current: HashSet<AlertKey> = alerts.iter().map(|a| alert_key(a)).collect();
        notified.retain(|key, _| current.contains(key));
        alerts
            .iter()
            .filter(|a| notified.get(&alert_key(a)) != Some(&a.severity))
            .copied()
            .collect()
    }

    /// Failed deliveries are left out so the next tick retries them.
    fn remember(&self, handled: &[&EscalationAlert]) {
        let mut notified = match self.notified.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for alert in handled {
            notified.insert(alert_key(alert), alert.severity);
        }
    }

    async fn provider_contacts(&self, alerts: &[&EscalationAlert]) -> HashMap<Uuid, String> {
        let mut ids: Vec<Uuid> = alerts.iter().filter_map(|a| a.provider_id).collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return HashMap::new();
        }

        match self.providers.find_providers(&ids).await {
            Ok(providers) => providers
                .into_iter()
                .filter_map(|p| p.email.map(|email| (p.id, email)))
                .collect(),
            Err(err) => {
                error!(?err, "failed to load provider contacts");
                HashMap::new()
            }
        }
    }

    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        summary: &mut DispatchSummary,
    ) -> bool {
        match self.mailer.send_email_generic(to, subject, body).await {
            Ok(()) => {
                summary.sent += 1;
                true
            }
            Err(err) => {
                summary.failed += 1;
                error!(%to, %err, "failed to send escalation email");
                false
            }
        }
    }
}

fn severity_label(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Critical => "CRITICAL",
        AlertSeverity::Warning => "WARNING",
        AlertSeverity::Info => "INFO",
    }
}

fn digest_body(report: &EscalationReport) -> String {
    let mut body = format!("SLA escalation scan at {}\n", report.generated_at);
    for (label, alerts) in [("Critical", &report.critical), ("Warning", &report.warning)] {
        if alerts.is_empty() {
            continue;
        }
        body.push_str(&format!("\n{label}:\n"));
        for alert in alerts {
            body.push_str(&format!("- {}\n", alert.message));
        }
    }
    if !report.reassignments.is_empty() {
        body.push_str("\nReassignments:\n");
        for suggestion in &report.reassignments {
            let candidate = suggestion
                .candidate
                .as_ref()
                .map(|c| c.provider_name.as_str())
                .unwrap_or("no candidate");
            let action = if suggestion.applied { "reassigned to" } else { "suggested" };
            body.push_str(&format!(
                "- issue {}: {} {}\n",
                suggestion.issue_id, action, candidate
            ));
        }
    }
    body
}
