use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::db::{
    issue_repository::IssueRepository, provider_repository::ProviderRepository,
    sla_repository::SlaTrackingRepository,
};
use crate::models::issue::IssuePriority;
use crate::models::sla_tracking::{SlaHistoryFilter, SlaHistoryRow};
use crate::sla::error::SlaError;
use crate::sla::policy::SlaPolicy;

const TREND_THRESHOLD: f64 = 0.05;
const P95: f64 = 0.95;
pub const MIN_COMPLETED_FOR_RANKING: usize = 5;
pub const RESPONSE_RATE_FLOOR: f64 = 80.0;
pub const RESOLUTION_RATE_FLOOR: f64 = 70.0;
pub const FORECAST_LOOKBACK_DAYS: i64 = 90;
pub const MAX_FORECAST_DAYS: u32 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TimeStats {
    pub count: usize,
    pub average: f64,
    pub median: f64,
    pub p95: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BreachRates {
    pub response: f64,
    pub resolution: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PriorityMetrics {
    pub count: usize,
    pub response_on_time_rate: f64,
    pub resolution_on_time_rate: f64,
    pub average_response_hours: f64,
    pub average_resolution_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PriorityBreakdown {
    pub urgent: PriorityMetrics,
    pub high: PriorityMetrics,
    pub medium: PriorityMetrics,
    pub low: PriorityMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlaMetrics {
    pub total_records: usize,
    pub response: TimeStats,
    pub resolution: TimeStats,
    pub breach_rates: BreachRates,
    pub by_priority: PriorityBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderPerformance {
    pub provider_id: Uuid,
    pub provider_name: String,
    pub total_records: usize,
    pub completed_records: usize,
    pub response_on_time_rate: f64,
    pub resolution_on_time_rate: f64,
    pub average_response_hours: f64,
    pub average_resolution_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AverageMetrics {
    pub response_on_time_rate: f64,
    pub resolution_on_time_rate: f64,
    pub average_response_hours: f64,
    pub average_resolution_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub top_performers: Vec<ProviderPerformance>,
    pub improvement_needed: Vec<ProviderPerformance>,
    pub average_metrics: AverageMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub property_id: Uuid,
    pub days_ahead: u32,
    pub expected_issues: u64,
    pub daily_rate: f64,
    pub historical_breach_rate: f64,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

pub fn median(values: &[f64]) -> f64 {
    let sorted = sorted(values);
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 0 => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
        _ => sorted[n / 2],
    }
}

/// Nearest-rank without interpolation: `sorted[floor(n * 0.95)]`, clamped.
pub fn p95(values: &[f64]) -> f64 {
    let sorted = sorted(values);
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 * P95).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// Compares the upper half of the sorted values with the lower half.
pub fn trend(values: &[f64]) -> Trend {
    if values.len() < 2 {
        return Trend::Stable;
    }
    let sorted = sorted(values);
    let (first, second) = sorted.split_at(sorted.len() / 2);
    let (first, second) = (mean(first), mean(second));
    if first == 0.0 {
        return if second > 0.0 { Trend::Up } else { Trend::Stable };
    }
    let change = (second - first) / first;
    if change > TREND_THRESHOLD {
        Trend::Up
    } else if change < -TREND_THRESHOLD {
        Trend::Down
    } else {
        Trend::Stable
    }
}

pub fn time_stats(values: &[f64]) -> TimeStats {
    TimeStats {
        count: values.len(),
        average: round2(mean(values)),
        median: round2(median(values)),
        p95: round2(p95(values)),
        trend: trend(values),
    }
}

pub fn breach_rates(rows: &[SlaHistoryRow]) -> BreachRates {
    let response = rows.iter().filter(|r| r.response_breached).count();
    let resolution = rows.iter().filter(|r| r.resolution_breached).count();
    BreachRates {
        response: percent(response, rows.len()),
        resolution: percent(resolution, rows.len()),
        overall: percent(response + resolution, rows.len() * 2),
    }
}

/// On-time counts and averages over a set of rows, each judged against its
/// own priority's deadlines.
#[derive(Default)]
struct OnTimeTally {
    responses: Vec<f64>,
    resolutions: Vec<f64>,
    responses_on_time: usize,
    resolutions_on_time: usize,
}

impl OnTimeTally {
    fn from_rows<'a>(
        rows: impl IntoIterator<Item = &'a SlaHistoryRow>,
        policy: &SlaPolicy,
    ) -> Self {
        let mut tally = Self::default();
        for row in rows {
            let deadlines = policy.deadlines(row.priority);
            if let Some(hours) = row.actual_response_time {
                tally.responses.push(hours);
                if hours <= deadlines.response_hours {
                    tally.responses_on_time += 1;
                }
            }
            if let Some(hours) = row.actual_resolution_time {
                tally.resolutions.push(hours);
                if hours <= deadlines.resolution_hours {
                    tally.resolutions_on_time += 1;
                }
            }
        }
        tally
    }

    fn response_rate(&self) -> f64 {
        percent(self.responses_on_time, self.responses.len())
    }

    fn resolution_rate(&self) -> f64 {
        percent(self.resolutions_on_time, self.resolutions.len())
    }
}

fn priority_metrics(
    rows: &[SlaHistoryRow],
    priority: IssuePriority,
    policy: &SlaPolicy,
) -> PriorityMetrics {
    let subset: Vec<&SlaHistoryRow> = rows.iter().filter(|r| r.priority == priority).collect();
    let tally = OnTimeTally::from_rows(subset.iter().copied(), policy);
    PriorityMetrics {
        count: subset.len(),
        response_on_time_rate: tally.response_rate(),
        resolution_on_time_rate: tally.resolution_rate(),
        average_response_hours: round2(mean(&tally.responses)),
        average_resolution_hours: round2(mean(&tally.resolutions)),
    }
}

pub fn compute_metrics(rows: &[SlaHistoryRow], policy: &SlaPolicy) -> SlaMetrics {
    let responses: Vec<f64> = rows.iter().filter_map(|r| r.actual_response_time).collect();
    let resolutions: Vec<f64> = rows.iter().filter_map(|r| r.actual_resolution_time).collect();

    SlaMetrics {
        total_records: rows.len(),
        response: time_stats(&responses),
        resolution: time_stats(&resolutions),
        breach_rates: breach_rates(rows),
        by_priority: PriorityBreakdown {
            urgent: priority_metrics(rows, IssuePriority::Urgent, policy),
            high: priority_metrics(rows, IssuePriority::High, policy),
            medium: priority_metrics(rows, IssuePriority::Medium, policy),
            low: priority_metrics(rows, IssuePriority::Low, policy),
        },
    }
}

/// Per-provider performance for every provider that appears in `rows`,
/// ordered by response rate, then resolution rate, then provider id.
pub fn provider_performance(
    rows: &[SlaHistoryRow],
    names: &HashMap<Uuid, String>,
    policy: &SlaPolicy,
) -> Vec<ProviderPerformance> {
    let mut by_provider: BTreeMap<Uuid, Vec<&SlaHistoryRow>> = BTreeMap::new();
    for row in rows {
        if let Some(provider_id) = row.provider_id {
            by_provider.entry(provider_id).or_default().push(row);
        }
    }

    let mut performances: Vec<ProviderPerformance> = by_provider
        .into_iter()
        .map(|(provider_id, rows)| {
            let tally = OnTimeTally::from_rows(rows.iter().copied(), policy);
            ProviderPerformance {
                provider_id,
                provider_name: names.get(&provider_id).cloned().unwrap_or_default(),
                total_records: rows.len(),
                completed_records: tally.resolutions.len(),
                response_on_time_rate: tally.response_rate(),
                resolution_on_time_rate: tally.resolution_rate(),
                average_response_hours: round2(mean(&tally.responses)),
                average_resolution_hours: round2(mean(&tally.resolutions)),
            }
        })
        .collect();

    performances.sort_by(|a, b| {
        b.response_on_time_rate
            .total_cmp(&a.response_on_time_rate)
            .then(b.resolution_on_time_rate.total_cmp(&a.resolution_on_time_rate))
            .then(a.provider_id.cmp(&b.provider_id))
    });
    performances
}

pub fn build_leaderboard(performances: Vec<ProviderPerformance>, top_n: usize) -> Leaderboard {
    let average_metrics = {
        let avg_of = |f: fn(&ProviderPerformance) -> f64| -> f64 {
            round2(mean(&performances.iter().map(f).collect::<Vec<_>>()))
        };
        AverageMetrics {
            response_on_time_rate: avg_of(|p| p.response_on_time_rate),
            resolution_on_time_rate: avg_of(|p| p.resolution_on_time_rate),
            average_response_hours: avg_of(|p| p.average_response_hours),
            average_resolution_hours: avg_of(|p| p.average_resolution_hours),
        }
    };

    let top_performers = performances
        .iter()
        .filter(|p| p.completed_records >= MIN_COMPLETED_FOR_RANKING)
        .take(top_n)
        .cloned()
        .collect();

    let improvement_needed = performances
        .into_iter()
        .filter(|p| p.completed_records > 0)
        .filter(|p| {
            p.response_on_time_rate < RESPONSE_RATE_FLOOR
                || p.resolution_on_time_rate < RESOLUTION_RATE_FLOOR
        })
        .collect();

    Leaderboard {
        top_performers,
        improvement_needed,
        average_metrics,
    }
}

pub fn risk_level(historical_breach_rate: f64) -> RiskLevel {
    if historical_breach_rate > 30.0 {
        RiskLevel::High
    } else if historical_breach_rate > 15.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn recommendations(risk: RiskLevel) -> Vec<String> {
    let lines: &[&str] = match risk {
        RiskLevel::High => &[
            "Schedule preventive inspections for recurring issue categories",
            "Line up backup providers for urgent and high priority work",
            "Review response commitments with current providers",
        ],
        RiskLevel::Medium => &[
            "Review open issues weekly to catch slow responses early",
            "Confirm provider availability for the forecast period",
        ],
        RiskLevel::Low => &["Keep the current maintenance schedule"],
    };
    lines.iter().map(|s| s.to_string()).collect()
}

fn validate_window(filter: &SlaHistoryFilter) -> Result<(), SlaError> {
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if from > to {
            return Err(SlaError::InvalidInput(format!(
                "window start {from} is after window end {to}"
            )));
        }
    }
    Ok(())
}

pub struct AnalyticsEngine {
    issues: Arc<dyn IssueRepository>,
    providers: Arc<dyn ProviderRepository>,
    tracking: Arc<dyn SlaTrackingRepository>,
    policy: SlaPolicy,
    top_n: usize,
}

impl AnalyticsEngine {
    pub fn new(
        issues: Arc<dyn IssueRepository>,
        providers: Arc<dyn ProviderRepository>,
        tracking: Arc<dyn SlaTrackingRepository>,
        policy: SlaPolicy,
        top_n: usize,
    ) -> Self {
        Self {
            issues,
            providers,
            tracking,
            policy,
            top_n,
        }
    }

    pub async fn get_metrics(&self, filter: &SlaHistoryFilter) -> Result<SlaMetrics, SlaError> {
        validate_window(filter)?;
        let rows = self.tracking.list_history(filter).await?;
        debug!(records = rows.len(), "computing sla metrics");
        Ok(compute_metrics(&rows, &self.policy))
    }

    pub async fn get_leaderboard(
        &self,
        filter: &SlaHistoryFilter,
    ) -> Result<Leaderboard, SlaError> {
        validate_window(filter)?;
        let rows = self.tracking.list_history(filter).await?;

        let mut ids: Vec<Uuid> = rows.iter().filter_map(|r| r.provider_id).collect();
        ids.sort();
        ids.dedup();
        let names: HashMap<Uuid, String> = self
            .providers
            .find_providers(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let performances = provider_performance(&rows, &names, &self.policy);
        Ok(build_leaderboard(performances, self.top_n))
    }

    pub async fn forecast(
        &self,
        property_id: Uuid,
        days_ahead: u32,
        now: OffsetDateTime,
    ) -> Result<Forecast, SlaError> {
        if days_ahead == 0 || days_ahead > MAX_FORECAST_DAYS {
            return Err(SlaError::InvalidInput(format!(
                "forecast horizon must be between 1 and {MAX_FORECAST_DAYS} days"
            )));
        }

        let since = now - Duration::days(FORECAST_LOOKBACK_DAYS);
        let recent = self
            .issues
            .count_issues_for_property_since(property_id, since)
            .await?;
        let history = self
            .tracking
            .list_history(&SlaHistoryFilter {
                property_id: Some(property_id),
                ..Default::default()
            })
            .await?;

        let daily_rate = recent.max(0) as f64 / FORECAST_LOOKBACK_DAYS as f64;
        let historical_breach_rate = breach_rates(&history).overall;
        let risk = risk_level(historical_breach_rate);

        Ok(Forecast {
            property_id,
            days_ahead,
            expected_issues: (daily_rate * days_ahead as f64).round() as u64,
            daily_rate: round2(daily_rate),
            historical_breach_rate,
            risk_level: risk,
            recommendations: recommendations(risk),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::InMemoryDb;
    use crate::models::issue::IssueCategory;
    use crate::models::sla_tracking::SlaTracking;
    use crate::sla::test_support::{fixed_now, hours, id, issue, provider, tracking};

    fn engine(db: &Arc<InMemoryDb>) -> AnalyticsEngine {
        AnalyticsEngine::new(db.clone(), db.clone(), db.clone(), SlaPolicy::default(), 5)
    }

    /// Inserts a HIGH issue with the given provider and recorded hours.
    fn seed(
        db: &InMemoryDb,
        n: u128,
        provider_id: u128,
        response: Option<f64>,
        resolution: Option<f64>,
    ) {
        let created = fixed_now() - hours(200.0) + hours(n as f64);
        db.insert_issue(issue(n, id(100), IssuePriority::High, created));
        let policy = SlaPolicy::default().deadlines(IssuePriority::High);
        db.insert_tracking(SlaTracking {
            actual_response_time: response,
            actual_resolution_time: resolution,
            response_breached: response.is_some_and(|h| h > policy.response_hours),
            resolution_breached: resolution.is_some_and(|h| h > policy.resolution_hours),
            ..tracking(id(n), Some(id(provider_id)))
        });
    }

    #[test]
    fn percentile_and_median_follow_nearest_rank() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(p95(&values), 10.0);
        assert_eq!(median(&values), 5.5);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(p95(&[4.0]), 4.0);
    }

    #[test]
    fn empty_input_yields_zeros() {
        let metrics = compute_metrics(&[], &SlaPolicy::default());
        assert_eq!(metrics.total_records, 0);
        assert_eq!(metrics.response, TimeStats::default());
        assert_eq!(metrics.breach_rates, BreachRates::default());
        assert_eq!(metrics.by_priority, PriorityBreakdown::default());
    }

    #[test]
    fn trend_compares_sorted_halves() {
        assert_eq!(trend(&[5.0]), Trend::Stable);
        assert_eq!(trend(&[4.0, 4.0, 4.0, 4.0]), Trend::Stable);
        assert_eq!(trend(&[4.0, 1.0, 3.0, 2.0]), Trend::Up);
        assert_eq!(trend(&[10.0, 10.2]), Trend::Stable);
    }

    #[test]
    fn risk_levels_follow_thresholds() {
        assert_eq!(risk_level(30.5), RiskLevel::High);
        assert_eq!(risk_level(30.0), RiskLevel::Medium);
        assert_eq!(risk_level(15.0), RiskLevel::Low);
    }

    #[tokio::test]
    async fn metrics_cover_rates_and_priority_breakdown() {
        let db = Arc::new(InMemoryDb::default());
        seed(&db, 1, 1, Some(2.0), Some(20.0));
        seed(&db, 2, 1, Some(10.0), None);
        seed(&db, 3, 1, None, None);
        seed(&db, 4, 1, Some(4.0), Some(80.0));

        let metrics = engine(&db)
            .get_metrics(&SlaHistoryFilter::default())
            .await
            .unwrap();

        assert_eq!(metrics.total_records, 4);
        assert_eq!(metrics.response.count, 3);
        assert_eq!(metrics.response.median, 4.0);
        assert_eq!(metrics.resolution.average, 50.0);
        assert_eq!(metrics.breach_rates.response, 25.0);
        assert_eq!(metrics.breach_rates.resolution, 25.0);
        assert_eq!(metrics.breach_rates.overall, 25.0);
        assert_eq!(metrics.by_priority.high.count, 4);
        assert_eq!(metrics.by_priority.high.response_on_time_rate, 66.67);
        assert_eq!(metrics.by_priority.high.resolution_on_time_rate, 50.0);
        assert_eq!(metrics.by_priority.urgent.count, 0);
    }

    #[tokio::test]
    async fn inverted_window_is_rejected() {
        let db = Arc::new(InMemoryDb::default());
        let filter = SlaHistoryFilter {
            from: Some(fixed_now()),
            to: Some(fixed_now() - hours(1.0)),
            ..Default::default()
        };
        let err = engine(&db).get_metrics(&filter).await.unwrap_err();
        assert!(matches!(err, SlaError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn leaderboard_requires_five_completed_records() {
        let db = Arc::new(InMemoryDb::default());
        for p in 1..=3 {
            db.insert_provider(provider(p, 4.0, &[IssueCategory::Plumbing]));
        }
        // Provider 1: five on-time jobs.
        for n in 10..15 {
            seed(&db, n, 1, Some(1.0), Some(10.0));
        }
        // Provider 2: flawless but only four completed.
        for n in 20..24 {
            seed(&db, n, 2, Some(1.0), Some(10.0));
        }
        // Provider 3: five jobs, two late responses.
        for n in 30..35 {
            let response = if n < 32 { 12.0 } else { 1.0 };
            seed(&db, n, 3, Some(response), Some(30.0));
        }

        let board = engine(&db)
            .get_leaderboard(&SlaHistoryFilter::default())
            .await
            .unwrap();

        let top: Vec<Uuid> = board.top_performers.iter().map(|p| p.provider_id).collect();
        assert_eq!(top, vec![id(1), id(3)]);
        assert_eq!(board.top_performers[0].provider_name, "Provider 1");

        let flagged: Vec<Uuid> = board
            .improvement_needed
            .iter()
            .map(|p| p.provider_id)
            .collect();
        assert_eq!(flagged, vec![id(3)]);
        assert_eq!(board.improvement_needed[0].response_on_time_rate, 60.0);

        assert_eq!(board.average_metrics.resolution_on_time_rate, 100.0);
        assert_eq!(board.average_metrics.response_on_time_rate, 86.67);
    }

    #[tokio::test]
    async fn forecast_scales_recent_volume_and_rates_risk() {
        let db = Arc::new(InMemoryDb::default());
        let now = fixed_now();
        for n in 1..=9 {
            let created = now - Duration::days(n as i64 * 5);
            db.insert_issue(issue(n, id(100), IssuePriority::Low, created));
        }
        // Outside the lookback window.
        db.insert_issue(issue(50, id(100), IssuePriority::Low, now - Duration::days(120)));
        // Two of four deadlines breached on the property's history.
        db.insert_tracking(SlaTracking {
            response_breached: true,
            resolution_breached: true,
            ..tracking(id(1), None)
        });
        db.insert_tracking(tracking(id(2), None));

        let forecast = engine(&db).forecast(id(100), 30, now).await.unwrap();

        assert_eq!(forecast.expected_issues, 3);
        assert_eq!(forecast.daily_rate, 0.1);
        assert_eq!(forecast.historical_breach_rate, 50.0);
        assert_eq!(forecast.risk_level, RiskLevel::High);
        assert_eq!(forecast.recommendations.len(), 3);
    }

    #[tokio::test]
    async fn forecast_rejects_zero_horizon() {
        let db = Arc::new(InMemoryDb::default());
        let err = engine(&db).forecast(id(100), 0, fixed_now()).await.unwrap_err();
        assert!(matches!(err, SlaError::InvalidInput(_)));
    }
}
