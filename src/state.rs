use crate::config::Config;
use crate::db::{
    issue_repository::IssueRepository, provider_repository::ProviderRepository,
    sla_repository::SlaTrackingRepository,
};
use crate::services::escalation_notifier::EscalationNotifier;
use crate::services::smtp_mailer::Mailer;
use crate::sla::{
    analytics::AnalyticsEngine,
    assignment::AutoAssigner,
    escalation::EscalationCoordinator,
    rating::ProviderRatingService,
    scoring::{ScoringEngine, ScoringWeights},
    tracker::SlaTracker,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub issue_repo: Arc<dyn IssueRepository>,
    pub provider_repo: Arc<dyn ProviderRepository>,
    pub sla_repo: Arc<dyn SlaTrackingRepository>,
    pub scoring: Arc<ScoringEngine>,
    pub tracker: Arc<SlaTracker>,
    pub assigner: Arc<AutoAssigner>,
    pub escalations: Arc<EscalationCoordinator>,
    pub analytics: Arc<AnalyticsEngine>,
    pub ratings: Arc<ProviderRatingService>,
    pub notifier: Arc<EscalationNotifier>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires every engine over the given repositories.
    pub fn new(
        issue_repo: Arc<dyn IssueRepository>,
        provider_repo: Arc<dyn ProviderRepository>,
        sla_repo: Arc<dyn SlaTrackingRepository>,
        mailer: Arc<dyn Mailer>,
        config: Config,
    ) -> Self {
        let policy = config.sla_policy;
        let scoring = Arc::new(ScoringEngine::new(
            provider_repo.clone(),
            policy,
            ScoringWeights::default(),
        ));
        let tracker = Arc::new(SlaTracker::new(
            issue_repo.clone(),
            sla_repo.clone(),
            policy,
        ));
        let assigner = Arc::new(AutoAssigner::new(
            issue_repo.clone(),
            scoring.clone(),
            tracker.clone(),
            config.reassign_policy,
            config.assign_timeout,
        ));
        let escalations = Arc::new(EscalationCoordinator::new(
            tracker.clone(),
            scoring.clone(),
            assigner.clone(),
            config.escalation_mode,
        ));
        let analytics = Arc::new(AnalyticsEngine::new(
            issue_repo.clone(),
            provider_repo.clone(),
            sla_repo.clone(),
            policy,
            config.leaderboard_top_n,
        ));
        let ratings = Arc::new(ProviderRatingService::new(provider_repo.clone()));
        let notifier = Arc::new(EscalationNotifier::new(
            mailer,
            provider_repo.clone(),
            config.ops_email.clone(),
        ));

        Self {
            issue_repo,
            provider_repo,
            sla_repo,
            scoring,
            tracker,
            assigner,
            escalations,
            analytics,
            ratings,
            notifier,
            config: Arc::new(config),
        }
    }
}
