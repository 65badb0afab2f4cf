use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::db::provider_repository::ProviderRepository;
use crate::models::issue::{IssueCategory, IssuePriority};
use crate::models::provider::{Provider, ProviderStats};
use crate::sla::error::SlaError;
use crate::sla::policy::{SlaDeadlines, SlaPolicy};

const MAX_RATING: f64 = 5.0;
const NEUTRAL_RESPONSE_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub rating_weight: f64,
    pub load_penalty_per_job: f64,
    pub continuity_bonus: f64,
    /// Share of the base score taken from rating for URGENT issues; the rest
    /// comes from response history.
    pub urgent_rating_share: f64,
    pub response_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            rating_weight: 1.0,
            load_penalty_per_job: 10.0,
            continuity_bonus: 15.0,
            urgent_rating_share: 0.35,
            response_weight: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedProvider {
    pub provider_id: Uuid,
    pub provider_name: String,
    pub score: f64,
    pub rationale: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankRequest {
    pub property_id: Uuid,
    pub category: IssueCategory,
    pub priority: IssuePriority,
    pub exclude: Vec<Uuid>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 100 when the provider historically answers instantly, 50 at exactly the
/// deadline, approaching 0 for slow responders.
fn response_score(avg_response_hours: Option<f64>, deadlines: SlaDeadlines) -> f64 {
    match avg_response_hours {
        Some(avg) => {
            let target = deadlines.response_hours;
            100.0 * target / (target + avg.max(0.0))
        }
        None => NEUTRAL_RESPONSE_SCORE,
    }
}

pub fn score_candidate(
    provider: &Provider,
    stats: &ProviderStats,
    priority: IssuePriority,
    deadlines: SlaDeadlines,
    weights: &ScoringWeights,
) -> RankedProvider {
    let mut rationale = Vec::new();

    let rating = provider.rating.clamp(0.0, MAX_RATING);
    let rating_score = rating / MAX_RATING * 100.0 * weights.rating_weight;
    let response = response_score(stats.avg_response_hours, deadlines);

    let base = if priority == IssuePriority::Urgent {
        let share = weights.urgent_rating_share.clamp(0.0, 1.0);
        rationale.push(format!(
            "urgent: rating {:.2} x {:.2} + response {:.2} x {:.2}",
            rating_score,
            share,
            response,
            1.0 - share
        ));
        share * rating_score + (1.0 - share) * response
    } else {
        rationale.push(format!("rating {:.1}/5 ({:+.2})", rating, rating_score));
        rationale.push(format!(
            "response history ({:+.2})",
            weights.response_weight * response
        ));
        rating_score + weights.response_weight * response
    };

    let load_penalty = stats.open_assignments.max(0) as f64 * weights.load_penalty_per_job;
    if load_penalty > 0.0 {
        rationale.push(format!(
            "open jobs:{} (-{:.2})",
            stats.open_assignments, load_penalty
        ));
    }

    let continuity = if stats.active_on_property {
        rationale.push(format!("active on property (+{:.2})", weights.continuity_bonus));
        weights.continuity_bonus
    } else {
        0.0
    };

    RankedProvider {
        provider_id: provider.id,
        provider_name: provider.name.clone(),
        score: round2(base - load_penalty + continuity),
        rationale,
    }
}

/// Scores every candidate and orders them by score descending, then by
/// provider id ascending so equal scores rank the same way on every call.
pub fn rank_candidates(
    candidates: &[Provider],
    stats: &[ProviderStats],
    priority: IssuePriority,
    deadlines: SlaDeadlines,
    weights: &ScoringWeights,
) -> Vec<RankedProvider> {
    let stats_by_provider: HashMap<Uuid, &ProviderStats> =
        stats.iter().map(|s| (s.provider_id, s)).collect();

    let mut ranked: Vec<RankedProvider> = candidates
        .iter()
        .map(|provider| {
            let fallback = ProviderStats {
                provider_id: provider.id,
                ..Default::default()
            };
            let provider_stats = stats_by_provider
                .get(&provider.id)
                .copied()
                .unwrap_or(&fallback);
            score_candidate(provider, provider_stats, priority, deadlines, weights)
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.provider_id.cmp(&b.provider_id))
    });
    ranked
}

pub struct ScoringEngine {
    providers: Arc<dyn ProviderRepository>,
    policy: SlaPolicy,
    weights: ScoringWeights,
}

impl ScoringEngine {
    pub fn new(
        providers: Arc<dyn ProviderRepository>,
        policy: SlaPolicy,
        weights: ScoringWeights,
    ) -> Self {
        Self {
            providers,
            policy,
            weights,
        }
    }

    /// Ranks active providers for the category. An empty result means no
    /// provider matched and is not an error.
    pub async fn rank_providers(
        &self,
        request: &RankRequest,
    ) -> Result<Vec<RankedProvider>, SlaError> {
        let pool: Vec<Provider> = self
            .providers
            .list_active_providers_for_category(request.category)
            .await?
            .into_iter()
            .filter(|p| p.handles(request.category) && !request.exclude.contains(&p.id))
            .collect();

        if pool.is_empty() {
            debug!(
                category = request.category.as_str(),
                property_id = %request.property_id,
                "no eligible providers"
            );
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = pool.iter().map(|p| p.id).collect();
        let stats = self
            .providers
            .load_provider_stats(&ids, request.property_id)
            .await?;

        Ok(rank_candidates(
            &pool,
            &stats,
            request.priority,
            self.policy.deadlines(request.priority),
            &self.weights,
        ))
    }
}
