pub mod issue;
pub mod provider;
pub mod provider_rating;
pub mod sla_tracking;
