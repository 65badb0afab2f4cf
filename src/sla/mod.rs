pub mod analytics;
pub mod assignment;
pub mod error;
pub mod escalation;
pub mod policy;
pub mod rating;
pub mod scoring;
pub mod tracker;

#[cfg(test)]
pub mod test_support;
