pub mod issue_repository;
pub mod mock_db;
pub mod postgres_issue_repository;
pub mod postgres_provider_repository;
pub mod postgres_sla_repository;
pub mod provider_repository;
pub mod sla_repository;
