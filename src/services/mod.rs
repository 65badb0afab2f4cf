pub mod escalation_notifier;
pub mod smtp_mailer;
