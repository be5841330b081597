use super::entity::ActivityInfo;
use crate::domain::{DomainError, DomainResult};

/// Validates all ActivityInfo invariants
pub fn validate_activity(activity: &ActivityInfo) -> DomainResult<()> {
    validate_diagnostic(activity)?;
    Ok(())
}

/// Diagnostic invariants:
/// 1. Pass threshold is a percentage (0-100)
/// 2. A threshold above zero needs at least one question to be reachable
fn validate_diagnostic(activity: &ActivityInfo) -> DomainResult<()> {
    if let Some(threshold) = activity.diagnostic.pass_threshold {
        if threshold > 100 {
            return Err(DomainError::InvariantViolation(format!(
                "diagnostic pass threshold {} exceeds 100",
                threshold
            )));
        }
        if threshold > 0 && activity.diagnostic.items.is_empty() {
            return Err(DomainError::InvariantViolation(
                "diagnostic requires a passing score but has no items".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::{Diagnostic, DiagnosticItem};

    #[test]
    fn test_empty_activity_is_valid() {
        assert!(validate_activity(&ActivityInfo::default()).is_ok());
    }

    #[test]
    fn test_threshold_over_hundred_fails() {
        let activity = ActivityInfo {
            diagnostic: Diagnostic {
                pass_threshold: Some(120),
                items: vec![DiagnosticItem::default()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_activity(&activity).is_err());
    }

    #[test]
    fn test_threshold_without_items_fails() {
        let activity = ActivityInfo {
            diagnostic: Diagnostic {
                pass_threshold: Some(80),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_activity(&activity).is_err());
    }
}
