//! Output formatting for CLI

use crate::pipeline::PipelineReport;

/// Format run reports as a JSON array
pub fn format_json(reports: &[PipelineReport]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(reports)
}

/// Print run reports: JSON on stdout, or a summary per run on stderr
pub fn print_reports(reports: &[PipelineReport], json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", format_json(reports)?);
    } else {
        for report in reports {
            report.print_summary();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{EntityKind, Phase, RunState};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_format_json_aborted_run() {
        let report = PipelineReport {
            run_id: Uuid::new_v4(),
            entity: EntityKind::MonthWork,
            state: RunState::Aborted,
            rows_read: 0,
            rows_loaded: 0,
            message: "Validation failed".to_string(),
            failed_phase: Some(Phase::Validate),
            error_kind: Some("RulesViolated".to_string()),
            dry_run: false,
            duration_ms: 12,
            started_at: Utc::now(),
        };

        let json = format_json(&[report]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["entity"], "month-work");
        assert_eq!(value[0]["state"], "aborted");
        assert_eq!(value[0]["failed_phase"], "validate");
        assert_eq!(value[0]["error_kind"], "RulesViolated");
        assert_eq!(value[0]["run_id"].as_str().map(str::len), Some(36));
    }
}
