use std::collections::HashMap;
use std::fmt::Write;

use uuid::Uuid;

use crate::aggregate::{self, SummaryOrder};
use crate::error::Result;
use crate::models::{AttendanceEvent, AttendanceSummary, RiskTier, TrendPoint};
use crate::risk;

pub fn build_report(
    student_label: &str,
    summaries: &[AttendanceSummary],
    trends: &HashMap<Uuid, Vec<TrendPoint>>,
    events: &[AttendanceEvent],
) -> Result<String> {
    let assessed = risk::assess(summaries)?;
    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(output, "Generated for {student_label}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Subjects");

    if assessed.is_empty() {
        let _ = writeln!(output, "No enrolled subjects.");
    } else {
        let _ = writeln!(output, "| Subject | Code | Attended | Total | % | Status |");
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for (summary, tier) in assessed.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {:.2} | {} |",
                summary.subject_name,
                summary.subject_code,
                summary.classes_attended,
                summary.total_classes,
                summary.attendance_percentage,
                tier
            );
        }
    }

    let mut at_risk: Vec<AttendanceSummary> = assessed
        .iter()
        .filter(|(_, tier)| *tier != RiskTier::Good)
        .map(|(summary, _)| (*summary).clone())
        .collect();
    aggregate::sort_summaries(&mut at_risk, SummaryOrder::RiskFirst);

    let _ = writeln!(output);
    let _ = writeln!(output, "## At Risk");
    if at_risk.is_empty() {
        let _ = writeln!(output, "Every subject is at or above {}%.", risk::GOOD_THRESHOLD);
    } else {
        for summary in at_risk.iter() {
            let tier = risk::classify(summary.exact_percentage())?;
            let _ = writeln!(
                output,
                "- {} ({}): {:.2}% ({})",
                summary.subject_name, summary.subject_code, summary.attendance_percentage, tier
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trends");
    for summary in summaries {
        let _ = writeln!(output, "### {}", summary.subject_name);
        match trends.get(&summary.subject_id) {
            Some(points) if !points.is_empty() => {
                for point in points {
                    let _ = writeln!(
                        output,
                        "- {}: {:.0}% ({} present, {} absent, {} late)",
                        point.date,
                        point.daily_percentage,
                        point.present_count,
                        point.absent_count,
                        point.late_count
                    );
                }
            }
            _ => {
                let _ = writeln!(output, "No attendance recorded.");
            }
        }
    }

    let names: HashMap<Uuid, &str> = summaries
        .iter()
        .map(|summary| (summary.subject_id, summary.subject_name.as_str()))
        .collect();
    let mut noted: Vec<&AttendanceEvent> = events
        .iter()
        .filter(|event| event.notes.is_some() && names.contains_key(&event.subject_id))
        .collect();
    noted.sort_by(|a, b| b.date.cmp(&a.date));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Notes");
    if noted.is_empty() {
        let _ = writeln!(output, "No notes recorded.");
    } else {
        for event in noted.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} ({}) on {}: {}",
                names.get(&event.subject_id).copied().unwrap_or("unknown"),
                event.status,
                event.date,
                event.notes.as_deref().unwrap_or_default()
            );
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;
    use chrono::NaiveDate;

    fn summary(name: &str, attended: u32, total: u32, pct: f64) -> AttendanceSummary {
        AttendanceSummary {
            subject_id: Uuid::new_v4(),
            subject_name: name.to_string(),
            subject_code: name.to_uppercase(),
            classes_attended: attended,
            total_classes: total,
            attendance_percentage: pct,
        }
    }

    #[test]
    fn empty_report_explains_missing_data() {
        let report = build_report("Avery Lee", &[], &HashMap::new(), &[]).unwrap();
        assert!(report.contains("No enrolled subjects."));
        assert!(report.contains("No notes recorded."));
    }

    #[test]
    fn at_risk_lists_lowest_first() {
        let summaries = vec![
            summary("Algebra", 4, 4, 100.0),
            summary("Botany", 2, 3, 66.67),
            summary("Civics", 1, 4, 25.0),
        ];
        let report = build_report("Avery Lee", &summaries, &HashMap::new(), &[]).unwrap();
        let at_risk = report.split("## At Risk").nth(1).unwrap();
        let civics = at_risk.find("Civics").unwrap();
        let botany = at_risk.find("Botany").unwrap();
        assert!(civics < botany);
        assert!(!at_risk.split("## Trends").next().unwrap().contains("Algebra"));
        assert!(report.contains("| Botany | BOTANY | 2 | 3 | 66.67 | Warning |"));
    }

    #[test]
    fn trends_and_notes_are_rendered() {
        let algebra = summary("Algebra", 1, 1, 100.0);
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let mut trends = HashMap::new();
        trends.insert(
            algebra.subject_id,
            vec![TrendPoint {
                date,
                present_count: 1,
                absent_count: 0,
                late_count: 0,
                total_count: 1,
                daily_percentage: 100.0,
            }],
        );
        let events = vec![AttendanceEvent {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            subject_id: algebra.subject_id,
            date,
            status: AttendanceStatus::Present,
            notes: Some("quiz day".to_string()),
        }];

        let report = build_report("Avery Lee", &[algebra], &trends, &events).unwrap();
        assert!(report.contains("- 2024-01-10: 100% (1 present, 0 absent, 0 late)"));
        assert!(report.contains("- Algebra (present) on 2024-01-10: quiz day"));
    }
}
