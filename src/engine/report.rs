//! Plain-text assessment report

use std::fmt::Write;

use crate::models::{AssessmentRecord, FactorStatus, RiskLevel};

pub fn recommendation(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Critical => "AVOID: strong scam or rug-pull indicators",
        RiskLevel::High => "HIGH CAUTION: multiple serious risk factors",
        RiskLevel::Medium => "MODERATE RISK: verify independently before interacting",
        RiskLevel::Low => "LOWER RISK: no major red flags found, not a guarantee of safety",
    }
}

/// Render a stored assessment for human review
pub fn render_report(record: &AssessmentRecord) -> String {
    let launch = &record.launch;
    let assessment = &record.assessment;
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "LaunchGuard risk report");
    let _ = writeln!(out, "=======================");
    let _ = writeln!(out, "Token:     {}", launch.label());
    if let Some(name) = &launch.name {
        let _ = writeln!(out, "Name:      {}", name);
    }
    let _ = writeln!(out, "Chain:     {}", launch.chain);
    let _ = writeln!(
        out,
        "Creator:   {}",
        launch.creator.as_deref().unwrap_or("unknown")
    );
    let _ = writeln!(
        out,
        "Assessed:  {} (epoch {})",
        record.assessed_at.format("%Y-%m-%d %H:%M:%S UTC"),
        record.epoch
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Risk:      {} ({:.2})",
        assessment.level, assessment.score
    );
    let _ = writeln!(out, "Verdict:   {}", recommendation(assessment.level));
    if assessment.is_partial() {
        let _ = writeln!(out, "Note:      some factors ran without data");
    }

    if !assessment.overrides.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Escalated to CRITICAL:");
        for reason in &assessment.overrides {
            let _ = writeln!(out, "  ! {}", reason);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Factors:");
    let mut factors: Vec<_> = assessment.factor_scores.iter().collect();
    factors.sort_by(|a, b| b.1.weight.total_cmp(&a.1.weight).then(a.0.cmp(b.0)));
    for (name, factor) in factors {
        let status = match factor.status {
            FactorStatus::Scored => "",
            FactorStatus::Abstained => " [abstained]",
            FactorStatus::Degraded => " [no data]",
        };
        let _ = writeln!(
            out,
            "  {:<10} {:.2} x {:.2}{}",
            name.to_string(),
            factor.score,
            factor.weight,
            status
        );
        for reason in &factor.contributing_reasons {
            let _ = writeln!(out, "      - {}", reason);
        }
    }

    out
}
