use std::collections::HashMap;

use crate::pipeline::score::{breakdown, merged_credit_by_author};
use crate::types::model::{ContributorImpact, ImpactSnapshot, PullRequestRecord};

/// Display label derived from a contributor's counters and quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Archetype {
    Unblocker,
    Artisan,
    TenXEngineer,
    Machine,
    AllRounder,
    CoreContributor,
}

impl Archetype {
    /// First matching rule wins.
    pub fn classify(contributor: &ContributorImpact) -> Self {
        let merged = contributor.prs_merged;
        let reviews = contributor.reviews_given;
        let quality = contributor.avg_quality_score;

        if reviews > merged * 2 && reviews > 5 {
            Self::Unblocker
        } else if quality >= 4.5 {
            Self::Artisan
        } else if merged > 20 && quality >= 4.0 {
            Self::TenXEngineer
        } else if merged > 30 {
            Self::Machine
        } else if quality >= 4.0 && reviews > 10 {
            Self::AllRounder
        } else {
            Self::CoreContributor
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unblocker => "Unblocker",
            Self::Artisan => "Artisan",
            Self::TenXEngineer => "10x Engineer",
            Self::Machine => "Machine",
            Self::AllRounder => "All-Rounder",
            Self::CoreContributor => "Core Contributor",
        }
    }
}

pub fn to_markdown(snapshot: &ImpactSnapshot, top: usize) -> String {
    let shown: Vec<&ContributorImpact> = snapshot.contributor_metrics.iter().take(top).collect();
    let credit = merged_credit_by_author(&snapshot.pull_requests);

    let mut output = String::new();
    output.push_str(&format!("# Contributor Impact: {}\n\n", snapshot.repo_name));
    output.push_str(&format!(
        "Window: {} to {}. {} pull requests, {} issue events, {} contributors.\n\n",
        snapshot.cutoff_date.format("%Y-%m-%d"),
        snapshot.fetched_at.format("%Y-%m-%d %H:%M UTC"),
        snapshot.pull_requests.len(),
        snapshot.issue_activities.len(),
        snapshot.contributor_metrics.len()
    ));

    output.push_str("## Leaderboard\n\n");
    if shown.is_empty() {
        output.push_str("- none\n\n");
        return output;
    }
    output.push_str(
        "| # | Contributor | Impact | Baseline | Multiplier | Quality | Archetype | Merged | Reviews |\n",
    );
    output.push_str("|---|---|---|---|---|---|---|---|---|\n");
    for (rank, contributor) in shown.iter().enumerate() {
        let quality = if contributor.was_evaluated() {
            format!("{:.2}", contributor.avg_quality_score)
        } else {
            "-".to_string()
        };
        output.push_str(&format!(
            "| {} | {} | {:.1} | {:.1} | x{:.2} | {} | {} | {} | {} |\n",
            rank + 1,
            contributor.login,
            contributor.impact_score,
            contributor.baseline_impact_score,
            contributor.applied_multiplier(),
            quality,
            Archetype::classify(contributor).label(),
            contributor.prs_merged,
            contributor.reviews_given
        ));
    }
    output.push('\n');

    output.push_str("## Score Breakdown\n\n");
    for contributor in &shown {
        let merged_credit = credit.get(contributor.login.as_str()).copied().unwrap_or(0.0);
        let parts = breakdown(contributor, merged_credit);
        let components: Vec<String> = parts
            .components()
            .iter()
            .map(|(name, value)| format!("{name} {value:.1}"))
            .collect();
        output.push_str(&format!(
            "- {}: {} (baseline {:.1})\n",
            contributor.login,
            components.join(", "),
            parts.total()
        ));
    }
    output.push('\n');

    output.push_str("## Judged Pull Requests\n\n");
    let judged = judged_by_author(&snapshot.pull_requests);
    let mut any = false;
    for contributor in &shown {
        let Some(pulls) = judged.get(contributor.login.as_str()) else {
            continue;
        };
        any = true;
        output.push_str(&format!("### {}\n\n", contributor.login));
        for pr in pulls {
            output.push_str(&format!(
                "- [#{}]({}) {} (quality {:.2}, {} lines)\n",
                pr.number,
                pr.html_url,
                pr.title,
                pr.llm_quality_score.unwrap_or_default(),
                pr.lines_changed()
            ));
            if let Some(excerpt) = pr.reasoning_excerpt() {
                output.push_str(&format!("  > {excerpt}\n"));
            }
        }
        output.push('\n');
    }
    if !any {
        output.push_str("- none\n");
    }

    output
}

fn judged_by_author(pull_requests: &[PullRequestRecord]) -> HashMap<&str, Vec<&PullRequestRecord>> {
    let mut judged: HashMap<&str, Vec<&PullRequestRecord>> = HashMap::new();
    for pr in pull_requests.iter().filter(|pr| pr.llm_quality_score.is_some()) {
        judged.entry(pr.user_login.as_str()).or_default().push(pr);
    }
    judged
}
