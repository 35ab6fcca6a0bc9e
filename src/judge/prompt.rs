use crate::types::model::PullRequestRecord;

/// Upper bound on the user prompt; titles are the only unbounded input.
pub const MAX_PROMPT_CHARS: usize = 2_000;
const MAX_TITLE_CHARS: usize = 300;

pub const SYSTEM_PROMPT: &str = r#"You review merged pull requests for their real engineering impact. You only see the title and change statistics, never the diff.

Score each dimension from 1 (lowest) to 5 (highest):

substance_score: 5 = new subsystem, architectural change or complex algorithm; 3 = ordinary feature or well-scoped module work; 1 = typo, comment, version bump or one-liner.
product_impact_score: 5 = unblocks a launch, new revenue or fixes a critical user-facing failure; 3 = improves an existing feature or a moderate pain point; 1 = no user-visible effect.
technical_quality_score: 5 = tests, docs and clean abstractions are evident; 3 = adequate but thin on tests; 1 = likely to regress.
blast_radius_score: 5 = core infrastructure shared by many teams (schemas, auth, shared libraries); 3 = one feature with several touchpoints; 1 = fully isolated.

Reply with a single JSON object and nothing else:
{"substance_score": int, "product_impact_score": int, "technical_quality_score": int, "blast_radius_score": int, "reasoning": "one or two sentences on why this change matters or does not"}"#;

/// Compact, diff-free description of a merged pull request for the judge.
pub fn describe_pull_request(pr: &PullRequestRecord) -> String {
    let lines = pr.lines_changed();
    let density = lines as f64 / pr.changed_files.max(1) as f64;
    let net = pr.additions as i64 - pr.deletions as i64;
    let net_sign = if net > 0 { "+" } else { "" };
    let merged = pr
        .merged_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "not merged".to_string());
    let title: String = pr.title.chars().take(MAX_TITLE_CHARS).collect();

    let mut prompt = format!(
        "PR #{number}: {title}\n\
         Code stats: +{additions} additions / -{deletions} deletions across {files} files\n\
         Total scope: {lines} lines changed\n\
         Status: merged at {merged}\n\
         \n\
         Context signals:\n\
         - Change density: {density:.0} lines/file avg\n\
         - Net growth: {net_sign}{net} lines\n\
         - Review engagement: {reviews} reviewers participated\n\
         \n\
         Evaluate the engineering impact and quality of this contribution.",
        number = pr.number,
        additions = pr.additions,
        deletions = pr.deletions,
        files = pr.changed_files,
        reviews = pr.reviews.len(),
    );
    if prompt.len() > MAX_PROMPT_CHARS {
        let cut = (0..=MAX_PROMPT_CHARS)
            .rev()
            .find(|idx| prompt.is_char_boundary(*idx))
            .unwrap_or(0);
        prompt.truncate(cut);
    }
    prompt
}
