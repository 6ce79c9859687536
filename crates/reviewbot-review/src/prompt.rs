use reviewbot_core::{ReviewConfig, NO_COMMENT};

const ROLE: &str = "Your task is to act as a code reviewer of a Pull Request:";
const BULLETS: &str = "- Use bullet points if you have multiple comments.";

/// Clause added when [`ReviewConfig::include_bugs`] is set.
pub const BUGS_CLAUSE: &str = "- If there are any bugs, highlight them.";
/// Clause added when [`ReviewConfig::include_performance`] is set.
pub const PERFORMANCE_CLAUSE: &str = "- If there are major performance problems, highlight them.";
/// Clause added when [`ReviewConfig::include_best_practices`] is set.
pub const BEST_PRACTICES_CLAUSE: &str = "- Provide details on missed use of best-practices.";

const NO_NITPICKS: &str = "- Do not highlight minor issues and nitpicks.";
const IMPROVEMENTS_ONLY: &str = "- Only provide instructions for improvements.";
const INPUT_FORMAT: &str = "You are provided with the code changes (diffs) in a unidiff format.";
const OUTPUT_FORMAT: &str = "The response should be in markdown format.";

/// Build the system prompt for a review.
///
/// One line per instruction. Disabled clauses are left out entirely, as is
/// anything for an empty instruction list; no blank placeholder lines.
/// Each additional instruction becomes a single `- ` bullet, with embedded
/// line breaks folded into spaces.
///
/// # Examples
///
/// ```
/// use reviewbot_core::ReviewConfig;
/// use reviewbot_review::prompt::{build_system_prompt, BUGS_CLAUSE};
///
/// let config = ReviewConfig {
///     include_bugs: true,
///     additional_instructions: vec!["Watch for SQL injection".into()],
///     ..ReviewConfig::default()
/// };
/// let prompt = build_system_prompt(&config);
/// assert!(prompt.contains(BUGS_CLAUSE));
/// assert!(prompt.contains("- Watch for SQL injection"));
/// assert!(prompt.contains("NO_COMMENT"));
/// ```
pub fn build_system_prompt(config: &ReviewConfig) -> String {
    let mut lines: Vec<String> = vec![ROLE.into(), BULLETS.into()];

    let clauses = [
        (config.include_bugs, BUGS_CLAUSE),
        (config.include_performance, PERFORMANCE_CLAUSE),
        (config.include_best_practices, BEST_PRACTICES_CLAUSE),
    ];
    lines.extend(
        clauses
            .iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, clause)| clause.to_string()),
    );

    lines.extend(
        config
            .additional_instructions
            .iter()
            .map(|instruction| format!("- {}", single_line(instruction))),
    );

    lines.push(NO_NITPICKS.into());
    lines.push(IMPROVEMENTS_ONLY.into());
    lines.push(format!(
        "- If you have no instructions respond with {NO_COMMENT} only, otherwise provide your instructions."
    ));
    lines.push(String::new());
    lines.push(INPUT_FORMAT.into());
    lines.push(String::new());
    lines.push(OUTPUT_FORMAT.into());

    lines.join("\n")
}

fn single_line(text: &str) -> String {
    text.trim().lines().map(str::trim).collect::<Vec<_>>().join(" ")
}
