//! Skills, education and languages read back from the summary markdown.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateProfile {
    pub skills: Vec<String>,
    pub education: Vec<String>,
    pub languages: Vec<String>,
}

fn any_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]*(.*?)[ \t]*:?[ \t]*$").expect("valid regex"))
}

fn list_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:[-*•+]|\d+[.)])\s+").expect("valid regex"))
}

impl CandidateProfile {
    pub fn from_summary(markdown: &str) -> Self {
        Self {
            skills: split_items(section_items(markdown, &["habilidades", "skills", "competências"])),
            education: section_items(markdown, &["formação", "formacao", "educação", "education"]),
            languages: split_items(section_items(markdown, &["idiomas", "línguas", "languages"])),
        }
    }
}

/// List items under the first heading whose text starts with one of `titles`
/// (case-insensitive). The section ends at the next heading of any level.
fn section_items(markdown: &str, titles: &[&str]) -> Vec<String> {
    let headings: Vec<(usize, usize, String)> = any_heading_re()
        .captures_iter(markdown)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let title = caps.get(1)?.as_str().to_lowercase();
            Some((whole.start(), whole.end(), title))
        })
        .collect();

    let Some(idx) = headings
        .iter()
        .position(|(_, _, title)| titles.iter().any(|t| title.starts_with(t)))
    else {
        return Vec::new();
    };

    let start = headings[idx].1;
    let end = headings
        .get(idx + 1)
        .map(|(s, _, _)| *s)
        .unwrap_or(markdown.len());

    markdown[start..end]
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| list_marker_re().replace(line, "").trim().to_string())
        .filter(|item| !item.is_empty() && !is_template_filler(item))
        .collect()
}

/// `Python, SQL; Power BI` → three items.
fn split_items(items: Vec<String>) -> Vec<String> {
    items
        .iter()
        .flat_map(|item| item.split([',', ';']))
        .map(|s| s.trim().trim_end_matches('.').trim())
        .filter(|s| !s.is_empty() && !is_template_filler(s))
        .map(str::to_string)
        .collect()
}

fn is_template_filler(item: &str) -> bool {
    matches!(item, "..." | "…" | "etc" | "etc.") || item.starts_with('[')
}
