//! Best-effort parsing of the model's sectioned analysis reply.
//!
//! The combined prompt asks for `### RESUMO`, `### OPINIÃO` and `### SCORE`.
//! Models drift: extra prose around the sections, two to four `#` marks,
//! `Opiniao` without the tilde, `7`, `7.5` or `7,5` as the score. All of that
//! is accepted. Nothing here ever fails; missing pieces become placeholders.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::Score;

pub const SUMMARY_NOT_FOUND: &str = "Resumo não encontrado.";
pub const OPINION_NOT_FOUND: &str = "Opinião não encontrada.";
pub const SUMMARY_UNAVAILABLE: &str = "Resumo indisponível.";
pub const OPINION_UNAVAILABLE: &str = "Opinião indisponível.";

/// Summary, opinion and score extracted from one analysis reply.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub summary: String,
    pub opinion: String,
    /// `None` only when a producer could not come up with any value at all.
    pub score: Option<f64>,
}

pub trait AnalysisParser: Send + Sync {
    fn parse(&self, reply: &str) -> AnalysisReport;
}

/// Regex implementation that slices the reply between section headings.
#[derive(Debug, Default, Clone, Copy)]
pub struct SectionParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Summary,
    Opinion,
    Score,
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^[ \t]*#{2,4}[ \t]*(RESUMO|OPINI[ÃA]O|SCORE)\b[ \t:]*")
            .expect("valid heading regex")
    })
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d{1,3}(?:[.,]\d+)?").expect("valid number regex"))
}

impl SectionParser {
    /// Body of the first heading of `wanted`, up to the next recognised heading.
    /// Only the first heading of each kind opens a section; repeats such as a
    /// `## Resumo Profissional` inside the summary stay part of the body.
    fn section<'a>(&self, reply: &'a str, wanted: Section) -> Option<&'a str> {
        let mut seen = Vec::with_capacity(3);
        let headings: Vec<(Section, usize, usize)> = heading_re()
            .captures_iter(reply)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let kind = match caps.get(1)?.as_str().to_uppercase().as_str() {
                    "RESUMO" => Section::Summary,
                    "SCORE" => Section::Score,
                    _ => Section::Opinion,
                };
                Some((kind, whole.start(), whole.end()))
            })
            .filter(|(kind, _, _)| {
                if seen.contains(kind) {
                    false
                } else {
                    seen.push(*kind);
                    true
                }
            })
            .collect();

        let idx = headings.iter().position(|(kind, _, _)| *kind == wanted)?;
        let body_start = headings[idx].2;
        let body_end = headings
            .get(idx + 1)
            .map(|(_, start, _)| *start)
            .unwrap_or(reply.len());
        Some(reply[body_start..body_end].trim())
    }
}

impl AnalysisParser for SectionParser {
    fn parse(&self, reply: &str) -> AnalysisReport {
        if reply.trim().is_empty() {
            return AnalysisReport {
                summary: SUMMARY_UNAVAILABLE.to_string(),
                opinion: OPINION_UNAVAILABLE.to_string(),
                score: Some(Score::FALLBACK),
            };
        }

        let text_or = |section: Option<&str>, placeholder: &str| match section {
            Some(body) if !body.is_empty() => body.to_string(),
            _ => placeholder.to_string(),
        };

        let summary = text_or(self.section(reply, Section::Summary), SUMMARY_NOT_FOUND);
        let opinion = text_or(self.section(reply, Section::Opinion), OPINION_NOT_FOUND);
        let score = self
            .section(reply, Section::Score)
            .and_then(first_number)
            .map(|raw| raw.clamp(Score::MIN, Score::MAX))
            .unwrap_or(Score::FALLBACK);

        AnalysisReport {
            summary,
            opinion,
            score: Some(score),
        }
    }
}

/// First number in `text`, accepting `,` as the decimal separator.
fn first_number(text: &str) -> Option<f64> {
    let m = number_re().find(text)?;
    m.as_str().replace(',', ".").parse().ok()
}
