//! Candidate name and email detection.

use std::sync::OnceLock;

use regex::Regex;

pub const UNKNOWN_CANDIDATE: &str = "Candidato não identificado";

/// Lower-cased everywhere except as the first word.
const PARTICLES: &[&str] = &["de", "da", "do", "dos", "das", "e"];

/// Accent restoration for names commonly typed without diacritics in file names.
const ACCENT_FIXES: &[(&str, &str)] = &[
    ("joao", "João"),
    ("jose", "José"),
    ("antonio", "Antônio"),
    ("conceicao", "Conceição"),
    ("sebastiao", "Sebastião"),
    ("simao", "Simão"),
    ("goncalves", "Gonçalves"),
    ("araujo", "Araújo"),
    ("simoes", "Simões"),
    ("lucia", "Lúcia"),
];

fn prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^curr[ií]culo[\s_.\-]*").expect("valid prefix regex"))
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b")
            .expect("valid email regex")
    })
}

fn labelled_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^[ \t]*(?:nome(?: completo)?|name)[ \t]*:[ \t]*(\S.*)$")
            .expect("valid name regex")
    })
}

fn name_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^[ \t]*#{1,4}[ \t]*nome completo[ \t]*\n+[ \t]*(\S.*)$")
            .expect("valid heading regex")
    })
}

/// `CurriculoJoaoDaSilva.pdf` → `João da Silva`.
pub fn name_from_file_name(file_name: &str) -> Option<String> {
    let base = file_name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(file_name);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };

    let stem = prefix_re().replace(stem, "");
    let spaced: String = stem
        .chars()
        .map(|c| if matches!(c, '_' | '-' | '.') { ' ' } else { c })
        .collect();
    let split = split_camel_case(&spaced);

    let words: Vec<String> = split
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphabetic))
        .enumerate()
        .map(|(i, w)| normalize_word(w, i == 0))
        .collect();

    (!words.is_empty()).then(|| words.join(" "))
}

/// Inserts a space at lower→upper boundaries and before the last capital of
/// an upper-case run followed by lower case (`ALFREDOQuirino` → `ALFREDO Quirino`).
fn split_camel_case(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || (prev.is_uppercase() && next_is_lower) {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

fn normalize_word(word: &str, first: bool) -> String {
    let lower = word.to_lowercase();
    if !first && PARTICLES.contains(&lower.as_str()) {
        return lower;
    }
    if let Some((_, fixed)) = ACCENT_FIXES.iter().find(|(plain, _)| *plain == lower) {
        return (*fixed).to_string();
    }
    let mut chars = lower.chars();
    match chars.next() {
        Some(head) => head.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Name given by a `Nome:`/`Name:` line or under a `Nome Completo` heading.
pub fn labelled_name(content: &str) -> Option<String> {
    labelled_name_re()
        .captures(content)
        .or_else(|| name_heading_re().captures(content))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty() && !name.starts_with('['))
}

/// Labelled name, else the first line that looks like a title.
pub fn name_from_content(content: &str) -> String {
    if let Some(name) = labelled_name(content) {
        return name;
    }

    content
        .lines()
        .map(|line| line.trim().trim_start_matches('#').trim())
        .find(|line| is_plausible_title(line))
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_CANDIDATE.to_string())
}

fn is_plausible_title(line: &str) -> bool {
    !line.is_empty()
        && line.chars().count() <= 80
        && line.chars().any(char::is_alphabetic)
        && !line.contains('@')
        && !line.to_lowercase().contains("http")
        && !line.to_lowercase().starts_with("curr")
}

/// First email address in the text.
pub fn extract_email(content: &str) -> Option<String> {
    email_re().find(content).map(|m| m.as_str().to_string())
}
