//! Structure-aware sentence extraction from OKR Markdown.
//!
//! A small line parser walks each chunk and emits typed [`Sentence`]s:
//!
//! | Markdown | Category |
//! |----------|----------|
//! | `#`/`##` heading mentioning "objective" | [`Category::Objective`] |
//! | list item starting `KR<n>:` | [`Category::KeyResult`] |
//! | list item under a `Risk`/`Risks` heading | [`Category::Risk`] |
//! | any other prose, split into sentences | [`Category::Generic`] |
//!
//! Inline markup (emphasis, code ticks, links, images, HTML tags) is
//! stripped before anything is emitted. Fenced code blocks are skipped.
//! Every sentence records the path of the chunk it came from.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{Category, Chunk, Sentence};

/// Shortest generic sentence kept, in characters.
pub const MIN_GENERIC_CHARS: usize = 20;
/// Longest generic sentence kept, in characters.
pub const MAX_GENERIC_CHARS: usize = 300;
/// Risk items must be longer than this many characters.
pub const MIN_RISK_CHARS: usize = 10;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

fn kr_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^KR\d+:")
}

fn structural_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)^(objective\b|kr\s*\d+\s*:)")
}

fn ordered_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^\d+[.)]\s+")
}

fn image() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"!\[([^\]]*)\]\([^)]*\)")
}

fn link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\[([^\]]*)\]\([^)]*\)")
}

fn html_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"</?[A-Za-z][^>]*>")
}

fn emphasis() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\*+|~~|__|`")
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\s+")
}

fn sentence_end() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"[.!?]\s+")
}

/// One classified Markdown line.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Fence,
    Heading { level: usize, text: &'a str },
    ListItem(&'a str),
    Text(&'a str),
}

fn classify(raw: &str) -> Line<'_> {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Blank;
    }
    if line.starts_with("```") || line.starts_with("~~~") {
        return Line::Fence;
    }

    let hashes = line.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) {
        let rest = &line[hashes..];
        if rest.is_empty() || rest.starts_with(' ') {
            let text = rest.trim().trim_end_matches('#').trim();
            return Line::Heading {
                level: hashes,
                text,
            };
        }
    }

    for marker in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Line::ListItem(strip_checkbox(rest.trim()));
        }
    }
    if let Some(m) = ordered_marker().find(line) {
        return Line::ListItem(strip_checkbox(line[m.end()..].trim()));
    }

    Line::Text(line.trim_start_matches('>').trim())
}

fn strip_checkbox(item: &str) -> &str {
    for box_ in ["[ ] ", "[x] ", "[X] "] {
        if let Some(rest) = item.strip_prefix(box_) {
            return rest.trim();
        }
    }
    item
}

/// Remove inline Markdown and HTML markup, collapsing whitespace.
pub fn strip_markup(text: &str) -> String {
    let text = image().replace_all(text, "$1");
    let text = link().replace_all(&text, "$1");
    let text = html_tag().replace_all(&text, " ");
    let text = emphasis().replace_all(&text, "");
    whitespace().replace_all(&text, " ").trim().to_string()
}

/// Split prose into sentences on `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in sentence_end().find_iter(text) {
        let piece = text[start..m.start() + 1].trim();
        if !piece.is_empty() {
            out.push(piece);
        }
        start = m.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

/// Whether a sentence reads like an objective or key-result line.
pub fn looks_structural(sentence: &str) -> bool {
    structural_prefix().is_match(sentence)
}

fn is_risk_heading(text: &str) -> bool {
    let t = text.trim().trim_end_matches(':').trim().to_lowercase();
    t == "risk" || t == "risks"
}

fn objective_text(heading: &str) -> String {
    if heading.to_lowercase().starts_with("objective") {
        heading.to_string()
    } else {
        format!("Objective: {}", heading)
    }
}

/// Extract every tagged sentence from one chunk, in document order.
pub fn extract_sentences(chunk: &Chunk) -> Vec<Sentence> {
    let path = chunk.path();
    let mut sentences = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_risks = false;
    let mut in_fence = false;

    let emit = |text: String, category: Category, out: &mut Vec<Sentence>| {
        out.push(Sentence {
            text,
            path: path.to_string(),
            category,
        });
    };

    let flush = |current: &mut String, paragraphs: &mut Vec<String>| {
        if !current.is_empty() {
            paragraphs.push(std::mem::take(current));
        }
    };

    for raw in chunk.text.lines() {
        let line = classify(raw);
        if line == Line::Fence {
            in_fence = !in_fence;
            flush(&mut current, &mut paragraphs);
            continue;
        }
        if in_fence {
            continue;
        }

        match line {
            Line::Blank | Line::Fence => flush(&mut current, &mut paragraphs),
            Line::Heading { level, text } => {
                flush(&mut current, &mut paragraphs);
                let text = strip_markup(text);
                in_risks = is_risk_heading(&text);
                if level == 1 && text.to_lowercase().contains("objective") {
                    emit(objective_text(&text), Category::Objective, &mut sentences);
                }
            }
            Line::ListItem(item) => {
                flush(&mut current, &mut paragraphs);
                let item = strip_markup(item);
                if item.is_empty() {
                    continue;
                }
                if kr_prefix().is_match(&item) {
                    emit(item, Category::KeyResult, &mut sentences);
                } else if in_risks {
                    if item.chars().count() > MIN_RISK_CHARS {
                        emit(item, Category::Risk, &mut sentences);
                    }
                } else {
                    paragraphs.push(item);
                }
            }
            Line::Text(text) => {
                let text = strip_markup(text);
                if text.is_empty() {
                    continue;
                }
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&text);
            }
        }
    }
    flush(&mut current, &mut paragraphs);

    for paragraph in &paragraphs {
        for sentence in split_sentences(paragraph) {
            let len = sentence.chars().count();
            if (MIN_GENERIC_CHARS..=MAX_GENERIC_CHARS).contains(&len) && !looks_structural(sentence)
            {
                emit(sentence.to_string(), Category::Generic, &mut sentences);
            }
        }
    }

    sentences
}

/// Which structural categories a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorySelection {
    pub objectives: bool,
    pub key_results: bool,
    pub risks: bool,
}

impl CategorySelection {
    pub fn includes(&self, category: Category) -> bool {
        match category {
            Category::Objective => self.objectives,
            Category::KeyResult => self.key_results,
            Category::Risk => self.risks,
            Category::Generic => false,
        }
    }
}

/// Decide which categories answer `query`.
///
/// "objective" selects objectives, "key result" or "kr" anywhere in the
/// query (so "KR2" and "OKRs" too) selects key results, "risk" selects risks. A query mentioning none of
/// them gets objectives and key results.
pub fn select_categories(query: &str) -> CategorySelection {
    let lowered = query.to_lowercase();
    let selection = CategorySelection {
        objectives: lowered.contains("objective"),
        key_results: lowered.contains("key result") || lowered.contains("kr"),
        risks: lowered.contains("risk"),
    };

    if selection.objectives || selection.key_results || selection.risks {
        selection
    } else {
        CategorySelection {
            objectives: true,
            key_results: true,
            risks: false,
        }
    }
}

/// Pick the sentences to rank for `query`.
///
/// Structural sentences of the selected categories win; when there are
/// none, the generic sentences are used instead. Exact duplicates (which
/// overlapping chunks produce) are dropped, keeping the first occurrence.
pub fn select_candidates(query: &str, sentences: Vec<Sentence>) -> Vec<Sentence> {
    let selection = select_categories(query);
    let (structural, generic): (Vec<Sentence>, Vec<Sentence>) = sentences
        .into_iter()
        .partition(|s| selection.includes(s.category));

    let chosen = if structural.is_empty() {
        generic
            .into_iter()
            .filter(|s| s.category == Category::Generic)
            .collect()
    } else {
        structural
    };

    let mut seen = HashSet::new();
    chosen
        .into_iter()
        .filter(|s| seen.insert(s.text.clone()))
        .collect()
}
