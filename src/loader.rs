//! Filesystem Markdown loader.
//!
//! [`MarkdownSource`] walks the corpus directory, keeps the files matched
//! by the configured include globs (minus the excludes), splits an
//! optional YAML front-matter block off each file, and returns the
//! documents sorted by relative path.
//!
//! ```text
//! ---
//! team: Platform
//! quarter: 2025-Q3
//! owner: alice
//! ---
//! # Objective: Improve reliability
//! ```
//!
//! `team` and `quarter` populate [`Metadata`]; every other scalar key is
//! kept in `Metadata::extra`.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use okr_harness_core::error::{OkrError, Result};
use okr_harness_core::models::{Document, Metadata};
use okr_harness_core::source::DocumentSource;

use crate::config::CorpusConfig;

const DEFAULT_EXCLUDES: [&str; 2] = ["**/.git/**", "**/node_modules/**"];

/// Loads `*.md` documents from a directory tree.
pub struct MarkdownSource {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    follow_symlinks: bool,
}

impl MarkdownSource {
    pub fn new(config: &CorpusConfig) -> Result<Self> {
        let include = build_globset(&config.include_globs)?;

        let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        excludes.extend(config.exclude_globs.iter().cloned());
        let exclude = build_globset(&excludes)?;

        Ok(Self {
            root: config.dir.clone(),
            include,
            exclude,
            follow_symlinks: config.follow_symlinks,
        })
    }
}

impl DocumentSource for MarkdownSource {
    fn list_documents(&self) -> Result<Vec<Document>> {
        let root_display = self.root.display().to_string();
        if !self.root.is_dir() {
            return Err(OkrError::corpus_read(root_display, "corpus directory does not exist"));
        }

        let mut documents = Vec::new();

        let walker = WalkDir::new(&self.root).follow_links(self.follow_symlinks);
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root_display.clone());
                OkrError::corpus_read(path, e)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative_path(relative);

            if self.exclude.is_match(&rel_str) || !self.include.is_match(&rel_str) {
                continue;
            }

            let content = std::fs::read_to_string(path)
                .map_err(|e| OkrError::corpus_read(rel_str.clone(), e))?;
            documents.push(parse_document(&rel_str, &content)?);
        }

        // Sort for deterministic ordering
        documents.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::debug!(
            root = %self.root.display(),
            documents = documents.len(),
            "loaded corpus"
        );
        Ok(documents)
    }

    fn read_raw(&self, path: &str) -> Option<Vec<u8>> {
        // Only serve paths that stay inside the corpus root.
        if Path::new(path)
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            return None;
        }
        std::fs::read(self.root.join(path)).ok()
    }
}

/// Relative path with `/` separators on every platform.
fn relative_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| OkrError::corpus_read(pattern.clone(), e))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| OkrError::corpus_read("globset", e))
}

/// Split front matter from a Markdown file and build its [`Document`].
pub fn parse_document(path: &str, content: &str) -> Result<Document> {
    let (front_matter, body) = split_front_matter(content);

    let metadata = match front_matter {
        Some(raw) => parse_metadata(path, raw)?,
        None => Metadata::default(),
    };

    Ok(Document {
        path: path.to_string(),
        metadata,
        text: canonical_text(body),
        plain_text: body.to_string(),
    })
}

/// Returns `(front_matter, body)`. A file that does not open with a `---`
/// line, or never closes the block, has no front matter.
fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let Some(first_end) = content.find('\n') else {
        return (None, content);
    };
    if content[..first_end].trim() != "---" {
        return (None, content);
    }

    let rest = &content[first_end + 1..];
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim() == "---" {
            let front = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(front), body);
        }
        offset += line.len();
    }
    (None, content)
}

fn parse_metadata(path: &str, raw: &str) -> Result<Metadata> {
    let value: serde_yaml::Value = serde_yaml::from_str(raw)
        .map_err(|e| OkrError::corpus_read(path, format!("invalid front matter: {}", e)))?;

    let mut metadata = Metadata::default();
    let serde_yaml::Value::Mapping(map) = value else {
        return Ok(metadata);
    };

    let mut extra = BTreeMap::new();
    for (key, value) in map {
        let Some(key) = scalar_to_string(&key) else {
            continue;
        };
        let Some(value) = scalar_to_string(&value) else {
            continue;
        };
        match key.as_str() {
            "team" => metadata.team = value.trim().to_string(),
            "quarter" => metadata.quarter = value.trim().to_string(),
            _ => {
                extra.insert(key, value);
            }
        }
    }
    metadata.extra = extra;
    Ok(metadata)
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Canonical body text: LF line endings, no trailing whitespace on any
/// line, no leading or trailing blank space overall.
pub fn canonical_text(body: &str) -> String {
    body.replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
