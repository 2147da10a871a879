use aho_corasick::AhoCorasick;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

use super::args::{self, required_string};
use crate::host::{CatalogEntry, Host};
use crate::types::ToolResult;

/// Upper bound on the workspace listing a search scans.
pub const MAX_WORKSPACE_FILES: usize = 10_000;
const DEFAULT_MAX_RESULTS: i64 = 20;
const MAX_RESULTS_LIMIT: i64 = 100;

pub(super) async fn search_project_files(host: &dyn Host, args: &Value) -> Result<ToolResult> {
    let query = required_string(args, "query", &["query"])?;
    let max_results = args::count(args, "maxResults", DEFAULT_MAX_RESULTS, 1, MAX_RESULTS_LIMIT);
    if host.workspace_root().is_none() {
        return Ok(ToolResult::failure("No workspace folder is open."));
    }

    let files = host
        .list_workspace_files(MAX_WORKSPACE_FILES)
        .await
        .context("Failed to list workspace files")?;
    let matches = match_paths(&files, query, max_results);

    Ok(ToolResult::info(json!({
        "query": query,
        "count": matches.len(),
        "files": matches,
    })))
}

/// Case-insensitive substring match; when nothing matches, every
/// whitespace-separated token must appear somewhere in the path.
fn match_paths<'a>(files: &'a [String], query: &str, max_results: usize) -> Vec<&'a str> {
    let lower = query.to_lowercase();
    let direct: Vec<&str> = files
        .iter()
        .filter(|path| path.to_lowercase().contains(&lower))
        .take(max_results)
        .map(String::as_str)
        .collect();
    if !direct.is_empty() {
        return direct;
    }

    let tokens: Vec<&str> = lower.split_whitespace().collect();
    if tokens.len() < 2 {
        return direct;
    }
    files
        .iter()
        .filter(|path| {
            let path = path.to_lowercase();
            tokens.iter().all(|token| path.contains(token))
        })
        .take(max_results)
        .map(String::as_str)
        .collect()
}

pub(super) async fn search_available_commands(host: &dyn Host, args: &Value) -> Result<ToolResult> {
    let query = required_string(args, "query", &["query"])?;
    let max_results = args::count(args, "maxResults", DEFAULT_MAX_RESULTS, 1, MAX_RESULTS_LIMIT);
    let include_internal = args::flag(args, "includeInternal");

    let catalog = host.command_catalog().await;
    let candidates: Vec<&CatalogEntry> = catalog
        .iter()
        .filter(|entry| include_internal || !entry.command_id.starts_with('_'))
        .collect();
    let ranked = rank_catalog(&candidates, query, max_results)?;

    Ok(ToolResult::info(json!({
        "query": query,
        "count": ranked.len(),
        "results": ranked,
    })))
}

const FIELD_WEIGHTS: [f64; 6] = [0.65, 0.55, 0.2, 0.1, 0.08, 0.05];

fn entry_fields(entry: &CatalogEntry) -> [Option<&str>; 6] {
    [
        entry.keys.as_deref(),
        Some(entry.command_id.as_str()),
        entry.title.as_deref(),
        entry.category.as_deref(),
        entry.when.as_deref(),
        entry.source.as_deref(),
    ]
}

/// Scores each entry by the query tokens found in its weighted fields.
/// Entries matching more distinct tokens always rank first; ties break on
/// the weighted score, then on command id.
fn rank_catalog<'a>(
    entries: &[&'a CatalogEntry],
    query: &str,
    max_results: usize,
) -> Result<Vec<&'a CatalogEntry>> {
    let mut tokens: Vec<String> = query
        .split_whitespace()
        .map(|token| token.to_lowercase())
        .collect();
    tokens.dedup();
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let matcher = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(&tokens)
        .context("Failed to build command search matcher")?;
    let token_count = tokens.len() as f64;

    let mut scored: Vec<(usize, f64, &CatalogEntry)> = entries
        .iter()
        .filter_map(|entry| {
            let mut covered = HashSet::new();
            let mut score = 0.0;
            for (field, weight) in entry_fields(entry).into_iter().zip(FIELD_WEIGHTS) {
                let Some(field) = field else { continue };
                let hits: HashSet<usize> = matcher
                    .find_overlapping_iter(field)
                    .map(|found| found.pattern().as_usize())
                    .collect();
                score += weight * hits.len() as f64 / token_count;
                covered.extend(hits);
            }
            (!covered.is_empty()).then_some((covered.len(), score, *entry))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
            .then_with(|| a.2.command_id.cmp(&b.2.command_id))
    });

    Ok(scored
        .into_iter()
        .take(max_results)
        .map(|(_, _, entry)| entry)
        .collect())
}
