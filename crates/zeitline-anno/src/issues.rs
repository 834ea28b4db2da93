//! Issue list input.
//!
//! The metadata-selection step emits a CSV with one issue per line:
//! `aid,title,date` where `date` is `yyyymmdd`. Titles may themselves
//! contain commas, so the line is split from both ends: first field is
//! the aid, last field the date, everything between is the title.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

/// One published newspaper edition to harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Archive identifier of the newspaper title
    pub aid: String,
    pub title: String,
    pub date: NaiveDate,
}

/// Load the issue list, skipping an optional `aid,...` header line.
pub fn load_issues(path: &Path) -> Result<Vec<Issue>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read issue list: {}", path.display()))?;

    let mut issues = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if lineno == 0 && line.starts_with("aid,") {
            continue;
        }
        let issue = parse_line(line)
            .with_context(|| format!("{}:{}: bad issue line", path.display(), lineno + 1))?;
        issues.push(issue);
    }
    Ok(issues)
}

fn parse_line(line: &str) -> Result<Issue> {
    let Some((aid, rest)) = line.split_once(',') else {
        bail!("expected `aid,title,date`, got {line:?}");
    };
    let Some((title, date)) = rest.rsplit_once(',') else {
        bail!("expected `aid,title,date`, got {line:?}");
    };
    let aid = aid.trim();
    let date = date.trim();
    if aid.is_empty() {
        bail!("empty aid");
    }
    Ok(Issue {
        aid: aid.to_string(),
        title: title.trim().trim_matches('"').to_string(),
        date: parse_date(date)?,
    })
}

/// Accept `yyyymmdd` (the selection step's format) or ISO `yyyy-mm-dd`.
fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .with_context(|| format!("bad issue date: {s:?}"))
}
