use crate::aggregate::{Breakdown, WeekReport};
use crate::git::Selection;
use crate::model::{SelectionStatus, SCHEMA_VERSION};
use crate::run::RunReport;
use anyhow::Result;
use console::style;
use serde::Serialize;
use std::collections::BTreeMap;

pub fn output_json(report: &RunReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[derive(Serialize)]
struct WeekRow<'a> {
    period: &'a str,
    #[serde(flatten)]
    week: &'a WeekReport,
}

/// One line per weekly bucket, period by period, oldest week first.
pub fn output_ndjson(report: &RunReport) -> Result<()> {
    for period in &report.periods {
        for week in &period.weeks {
            let row = WeekRow {
                period: &period.period.label,
                week,
            };
            println!("{}", serde_json::to_string(&row)?);
        }
    }
    Ok(())
}

pub fn output_summary(report: &RunReport) -> Result<()> {
    println!(
        "{} {} candidates, {} repositories selected",
        style("Scanned").bold(),
        report.candidates,
        report.repos.len()
    );

    for period in &report.periods {
        let t = &period.totals;
        println!();
        println!("{}", style(format!("Period {}", period.period)).bold());
        println!("{}", "─".repeat(50));
        println!(
            "  me:        {:>6} commits  {:>9} changed  (+{} / -{})",
            t.me.commits, t.me.changed, t.me.insertions, t.me.deletions
        );
        println!(
            "  others:    {:>6} commits  {:>9} changed",
            t.others.commits, t.others.changed
        );
        println!(
            "  bootstrap: {:>6} commits  {:>9} changed (excluded)",
            t.me_bootstrap.commits + t.others_bootstrap.commits,
            t.me_bootstrap.changed + t.others_bootstrap.changed
        );
        println!(
            "  repos: {} total, {} with commits, {} active, {} new ({} started by me)",
            t.repos_total, t.repos_with_commits, t.repos_active, t.repos_new, t.repos_new_by_me
        );

        let languages = top_by_my_churn(&period.languages);
        if !languages.is_empty() {
            println!("  languages: {}", languages.join(", "));
        }
        let directories = top_by_my_churn(&period.directories);
        if !directories.is_empty() {
            println!("  directories: {}", directories.join(", "));
        }

        let busiest = period
            .weeks
            .iter()
            .max_by(|a, b| {
                a.bucket
                    .totals
                    .me
                    .normal
                    .changed
                    .cmp(&b.bucket.totals.me.normal.changed)
                    .then_with(|| b.bucket.week_start.cmp(&a.bucket.week_start))
            })
            .filter(|w| w.bucket.totals.me.normal.changed > 0);
        if let Some(week) = busiest {
            println!(
                "  busiest week: {} ({} changed, top repo share {:.0}%)",
                week.bucket.week_start.format("%Y-%m-%d"),
                week.bucket.totals.me.normal.changed,
                week.repo_activity_top1_share_changed * 100.0
            );
        }
    }

    if !report.failures.is_empty() {
        println!();
        println!("{}", style(format!("{} failures", report.failures.len())).yellow());
        for failure in &report.failures {
            println!("  {} {:?}: {}", failure.path.display(), failure.kind, failure.message);
        }
    }
    Ok(())
}

/// The five keys with the most "me" normal changed lines, as `key lines`.
fn top_by_my_churn(map: &BTreeMap<String, Breakdown>) -> Vec<String> {
    let mut ranked: Vec<(&String, u64)> = map
        .iter()
        .map(|(key, b)| (key, b.me.normal.changed))
        .filter(|(_, changed)| *changed > 0)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(5)
        .map(|(key, changed)| format!("{key} {changed}"))
        .collect()
}

#[derive(Serialize)]
struct SelectionOutput<'a> {
    version: u32,
    candidates: usize,
    selection: &'a Selection,
}

pub fn output_selection_json(selection: &Selection) -> Result<()> {
    let output = SelectionOutput {
        version: SCHEMA_VERSION,
        candidates: selection.candidates,
        selection,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn output_selection(selection: &Selection) -> Result<()> {
    if selection.rows.is_empty() {
        println!("No repositories found");
        return Ok(());
    }

    for row in &selection.rows {
        let status = match row.status {
            SelectionStatus::Included => style("included ").green(),
            SelectionStatus::Duplicate => style("duplicate").yellow(),
            SelectionStatus::Skipped => style("skipped  ").red(),
        };
        let reason = serde_json::to_string(&row.reason)?;
        println!(
            "{} {}  {}  {}",
            status,
            row.candidate_path.display(),
            row.canonical_remote.as_deref().unwrap_or("-"),
            reason.trim_matches('"')
        );
    }
    println!("{}", "─".repeat(50));
    println!(
        "{} of {} candidates selected",
        style(selection.repos.len()).bold(),
        selection.candidates
    );
    Ok(())
}
