//! CLI output for the index commands
//!
//! Formatters return strings so main only decides where they go.

use chrono::{DateTime, Local, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use serde::Serialize;
use wbi_core::catalog::{RiskClass, RiskDescriptor};
use wbi_core::{ErrorSeverity, FetchOutcome, IndexEvent, IndexSnapshot, IndexStatus, RefreshReport};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug)]
pub enum CliError {
    UnknownDistrict {
        query: String,
        suggestions: Vec<String>,
    },
    AmbiguousDistrict {
        query: String,
        matches: Vec<String>,
    },
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::UnknownDistrict { query, suggestions } => {
                write!(f, "Landkreis {} nicht gefunden.", query)?;
                if !suggestions.is_empty() {
                    write!(f, "\nMeinten Sie:")?;
                    for suggestion in suggestions {
                        write!(f, "\n  - {}", suggestion)?;
                    }
                }
                Ok(())
            }
            CliError::AmbiguousDistrict { query, matches } => {
                write!(
                    f,
                    "Ambiguous district '{}': matches {}",
                    query,
                    matches.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for CliError {}

// ============================================================================
// Query Helpers
// ============================================================================

/// Resolve user input to a published district name
///
/// Exact match first, then a unique case-insensitive match.
pub fn resolve_district<'a>(
    names: impl IntoIterator<Item = &'a str>,
    query: &str,
) -> Result<String, CliError> {
    let names: Vec<&str> = names.into_iter().collect();
    let query = query.trim();

    if let Some(name) = names.iter().find(|n| **n == query) {
        return Ok(name.to_string());
    }

    let query_lower = query.to_lowercase();
    let exact_ci: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| n.to_lowercase() == query_lower)
        .collect();

    match exact_ci.len() {
        1 => Ok(exact_ci[0].to_string()),
        0 => Err(CliError::UnknownDistrict {
            query: query.to_string(),
            suggestions: names
                .iter()
                .filter(|n| {
                    let lower = n.to_lowercase();
                    !query_lower.is_empty()
                        && (lower.contains(&query_lower) || query_lower.contains(&lower))
                })
                .take(5)
                .map(|n| n.to_string())
                .collect(),
        }),
        _ => Err(CliError::AmbiguousDistrict {
            query: query.to_string(),
            matches: exact_ci.into_iter().map(str::to_string).collect(),
        }),
    }
}

// ============================================================================
// Formatters
// ============================================================================

#[derive(Serialize)]
struct DistrictRow<'a> {
    district: &'a str,
    #[serde(flatten)]
    risk: RiskDescriptor,
}

#[derive(Serialize)]
struct IndexListing<'a> {
    last_updated: Option<&'a str>,
    districts: Vec<DistrictRow<'a>>,
}

fn risk_color(level: i64) -> Color {
    let (r, g, b) = RiskClass::from_level(level).rgb();
    Color::Rgb { r, g, b }
}

fn header(table: &mut Table, columns: &[&str], no_color: bool) {
    if no_color {
        table.set_header(columns.to_vec());
    } else {
        table.set_header(
            columns
                .iter()
                .map(|c| Cell::new(c).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }
}

/// Format all districts as table (human) or JSON
pub fn format_index_table(snapshot: &IndexSnapshot, json: bool, no_color: bool) -> String {
    let rows: Vec<DistrictRow<'_>> = snapshot
        .districts()
        .filter_map(|district| {
            snapshot
                .lookup(district)
                .map(|risk| DistrictRow { district, risk })
        })
        .collect();

    if json {
        let listing = IndexListing {
            last_updated: snapshot.last_updated(),
            districts: rows,
        };
        return serde_json::to_string_pretty(&listing).unwrap_or_else(|_| "{}".to_string());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    header(
        &mut table,
        &["Landkreis", "Stufe", "Farbe", "Beschreibung"],
        no_color,
    );

    for row in &rows {
        let level = row.risk.level.to_string();
        if no_color {
            table.add_row(Row::from(vec![
                row.district,
                level.as_str(),
                row.risk.color,
                row.risk.description,
            ]));
        } else {
            let color = risk_color(row.risk.level);
            table.add_row(Row::from(vec![
                Cell::new(row.district),
                Cell::new(&level).fg(color),
                Cell::new(row.risk.color).fg(color),
                Cell::new(row.risk.description).fg(color),
            ]));
        }
    }

    format!("{}\n{}", format_date_line(snapshot.last_updated()), table)
}

/// Format a single district (human or JSON)
pub fn format_district(district: &str, risk: &RiskDescriptor, json: bool) -> String {
    if json {
        let row = DistrictRow {
            district,
            risk: risk.clone(),
        };
        return serde_json::to_string_pretty(&row).unwrap_or_else(|_| "{}".to_string());
    }

    format!(
        "Die Waldbrandstufe für {} beträgt: {} ({}, {})",
        district, risk.level, risk.description, risk.color
    )
}

fn format_date_line(date: Option<&str>) -> String {
    match date {
        Some(date) => format!("letzte Aktualisierung: {}", date),
        None => "Datum konnte nicht abgerufen werden.".to_string(),
    }
}

/// Format the publication date (human or JSON)
pub fn format_date(date: Option<&str>, json: bool) -> String {
    if json {
        return serde_json::json!({ "last_updated": date }).to_string();
    }
    format_date_line(date)
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Human readable duration: "2h 05m", "42s"
pub fn format_age(secs: u64) -> String {
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Format a refresh report (human or JSON)
pub fn format_refresh_report(report: &RefreshReport, json: bool) -> String {
    if json {
        let fetch = match report.fetch {
            FetchOutcome::Skipped => serde_json::json!({ "status": "skipped" }),
            FetchOutcome::Fetched { bytes } => serde_json::json!({ "status": "fetched", "bytes": bytes }),
            FetchOutcome::Failed => serde_json::json!({ "status": "failed" }),
        };
        let issues: Vec<_> = report
            .issues
            .iter()
            .map(|issue| {
                serde_json::json!({
                    "source": issue.source,
                    "severity": severity_label(issue.severity),
                    "message": issue.message,
                    "suggestion": issue.suggestion,
                })
            })
            .collect();
        let value = serde_json::json!({
            "fetch": fetch,
            "reloaded": report.reloaded,
            "districts": report.districts,
            "issues": issues,
        });
        return serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());
    }

    let mut lines = vec![];
    lines.push(match report.fetch {
        FetchOutcome::Skipped => "Cache is fresh, nothing fetched".to_string(),
        FetchOutcome::Fetched { bytes } => format!("Fetched {} bytes", bytes),
        FetchOutcome::Failed => "Fetch failed, serving cached data".to_string(),
    });
    lines.push(format!(
        "{} districts{}",
        report.districts,
        if report.reloaded { " (reloaded)" } else { "" }
    ));
    for issue in &report.issues {
        lines.push(format!(
            "  [{}] {}: {}",
            severity_label(issue.severity),
            issue.source,
            issue.message
        ));
        if let Some(suggestion) = &issue.suggestion {
            lines.push(format!("         💡 {}", suggestion));
        }
    }
    lines.join("\n")
}

fn severity_label(severity: ErrorSeverity) -> &'static str {
    match severity {
        ErrorSeverity::Warning => "warning",
        ErrorSeverity::Error => "error",
    }
}

/// Format cache and index status (human or JSON)
pub fn format_status(status: &IndexStatus, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(status).unwrap_or_else(|_| "{}".to_string());
    }

    let mut lines = vec![];
    lines.push(format!("Source:           {}", status.source_url));
    lines.push(format!("Cache file:       {}", status.cache_path.display()));
    lines.push(format!(
        "Fetched at:       {}",
        status
            .cached_at
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string())
    ));
    lines.push(format!(
        "Age:              {} (TTL {})",
        status
            .age_secs
            .map(format_age)
            .unwrap_or_else(|| "-".to_string()),
        format_age(status.ttl_secs)
    ));
    lines.push(format!(
        "Stale:            {}",
        if status.stale { "yes" } else { "no" }
    ));
    lines.push(format!("Districts:        {}", status.districts));
    lines.push(format!(
        "Published:        {}",
        status.last_updated.as_deref().unwrap_or("-")
    ));
    lines.push(format!("Loaded at:        {}", format_timestamp(status.loaded_at)));
    lines.join("\n")
}

/// One log line per index event, for `watch`
pub fn format_event(event: &IndexEvent) -> String {
    let now = Local::now().format("%H:%M:%S");
    match event {
        IndexEvent::CacheRefreshed { bytes } => format!("[{}] cache refreshed ({} bytes)", now, bytes),
        IndexEvent::FetchFailed(message) => format!("[{}] fetch failed: {}", now, message),
        IndexEvent::ParseFailed(message) => format!("[{}] malformed document: {}", now, message),
        IndexEvent::IndexReloaded {
            districts,
            last_updated,
        } => format!(
            "[{}] index reloaded: {} districts, published {}",
            now,
            districts,
            last_updated.as_deref().unwrap_or("-")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wbi_core::catalog::describe;
    use wbi_core::{CoreError, RefreshIssue};

    const NAMES: [&str; 4] = ["Barnim", "Märkisch-Oderland", "Oder-Spree", "Oberhavel"];

    #[test]
    fn test_resolve_exact() {
        assert_eq!(resolve_district(NAMES, "Barnim").unwrap(), "Barnim");
        assert_eq!(resolve_district(NAMES, "  Oder-Spree ").unwrap(), "Oder-Spree");
    }

    #[test]
    fn test_resolve_case_insensitive() {
        assert_eq!(
            resolve_district(NAMES, "märkisch-oderland").unwrap(),
            "Märkisch-Oderland"
        );
    }

    #[test]
    fn test_resolve_unknown_with_suggestions() {
        let err = resolve_district(NAMES, "oder").unwrap_err();
        match &err {
            CliError::UnknownDistrict { suggestions, .. } => {
                assert_eq!(suggestions, &vec!["Märkisch-Oderland", "Oder-Spree"]);
            }
            other => panic!("Expected UnknownDistrict, got {other:?}"),
        }
        assert!(err.to_string().starts_with("Landkreis oder nicht gefunden."));
    }

    #[test]
    fn test_resolve_unknown_without_suggestions() {
        let err = resolve_district(NAMES, "Nonexistent").unwrap_err();
        assert_eq!(err.to_string(), "Landkreis Nonexistent nicht gefunden.");
    }

    #[test]
    fn test_resolve_ambiguous() {
        let err = resolve_district(["Barnim", "BARNIM"], "barnim").unwrap_err();
        assert!(matches!(err, CliError::AmbiguousDistrict { .. }));
    }

    #[test]
    fn test_format_district() {
        let human = format_district("Barnim", &describe(3), false);
        assert_eq!(
            human,
            "Die Waldbrandstufe für Barnim beträgt: 3 (Mittlere Gefahr, #ffc107)"
        );

        let json: serde_json::Value =
            serde_json::from_str(&format_district("Barnim", &describe(3), true)).unwrap();
        assert_eq!(json["district"], "Barnim");
        assert_eq!(json["level"], 3);
        assert_eq!(json["color"], "#ffc107");
        assert_eq!(json["description"], "Mittlere Gefahr");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(
            format_date(Some("2025-03-11"), false),
            "letzte Aktualisierung: 2025-03-11"
        );
        assert_eq!(
            format_date(None, false),
            "Datum konnte nicht abgerufen werden."
        );
        assert_eq!(format_date(None, true), r#"{"last_updated":null}"#);
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(42), "42s");
        assert_eq!(format_age(125), "2m 05s");
        assert_eq!(format_age(10800), "3h 00m");
    }

    #[test]
    fn test_format_refresh_report() {
        let mut report = RefreshReport::new();
        report.fetch = FetchOutcome::Failed;
        report.districts = 14;
        report.add_warning("fetch", "connection refused");

        let human = format_refresh_report(&report, false);
        assert!(human.contains("Fetch failed, serving cached data"));
        assert!(human.contains("14 districts"));
        assert!(human.contains("[warning] fetch: connection refused"));

        let json: serde_json::Value =
            serde_json::from_str(&format_refresh_report(&report, true)).unwrap();
        assert_eq!(json["fetch"]["status"], "failed");
        assert_eq!(json["reloaded"], false);
        assert_eq!(json["issues"][0]["severity"], "warning");
    }

    #[test]
    fn test_format_refresh_report_parse_error() {
        let mut report = RefreshReport::new();
        report.fetch = FetchOutcome::Failed;
        report.add_issue(RefreshIssue::from_core_error(
            "parser",
            &CoreError::MissingElement { element: "tag" },
        ));

        let human = format_refresh_report(&report, false);
        assert!(human.contains("[error] parser: Malformed input: expected <tag> element"));
        assert!(human.contains("previous data kept"));
    }

    #[test]
    fn test_format_event() {
        let line = format_event(&IndexEvent::IndexReloaded {
            districts: 14,
            last_updated: Some("2025-03-11".to_string()),
        });
        assert!(line.ends_with("index reloaded: 14 districts, published 2025-03-11"));
    }
}
