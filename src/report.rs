//! Operator-facing report rendering.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write;

use crate::reconcile::{Agreement, Classification, DivergenceReport, SessionDiff};
use crate::room::StateEvent;

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

fn describe_event(event: &StateEvent) -> String {
    match (event.event_type(), event.state_key()) {
        (Some(kind), Some("")) => format!("{} ({})", event.event_id, kind),
        (Some(kind), Some(key)) => format!("{} ({} {})", event.event_id, kind, key),
        (Some(kind), None) => format!("{} ({})", event.event_id, kind),
        (None, _) => event.event_id.clone(),
    }
}

fn status_line(report: &DivergenceReport) -> String {
    let total = report.sessions.len();
    let reachable = report.sessions.values().filter(|s| !s.unreachable).count();
    match report.classification {
        Classification::InSync => format!(
            "{}: in sync across {} ({})",
            report.room_id,
            plural(total, "homeserver"),
            plural(report.common_event_count, "state event")
        ),
        Classification::Diverged => format!(
            "{}: DIVERGED ({} common to all {} homeservers)",
            report.room_id,
            plural(report.common_event_count, "state event"),
            total
        ),
        Classification::PartialReachability => {
            let verdict = match report.agreement {
                Agreement::InSync => "reachable homeservers agree",
                Agreement::Diverged => "reachable homeservers DIVERGED",
                Agreement::NotCompared => "too few reachable homeservers to compare",
            };
            format!(
                "{}: PARTIALLY REACHABLE ({} of {} reachable, {})",
                report.room_id, reachable, total, verdict
            )
        }
        Classification::TotallyUnreachable => format!(
            "{}: UNREACHABLE on all {} homeservers, no state compared",
            report.room_id, total
        ),
    }
}

fn session_line(identity: &str, session: &SessionDiff) -> String {
    if session.unreachable {
        let reason = session.failure.as_deref().unwrap_or("unknown failure");
        return format!("  {} [{}]: unreachable ({})", identity, session.home_domain, reason);
    }

    let mut line = format!(
        "  {} [{}]: {}",
        identity,
        session.home_domain,
        plural(session.extra_events.len(), "extra state event")
    );
    if !session.missing_event_ids.is_empty() {
        let _ = write!(line, ", {} missing", session.missing_event_ids.len());
    }
    let _ = write!(line, " (holds {})", session.state_event_count);
    line
}

/// Render one room's report as text.
///
/// Pure: the output depends only on the report and the flag. With
/// `list_extra_events` every extra event gets its own indented line.
pub fn format_report(report: &DivergenceReport, list_extra_events: bool) -> String {
    let mut out = status_line(report);

    if report.classification == Classification::InSync {
        return out;
    }

    for (identity, session) in &report.sessions {
        out.push('\n');
        out.push_str(&session_line(identity, session));
        if list_extra_events {
            for event in &session.extra_events {
                out.push_str("\n    + ");
                out.push_str(&describe_event(event));
            }
        }
    }

    let domains: BTreeSet<&str> = report
        .sessions
        .values()
        .filter(|s| !s.extra_events.is_empty())
        .map(|s| s.home_domain.as_str())
        .collect();
    if !domains.is_empty() {
        out.push_str("\n  diverged on: ");
        out.push_str(&domains.into_iter().collect::<Vec<_>>().join(", "));
    }

    out
}

#[derive(Serialize)]
struct ReportLine<'a> {
    run_id: &'a str,
    checked_at: String,
    #[serde(flatten)]
    report: &'a DivergenceReport,
}

/// Render one room's report as a single JSON line tagged with the run.
pub fn format_json_line(
    report: &DivergenceReport,
    run_id: &str,
    checked_at: DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ReportLine {
        run_id,
        checked_at: checked_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        report,
    })
}
