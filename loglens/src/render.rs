//! Pure rendering: response data in, markup and chart mounts out.
//!
//! Nothing here touches the network or any view. [`plan_stats`] and
//! [`plan_plots`] decide *what* goes into which container; the `render_*`
//! functions produce the markup for one container.

use std::fmt::Write;

use serde_json::Value as JsonValue;

use crate::view::Notification;
use crate::{ChartSpec, PlotsBundle, Stats};

pub const NONE_PLACEHOLDER: &str = r#"<p class="text-muted">None</p>"#;
pub const TOP_ERRORS_HEADERS: [&str; 2] = ["Message", "Count"];
pub const IDLE_PERIODS_HEADERS: [&str; 3] = ["Start", "End", "Duration (min)"];

/// The fixed element identifiers the page exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Container {
    StatsDisplay,
    LevelDistribution,
    LogsPerHour,
    LevelPie,
    TopErrorsTable,
    UniqueMessages,
    ActiveUsers,
    IdlePeriods,
}

impl Container {
    pub const ALL: [Container; 8] = [
        Container::StatsDisplay,
        Container::LevelDistribution,
        Container::LogsPerHour,
        Container::LevelPie,
        Container::TopErrorsTable,
        Container::UniqueMessages,
        Container::ActiveUsers,
        Container::IdlePeriods,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Container::StatsDisplay => "statsDisplay",
            Container::LevelDistribution => "levelDistribution",
            Container::LogsPerHour => "logsPerHour",
            Container::LevelPie => "levelPie",
            Container::TopErrorsTable => "topErrorsTable",
            Container::UniqueMessages => "uniqueMessages",
            Container::ActiveUsers => "activeUsers",
            Container::IdlePeriods => "idlePeriods",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Container::StatsDisplay => "Summary",
            Container::LevelDistribution => "Log Level Distribution",
            Container::LogsPerHour => "Logs per Hour",
            Container::LevelPie => "Log Level Proportion",
            Container::TopErrorsTable => "Top Errors & Warnings",
            Container::UniqueMessages => "Unique Messages",
            Container::ActiveUsers => "Active Users",
            Container::IdlePeriods => "Idle Periods",
        }
    }

    /// Chart mounts are owned by the charting library once drawn.
    pub fn is_chart(self) -> bool {
        matches!(
            self,
            Container::LevelDistribution | Container::LogsPerHour | Container::LevelPie
        )
    }
}

/// One unit of output aimed at one container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Patch {
    Html { container: Container, html: String },
    Chart { container: Container, spec: ChartSpec },
}

impl Patch {
    pub fn container(&self) -> Container {
        match self {
            Patch::Html { container, .. } | Patch::Chart { container, .. } => *container,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BadgeStyle {
    Danger,
    Warning,
    Info,
    Secondary,
}

impl BadgeStyle {
    pub fn for_level(level: &str) -> Self {
        match level.to_uppercase().as_str() {
            "ERROR" | "CRITICAL" => BadgeStyle::Danger,
            "WARNING" => BadgeStyle::Warning,
            "INFO" => BadgeStyle::Info,
            _ => BadgeStyle::Secondary,
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            BadgeStyle::Danger => "badge-danger",
            BadgeStyle::Warning => "badge-warning",
            BadgeStyle::Info => "badge-info",
            BadgeStyle::Secondary => "badge-secondary",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelBadge {
    pub level: String,
    pub count: u64,
    pub style: BadgeStyle,
}

impl LevelBadge {
    pub fn label(&self) -> String {
        format!("{}: {}", self.level, self.count)
    }
}

/// View-model behind the `statsDisplay` block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsSummary {
    pub total_logs: u64,
    pub badges: Vec<LevelBadge>,
    pub start: String,
    pub end: String,
}

impl From<&Stats> for StatsSummary {
    fn from(stats: &Stats) -> Self {
        StatsSummary {
            total_logs: stats.total_logs,
            badges: stats
                .log_levels
                .iter()
                .map(|l| LevelBadge {
                    level: l.level.clone(),
                    count: l.count,
                    style: BadgeStyle::for_level(&l.level),
                })
                .collect(),
            start: stats.time_range.start.clone(),
            end: stats.time_range.end.clone(),
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Strings verbatim, everything else in its JSON text form.
pub fn cell_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn render_stats(summary: &StatsSummary) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        r#"<div class="mb-2"><span class="fw-bold">Total Logs:</span> <span class="badge badge-info">{}</span></div>"#,
        summary.total_logs
    );
    html.push_str(r#"<div class="mb-2"><span class="fw-bold">Log Levels:</span> "#);
    for badge in &summary.badges {
        let _ = write!(
            html,
            r#"<span class="badge {} me-1">{}</span>"#,
            badge.style.css_class(),
            escape_html(&badge.label())
        );
    }
    html.push_str("</div>");
    let _ = write!(
        html,
        r#"<div class="mb-2"><span class="fw-bold">Time Range:</span> <span class="badge badge-secondary">{} to {}</span></div>"#,
        escape_html(&summary.start),
        escape_html(&summary.end)
    );
    html
}

pub fn render_table(rows: Option<&[Vec<JsonValue>]>, headers: &[&str]) -> String {
    let rows = match rows {
        Some(rows) if !rows.is_empty() => rows,
        _ => return NONE_PLACEHOLDER.to_string(),
    };
    let mut html = String::from(r#"<table class="table table-custom table-sm"><thead><tr>"#);
    for header in headers {
        let _ = write!(html, "<th>{}</th>", escape_html(header));
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            let _ = write!(html, "<td>{}</td>", escape_html(&cell_text(cell)));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

pub fn render_list(items: Option<&[String]>) -> String {
    let items = match items {
        Some(items) if !items.is_empty() => items,
        _ => return NONE_PLACEHOLDER.to_string(),
    };
    let mut html = String::from(r#"<ul class="list-group list-group-flush">"#);
    for item in items {
        let _ = write!(html, r#"<li class="list-group-item">{}</li>"#, escape_html(item));
    }
    html.push_str("</ul>");
    html
}

pub fn render_notification(notification: &Notification) -> String {
    format!(
        r#"<div class="alert alert-{} alert-dismissible fade show" role="alert">{}<button type="button" class="btn-close" data-bs-dismiss="alert"></button></div>"#,
        notification.severity.alert_class(),
        escape_html(&notification.message)
    )
}

pub fn plan_stats(stats: &Stats) -> Patch {
    Patch::Html {
        container: Container::StatsDisplay,
        html: render_stats(&StatsSummary::from(stats)),
    }
}

/// Patches for every field present in the bundle. Absent fields produce
/// nothing; present-but-empty tables and lists produce the placeholder.
pub fn plan_plots(plots: &PlotsBundle) -> Vec<Patch> {
    let mut patches = Vec::new();

    let charts = [
        (Container::LevelDistribution, &plots.level_distribution),
        (Container::LogsPerHour, &plots.logs_per_hour),
        (Container::LevelPie, &plots.level_pie),
    ];
    for (container, spec) in charts {
        if let Some(spec) = spec {
            patches.push(Patch::Chart { container, spec: spec.clone() });
        }
    }

    if let Some(rows) = plots.top_errors.as_deref() {
        patches.push(Patch::Html {
            container: Container::TopErrorsTable,
            html: render_table(Some(rows), &TOP_ERRORS_HEADERS),
        });
    }
    if let Some(items) = plots.unique_messages.as_deref() {
        patches.push(Patch::Html {
            container: Container::UniqueMessages,
            html: render_list(Some(items)),
        });
    }
    if let Some(items) = plots.active_users.as_deref() {
        patches.push(Patch::Html {
            container: Container::ActiveUsers,
            html: render_list(Some(items)),
        });
    }
    if let Some(rows) = plots.idle_periods.as_deref() {
        patches.push(Patch::Html {
            container: Container::IdlePeriods,
            html: render_table(Some(rows), &IDLE_PERIODS_HEADERS),
        });
    }

    patches
}
