//! An in-memory view that renders to a standalone HTML page.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::render::{escape_html, render_notification, Container, Patch};
use crate::view::{Notification, View, ViewState};
use crate::ChartSpec;

const PLOTLY_SRC: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
const BOOTSTRAP_CSS: &str = "https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Content {
    Html(String),
    Chart(ChartSpec),
}

#[derive(Clone, Debug, Default)]
pub struct HtmlReport {
    state: ViewState,
    results_visible: bool,
    contents: BTreeMap<Container, Content>,
    notifications: Vec<Notification>,
}

impl HtmlReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn results_visible(&self) -> bool {
        self.results_visible
    }

    pub fn content(&self, container: Container) -> Option<&Content> {
        self.contents.get(&container)
    }

    /// In insertion order; each new banner goes directly before the form,
    /// i.e. after the ones already there.
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn to_page(&self, title: &str) -> String {
        let mut page = String::new();
        let _ = write!(
            page,
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<link rel="stylesheet" href="{BOOTSTRAP_CSS}">
<script src="{PLOTLY_SRC}"></script>
</head>
<body>
<main class="container py-4">
<h1 class="h3 mb-4">{title}</h1>
"#,
            title = escape_html(title),
        );

        for note in &self.notifications {
            page.push_str(&render_notification(note));
            page.push('\n');
        }
        page.push_str("<form id=\"uploadForm\" class=\"d-none\"></form>\n");

        let hidden = if self.results_visible { "" } else { " d-none" };
        let _ = writeln!(page, r#"<section id="analysisResults" class="row{hidden}">"#);
        for container in Container::ALL {
            let inner = match self.contents.get(&container) {
                Some(Content::Html(html)) => html.as_str(),
                _ => "",
            };
            let _ = writeln!(
                page,
                r#"<div class="col-md-6 mb-4"><h2 class="h5">{}</h2><div id="{}">{}</div></div>"#,
                escape_html(container.title()),
                container.id(),
                inner
            );
        }
        page.push_str("</section>\n</main>\n");

        let charts: Vec<(Container, &ChartSpec)> = self
            .contents
            .iter()
            .filter_map(|(container, content)| match content {
                Content::Chart(spec) => Some((*container, spec)),
                Content::Html(_) => None,
            })
            .collect();
        if !charts.is_empty() {
            page.push_str("<script>\n");
            for (container, spec) in charts {
                let _ = writeln!(
                    page,
                    "Plotly.newPlot({}, JSON.parse({}));",
                    script_literal(container.id()),
                    script_literal(spec.as_str())
                );
            }
            page.push_str("</script>\n");
        }

        page.push_str("</body>\n</html>\n");
        page
    }
}

/// A JS string literal that cannot terminate the surrounding script element.
fn script_literal(text: &str) -> String {
    let quoted = serde_json::Value::String(text.to_string()).to_string();
    quoted.replace("</", "<\\/")
}

impl View for HtmlReport {
    fn apply_state(&mut self, state: &ViewState) {
        self.state = *state;
    }

    fn reveal_results(&mut self) {
        self.results_visible = true;
    }

    fn patch(&mut self, patch: Patch) {
        match patch {
            Patch::Html { container, html } => {
                self.contents.insert(container, Content::Html(html));
            }
            Patch::Chart { container, spec } => {
                self.contents.insert(container, Content::Chart(spec));
            }
        }
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::api::ReplayApi;
    use crate::render::NONE_PLACEHOLDER;
    use crate::workflow::{UploadWorkflow, SUCCESS_MESSAGE};

    const UPLOAD: &str = r#"{"success":true,"filename":"app.log","stats":{"total_logs":4,
        "log_levels":{"INFO":3,"CRITICAL":1},"time_range":{"start":"2024-01-01 10:00:00","end":"2024-01-01 12:00:00"}}}"#;

    fn report_for(stats: &str) -> HtmlReport {
        let workflow = UploadWorkflow::new(ReplayApi::new(Ok(UPLOAD.into()), Ok(stats.into())));
        let mut report = HtmlReport::new();
        block_on(workflow.run((), &mut report));
        report
    }

    #[test]
    fn successful_run_fills_containers() {
        let report = report_for(
            r#"{"level_pie":"{\"data\":[{\"type\":\"pie\"}]}","unique_messages":[],"active_users":["bob (1)"]}"#,
        );
        assert!(report.results_visible());
        assert_eq!(report.state(), ViewState::idle());
        assert_eq!(report.notifications(), [Notification::success(SUCCESS_MESSAGE)]);
        assert!(matches!(report.content(Container::LevelPie), Some(Content::Chart(_))));
        assert_eq!(
            report.content(Container::UniqueMessages),
            Some(&Content::Html(NONE_PLACEHOLDER.to_string()))
        );
        assert_eq!(report.content(Container::IdlePeriods), None);

        let page = report.to_page("app.log");
        assert!(page.contains(r#"<section id="analysisResults" class="row">"#));
        assert!(page.contains(r#"Plotly.newPlot("levelPie", JSON.parse("#));
        assert!(page.contains("bob (1)"));
        assert!(page.contains("CRITICAL: 1"));
        assert!(page.find("alert-success").unwrap() < page.find("id=\"uploadForm\"").unwrap());
    }

    #[test]
    fn failed_run_keeps_results_hidden() {
        let workflow = UploadWorkflow::new(ReplayApi::new(
            Ok(r#"{"success":false,"error":"Invalid file type"}"#.into()),
            Ok("{}".into()),
        ));
        let mut report = HtmlReport::new();
        block_on(workflow.run((), &mut report));
        assert!(!report.results_visible());
        let page = report.to_page("upload");
        assert!(page.contains(r#"class="row d-none""#));
        assert!(page.contains("alert-danger"));
        assert!(page.contains("Invalid file type"));
        assert!(!page.contains("<script>\n"));
    }

    #[test]
    fn chart_specs_cannot_close_the_script() {
        let report = report_for(r#"{"level_distribution":"{\"title\":\"</script><b>\"}"}"#);
        let page = report.to_page("x");
        assert_eq!(page.matches("</script>").count(), 2);
        assert!(page.contains(r"<\/script>"));
    }
}
