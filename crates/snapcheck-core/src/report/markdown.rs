//! GitHub comment rendering (Markdown with inline HTML tables).

use super::{ImageRef, Report, ReportRenderer};
use crate::domain::Result;

/// Header every snapshot comment starts with; notifiers use it to find
/// earlier comments.
pub const REPORT_HEADER: &str = "## Snapshot Test Result";

/// Renders a report the way it is posted on a pull request.
///
/// Sections for empty categories render as empty strings.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    /// New screenshots shown per table row.
    pub row_size: usize,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self { row_size: 3 }
    }
}

pub(crate) fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn img_tag(image: &ImageRef) -> String {
    match image.size {
        Some(size) => format!(
            "<img src=\"{}\" height=\"{}px\" width=\"{}px\" />",
            escape_html(&image.url),
            size.height,
            size.width
        ),
        None => format!("<img src=\"{}\" />", escape_html(&image.url)),
    }
}

impl MarkdownRenderer {
    pub fn summary_table(&self, report: &Report) -> String {
        let s = &report.summary;
        format!(
            "### Summary\n|  | Count |\n| --- | --- |\n| New Screenshots | {} |\n| Deleted Screenshots | {} |\n| Changed Screenshots | {} |\n| Passed Screenshots | {} |\n",
            s.new, s.deleted, s.changed, s.passed
        )
    }

    pub fn changed_section(&self, report: &Report) -> String {
        if report.changed.is_empty() {
            return String::new();
        }

        let mut table =
            String::from("<table><tr><td></td><td>Before</td><td>After</td><td>Diff</td></tr>");
        for entry in &report.changed {
            let diff = match (&entry.diff, &entry.error) {
                (Some(diff), _) => img_tag(diff),
                (None, Some(error)) => format!("comparison failed: {}", escape_html(error)),
                (None, None) => String::new(),
            };
            table.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&entry.name),
                img_tag(&entry.before),
                img_tag(&entry.after),
                diff
            ));
        }
        table.push_str("</table>");

        format!("### Changed Screenshots\n\n{table}")
    }

    pub fn new_section(&self, report: &Report) -> String {
        if report.new.is_empty() {
            return String::new();
        }

        let mut rows = String::new();
        for chunk in report.new.chunks(self.row_size.max(1)) {
            rows.push_str("<tr>");
            for entry in chunk {
                rows.push_str(&format!("<td>{}</td>", escape_html(&entry.name)));
            }
            rows.push_str("</tr><tr>");
            for entry in chunk {
                rows.push_str(&format!("<td>{}</td>", img_tag(&entry.image)));
            }
            rows.push_str("</tr>");
        }

        format!(
            "### New Screenshots\n<details><summary>Open</summary>\n\n<table>{rows}</table></details>\n"
        )
    }

    pub fn deleted_section(&self, report: &Report) -> String {
        if report.deleted.is_empty() {
            return String::new();
        }

        let items: String = report
            .deleted
            .iter()
            .map(|item| format!("- {}\n", escape_html(item)))
            .collect();
        format!("### Deleted Screenshots\n<details><summary>Open</summary>\n\n{items}</details>\n")
    }
}

impl ReportRenderer for MarkdownRenderer {
    fn render(&self, report: &Report) -> Result<String> {
        let mut md = format!("{REPORT_HEADER}\n");
        if let Some(commit) = &report.commit {
            md.push_str(&format!("Commit Hash: {commit}\n"));
        }
        if let Some(baseline) = &report.baseline {
            md.push_str(&format!("Baseline: {baseline}\n"));
        }
        md.push('\n');
        md.push_str(&self.summary_table(report));

        for section in [
            self.changed_section(report),
            self.new_section(report),
            self.deleted_section(report),
        ] {
            if !section.is_empty() {
                md.push('\n');
                md.push_str(&section);
                if !section.ends_with('\n') {
                    md.push('\n');
                }
            }
        }
        Ok(md)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{DisplaySize, NewEntry, Summary};
    use chrono::Utc;

    fn report_with_new(names: &[&str]) -> Report {
        Report {
            commit: None,
            baseline: None,
            generated_at: Utc::now(),
            summary: Summary {
                new: names.len(),
                ..Summary::default()
            },
            changed: vec![],
            new: names
                .iter()
                .map(|n| NewEntry {
                    name: n.to_string(),
                    image: ImageRef {
                        url: format!("actual/{n}"),
                        size: None,
                    },
                })
                .collect(),
            deleted: vec![],
        }
    }

    #[test]
    fn new_section_chunks_rows_by_row_size() {
        let report = report_with_new(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        let section = MarkdownRenderer::default().new_section(&report);
        assert_eq!(section.matches("<tr>").count(), 4);
        assert!(section.contains(
            "<tr><td>a.jpg</td><td>b.jpg</td><td>c.jpg</td></tr><tr><td><img src=\"actual/a.jpg\" /></td>"
        ));
        assert!(section.contains("<tr><td>d.jpg</td></tr>"));
    }

    #[test]
    fn img_tag_includes_display_size() {
        let tag = img_tag(&ImageRef {
            url: "u?a=1&b=2".to_string(),
            size: Some(DisplaySize {
                width: 607.5,
                height: 1080.0,
            }),
        });
        assert_eq!(
            tag,
            "<img src=\"u?a=1&amp;b=2\" height=\"1080px\" width=\"607.5px\" />"
        );
    }

    #[test]
    fn deleted_section_lists_items() {
        let mut report = report_with_new(&[]);
        report.deleted = vec!["old.jpg".to_string(), "gone.jpg".to_string()];
        assert_eq!(
            MarkdownRenderer::default().deleted_section(&report),
            "### Deleted Screenshots\n<details><summary>Open</summary>\n\n- old.jpg\n- gone.jpg\n</details>\n"
        );
    }

    #[test]
    fn deleted_names_are_html_escaped() {
        let mut report = report_with_new(&[]);
        report.deleted = vec!["<b>home</b> & more.jpg".to_string()];
        let section = MarkdownRenderer::default().deleted_section(&report);
        assert!(section.contains("- &lt;b&gt;home&lt;/b&gt; &amp; more.jpg\n"));
        assert!(!section.contains("<b>"));
    }
}
