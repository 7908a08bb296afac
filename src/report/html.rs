use std::fmt::Write;

use crate::report::Report;

const STYLE: &str = "\
body { font-family: Arial, sans-serif; margin: 20px; }
.header { text-align: center; margin-bottom: 30px; }
.section { margin-bottom: 30px; }
.section h2 { color: #333; border-bottom: 2px solid #007bff; padding-bottom: 5px; }
.summary-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 20px; margin: 20px 0; }
.summary-card { background: #f8f9fa; padding: 15px; border-radius: 5px; text-align: center; }
.summary-value { font-size: 24px; font-weight: bold; color: #007bff; }
.recommendation { background: #fff3cd; border: 1px solid #ffeaa7; padding: 15px; margin: 10px 0; border-radius: 5px; }
.recommendation.urgent, .recommendation.critical { background: #f8d7da; border-color: #f5c6cb; }
.recommendation.info { background: #d1ecf1; border-color: #bee5eb; }
.recommendation.improvement { background: #d4edda; border-color: #c3e6cb; }
table { width: 100%; border-collapse: collapse; margin: 20px 0; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #f2f2f2; }
.generated-at { text-align: right; color: #666; font-size: 12px; margin-top: 20px; }
";

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Standalone HTML page for a report
pub fn to_html(report: &Report) -> String {
    let mut html = String::new();
    // Writing into a String never fails
    let _ = write_report(&mut html, report);
    html
}

fn write_report(out: &mut String, report: &Report) -> std::fmt::Result {
    let title = escape(&report.title);

    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html>\n<head>\n<meta charset=\"UTF-8\">")?;
    writeln!(out, "<title>{title}</title>")?;
    writeln!(out, "<style>\n{STYLE}</style>\n</head>\n<body>")?;
    writeln!(out, "<div class=\"header\">\n<h1>{title}</h1>")?;
    writeln!(
        out,
        "<p class=\"generated-at\">Generated at {}</p>\n</div>",
        escape(&report.generated_at.to_string())
    )?;

    if !report.summary.is_empty() {
        writeln!(out, "<div class=\"section\">\n<h2>Summary</h2>\n<div class=\"summary-grid\">")?;
        for entry in &report.summary {
            writeln!(
                out,
                "<div class=\"summary-card\"><div class=\"summary-value\">{}</div><div>{}</div></div>",
                escape(&entry.value.to_string()),
                escape(entry.label)
            )?;
        }
        writeln!(out, "</div>\n</div>")?;
    }

    for table in &report.tables {
        writeln!(out, "<div class=\"section\">\n<h2>{}</h2>", escape(table.title))?;
        if table.rows.is_empty() {
            writeln!(out, "<p>No data</p>\n</div>")?;
            continue;
        }
        writeln!(out, "<table>\n<thead><tr>")?;
        for header in &table.headers {
            write!(out, "<th>{}</th>", escape(header))?;
        }
        writeln!(out, "</tr></thead>\n<tbody>")?;
        for row in &table.rows {
            write!(out, "<tr>")?;
            for cell in row {
                write!(out, "<td>{}</td>", escape(cell))?;
            }
            writeln!(out, "</tr>")?;
        }
        writeln!(out, "</tbody>\n</table>\n</div>")?;
    }

    if !report.recommendations.is_empty() {
        writeln!(out, "<div class=\"section\">\n<h2>Recommendations</h2>")?;
        for recommendation in &report.recommendations {
            writeln!(
                out,
                "<div class=\"recommendation {}\">\n<h3>{}</h3>\n<p>{}</p>\n<ul>",
                recommendation.kind.label(),
                escape(&recommendation.title),
                escape(&recommendation.description)
            )?;
            for action in &recommendation.actions {
                writeln!(out, "<li>{}</li>", escape(action))?;
            }
            writeln!(out, "</ul>\n</div>")?;
        }
        writeln!(out, "</div>")?;
    }

    writeln!(out, "</body>\n</html>")
}
