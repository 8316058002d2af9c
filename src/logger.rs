//! Terminal summaries of analyses with configurable verbosity.
//!
//! - Minimal: One-liner nginx-style
//! - Compact: Two lines, request and outcome
//! - Verbose: Full block with token usage

use crate::config::LogVerbosity;
use crate::upstream::Usage;

/// Everything worth printing about one analysis.
#[derive(Debug, Clone)]
pub struct AnalysisRecord {
    pub request_id: String,
    pub route: &'static str,
    pub input_kind: &'static str,
    pub model: String,
    pub status: u16,
    pub duration_ms: u64,
    pub products: Option<usize>,
    pub usage: Option<Usage>,
    pub error: Option<String>,
}

/// Format duration in human-readable form.
fn format_duration(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Format an analysis record for terminal output.
pub fn format_analysis(record: &AnalysisRecord, verbosity: LogVerbosity) -> String {
    match verbosity {
        LogVerbosity::Minimal => format_minimal(record),
        LogVerbosity::Compact => format_compact(record),
        LogVerbosity::Verbose => format_verbose(record),
    }
}

fn outcome(record: &AnalysisRecord) -> String {
    match (&record.error, record.products) {
        (Some(err), _) => format!("error: {}", err),
        (None, Some(n)) => format!("{} product{}", n, if n == 1 { "" } else { "s" }),
        (None, None) => "no report".to_string(),
    }
}

fn format_minimal(record: &AnalysisRecord) -> String {
    format!(
        "POST {} {} {} {} {}",
        record.route,
        record.status,
        format_duration(record.duration_ms),
        record.input_kind,
        outcome(record)
    )
}

fn format_compact(record: &AnalysisRecord) -> String {
    let request_line = format!(
        "→ POST {} [{}, {}] {}",
        record.route,
        record.input_kind,
        record.model,
        short_id(&record.request_id)
    );

    let tokens = record
        .usage
        .map(|u| format!(", {} tokens", u.total_tokens))
        .unwrap_or_default();
    let response_line = format!(
        "← {} {} ({}{})",
        record.status,
        outcome(record),
        format_duration(record.duration_ms),
        tokens
    );

    format!("{}\n{}", request_line, response_line)
}

fn format_verbose(record: &AnalysisRecord) -> String {
    let separator = "────────────────────────────────────────";
    let status_text = if (200..300).contains(&record.status) { "OK" } else { "ERROR" };

    let (prompt, completion) = record
        .usage
        .map(|u| (u.prompt_tokens.to_string(), u.completion_tokens.to_string()))
        .unwrap_or_else(|| ("-".to_string(), "-".to_string()));

    format!(
        "{separator}\n\
         POST {route}  id={id}\n\
         Input: {kind}\n\
         Model: {model}\n\
         Status: {status} {status_text}\n\
         Result: {outcome}\n\
         Timing: {duration}\n\
         Tokens: {prompt} prompt, {completion} completion\n\
         {separator}",
        separator = separator,
        route = record.route,
        id = record.request_id,
        kind = record.input_kind,
        model = record.model,
        status = record.status,
        status_text = status_text,
        outcome = outcome(record),
        duration = format_duration(record.duration_ms),
        prompt = prompt,
        completion = completion,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> AnalysisRecord {
        AnalysisRecord {
            request_id: "3f2a9c1e-0000-4000-8000-000000000000".to_string(),
            route: "/analyze",
            input_kind: "text",
            model: "gpt-4o".to_string(),
            status: 200,
            duration_ms: 2400,
            products: Some(3),
            usage: Some(Usage {
                prompt_tokens: 1100,
                completion_tokens: 90,
                total_tokens: 1190,
            }),
            error: None,
        }
    }

    #[test]
    fn minimal_format_is_single_line() {
        let output = format_analysis(&sample_record(), LogVerbosity::Minimal);

        assert!(!output.contains('\n'));
        assert_eq!(output, "POST /analyze 200 2.4s text 3 products");
    }

    #[test]
    fn compact_format_is_two_lines() {
        let output = format_analysis(&sample_record(), LogVerbosity::Compact);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("→ POST /analyze"));
        assert!(lines[0].contains("3f2a9c1e"));
        assert!(lines[1].contains("200"));
        assert!(lines[1].contains("1190 tokens"));
    }

    #[test]
    fn verbose_format_includes_token_breakdown() {
        let output = format_analysis(&sample_record(), LogVerbosity::Verbose);

        assert!(output.contains("───"));
        assert!(output.contains("Status: 200 OK"));
        assert!(output.contains("Tokens: 1100 prompt, 90 completion"));
    }

    #[test]
    fn errors_replace_product_count() {
        let record = AnalysisRecord {
            status: 400,
            products: None,
            usage: None,
            error: Some("Missing content".to_string()),
            duration_ms: 3,
            ..sample_record()
        };

        let output = format_analysis(&record, LogVerbosity::Verbose);
        assert!(output.contains("Status: 400 ERROR"));
        assert!(output.contains("error: Missing content"));
        assert!(output.contains("Tokens: - prompt, - completion"));
        assert!(output.contains("3ms"));
    }

    #[test]
    fn single_product_is_not_pluralized() {
        let record = AnalysisRecord {
            products: Some(1),
            ..sample_record()
        };
        assert!(format_analysis(&record, LogVerbosity::Minimal).ends_with("1 product"));
    }
}
