//! Plain-text rendering of timeline messages, sources and backend health.

use client_core::{sources::sources_summary, Message, SourceView};
use shared::{
    domain::Role,
    protocol::{HealthChecks, HealthResponse, ReadinessResponse},
};

const EXCERPT_CHARS: usize = 240;

pub fn format_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    format!("{speaker}> {}", message.content)
}

pub fn format_sources(sources: &[SourceView]) -> String {
    if sources.is_empty() {
        return "Retrieved sources will appear here after a query.".to_string();
    }

    let mut out = format!("Sources ({})", sources_summary(sources.len()));
    for source in sources {
        out.push_str(&format!("\n  [{}] {}", source.chunk_label, source.title));
        let text = excerpt(&source.text);
        if !text.is_empty() {
            out.push_str(&format!("\n      {text}"));
        }
        if let Some(url) = &source.url {
            out.push_str(&format!("\n      {url}"));
        }
    }
    out
}

fn excerpt(text: &str) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= EXCERPT_CHARS {
        return flattened;
    }
    let mut clipped: String = flattened.chars().take(EXCERPT_CHARS).collect();
    clipped.push('…');
    clipped
}

pub fn format_health(health: &HealthResponse, readiness: &ReadinessResponse) -> String {
    let mut out = format!(
        "status: {:?}, ready: {}",
        health.status, readiness.ready
    )
    .to_ascii_lowercase();
    push_checks(&mut out, &health.checks);
    out
}

fn push_checks(out: &mut String, checks: &HealthChecks) {
    for (subsystem, errors) in checks {
        if errors.is_empty() {
            out.push_str(&format!("\n  {subsystem}: ok"));
        } else {
            for error in errors {
                out.push_str(&format!("\n  {subsystem}: {error}"));
            }
        }
    }
}
