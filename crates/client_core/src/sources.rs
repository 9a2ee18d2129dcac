use shared::protocol::Source;

pub const FALLBACK_CHUNK_LABEL: &str = "chunk";
pub const FALLBACK_TITLE: &str = "Untitled";

/// A source passage prepared for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceView {
    /// Stable list key: the chunk id when present, otherwise the position.
    pub key: String,
    pub chunk_label: String,
    pub title: String,
    pub text: String,
    pub url: Option<String>,
}

impl SourceView {
    pub fn from_source(index: usize, source: &Source) -> Self {
        let key = match source.chunk_id.as_deref() {
            Some(chunk_id) if !chunk_id.is_empty() => chunk_id.to_string(),
            _ => index.to_string(),
        };
        let title = source
            .title
            .as_deref()
            .filter(|title| !title.is_empty())
            .unwrap_or(FALLBACK_TITLE)
            .to_string();
        let url = source
            .metadata
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        Self {
            key,
            chunk_label: chunk_label(source.chunk_id.as_deref()).to_string(),
            title,
            text: source.text.clone(),
            url,
        }
    }
}

/// `doc1_3` is displayed as `3`. Ids without an `_`-separated index fall back
/// to [`FALLBACK_CHUNK_LABEL`].
pub fn chunk_label(chunk_id: Option<&str>) -> &str {
    chunk_id
        .and_then(|id| id.split('_').nth(1))
        .filter(|index| !index.is_empty())
        .unwrap_or(FALLBACK_CHUNK_LABEL)
}

pub fn normalize_sources(sources: &[Source]) -> Vec<SourceView> {
    sources
        .iter()
        .enumerate()
        .map(|(index, source)| SourceView::from_source(index, source))
        .collect()
}

pub fn sources_summary(count: usize) -> String {
    format!("{count} results")
}
