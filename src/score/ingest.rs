//! MusicXML ingestion: shape validation and duration repair

use std::ops::Range;

use log::{debug, info};

/// Score roots the notation backend accepts
pub const ACCEPTED_ROOTS: [&str; 2] = ["score-partwise", "score-timewise"];

/// Root of `META-INF/container.xml` inside a compressed `.mxl` archive
pub const CONTAINER_ROOT: &str = "container";

/// Replacement for duration values that are not plain integers
pub const DEFAULT_DURATION_FALLBACK: u32 = 1;

/// Result of ingesting uploaded markup; immutable once produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkupDocument {
    /// Markup handed to the notation backend (sanitized when valid)
    pub raw_text: String,
    pub validation_error: Option<String>,
    /// Number of duration values rewritten
    pub fix_count: usize,
}

impl MarkupDocument {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validation_error.is_none()
    }

    /// User-facing notice about repaired values, if any were repaired
    #[must_use]
    pub fn fix_notice(&self) -> Option<String> {
        match self.fix_count {
            0 => None,
            1 => Some("1 duration value normalized".to_string()),
            n => Some(format!("{n} duration values normalized")),
        }
    }
}

/// Check that `text` is a score document the notation backend can take.
pub fn validate(text: &str) -> Result<(), String> {
    let trimmed = &text[markup_start(text)..];
    if !trimmed.starts_with('<') {
        return Err("File does not look like XML (expected it to start with '<')".to_string());
    }

    let doc = parse_markup(trimmed).map_err(|e| format!("XML parse error: {e}"))?;

    let root = doc.root_element().tag_name().name();
    if root == CONTAINER_ROOT {
        return Err(
            "This is the container manifest of a compressed MXL archive, not the score itself; \
             extract the score file from the .mxl first"
                .to_string(),
        );
    }
    if !ACCEPTED_ROOTS.contains(&root) {
        return Err(format!(
            "Unexpected root element <{root}>; expected <score-partwise> or <score-timewise>"
        ));
    }

    Ok(())
}

/// Byte offset where markup begins, past a BOM and leading whitespace
fn markup_start(text: &str) -> usize {
    text.len() - text.trim_start_matches('\u{feff}').trim_start().len()
}

fn parse_markup(text: &str) -> Result<roxmltree::Document<'_>, roxmltree::Error> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    roxmltree::Document::parse_with_options(text, options)
}

/// Rewrite every `<duration>` element whose value is not a plain
/// non-negative integer literal. Returns the repaired text and the number
/// of fixes. Bytes outside the rewritten elements are kept as they were.
#[must_use]
pub fn sanitize(text: &str, fallback: u32) -> (String, usize) {
    let start = markup_start(text);
    let doc = match parse_markup(&text[start..]) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("Skipping duration repair on unparsable markup: {e}");
            return (text.to_string(), 0);
        }
    };

    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    let mut covered_until = 0;
    for node in doc.descendants().filter(|n| n.has_tag_name("duration")) {
        let range = node.range();
        let range = range.start + start..range.end + start;
        // Nested inside an element that is already being rewritten
        if range.start < covered_until {
            continue;
        }
        let value = duration_text(node);
        if value.as_deref().is_some_and(is_integer_literal) {
            continue;
        }
        let Some(edit) = rewrite_duration(text, range.clone(), fallback) else {
            debug!("Duration element at {range:?} is not in the source text");
            continue;
        };
        debug!("Replacing duration value {value:?} with {fallback}");
        covered_until = edit.0.end;
        edits.push(edit);
    }

    let fixes = edits.len();
    let mut repaired = String::with_capacity(text.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        repaired.push_str(&text[cursor..range.start]);
        repaired.push_str(&replacement);
        cursor = range.end;
    }
    repaired.push_str(&text[cursor..]);
    (repaired, fixes)
}

/// Concatenated character data, or `None` when the element holds child
/// elements or processing instructions.
fn duration_text(node: roxmltree::Node<'_, '_>) -> Option<String> {
    let mut value = String::new();
    for child in node.children() {
        if child.is_comment() {
            continue;
        }
        if !child.is_text() {
            return None;
        }
        value.push_str(child.text().unwrap_or_default());
    }
    Some(value)
}

fn is_integer_literal(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Edit that replaces the element's content with `fallback`, keeping the
/// start tag. A self-closing element is expanded to a start and end tag.
fn rewrite_duration(
    text: &str,
    range: Range<usize>,
    fallback: u32,
) -> Option<(Range<usize>, String)> {
    let element = text.get(range.clone())?;
    if !element.starts_with('<') {
        return None;
    }
    let open_len = start_tag_len(element)?;
    let open = &element[..open_len];

    if let Some(head) = open.strip_suffix("/>") {
        let head = head.trim_end();
        let name_len = head
            .find(|c: char| c.is_whitespace())
            .unwrap_or(head.len());
        let name = &head[1..name_len];
        return Some((range, format!("{head}>{fallback}</{name}>")));
    }

    let close_at = element.rfind("</")?;
    if close_at < open_len {
        return None;
    }
    let content = range.start + open_len..range.start + close_at;
    Some((content, fallback.to_string()))
}

/// Length of the start tag, including its closing `>`
fn start_tag_len(element: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in element.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => return Some(i + 1),
            _ => {}
        }
    }
    None
}

/// Validate, then sanitize. Validation failure short-circuits.
#[must_use]
pub fn ingest(raw_text: &str) -> MarkupDocument {
    ingest_with(raw_text, DEFAULT_DURATION_FALLBACK)
}

#[must_use]
pub fn ingest_with(raw_text: &str, fallback: u32) -> MarkupDocument {
    if let Err(message) = validate(raw_text) {
        info!("Markup rejected: {message}");
        return MarkupDocument {
            raw_text: raw_text.to_string(),
            validation_error: Some(message),
            fix_count: 0,
        };
    }

    let (sanitized, fix_count) = sanitize(raw_text, fallback);
    if fix_count > 0 {
        info!("Normalized {fix_count} malformed duration values");
    }
    MarkupDocument {
        raw_text: sanitized,
        validation_error: None,
        fix_count,
    }
}
