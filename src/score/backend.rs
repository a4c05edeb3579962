//! Notation-rendering backend seam and a text outline engraver

use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct NotationError(pub String);

/// Rendered representation of a score
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotationOutput {
    pub title: Option<String>,
    pub text: String,
}

/// Loads validated markup, then lays it out.
///
/// `load` must be called before `render`; errors carry human-readable
/// messages suitable for showing in place of the output.
pub trait NotationBackend: Send {
    fn load(&mut self, markup: &str) -> Result<(), NotationError>;
    fn render(&mut self) -> Result<NotationOutput, NotationError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct PartOutline {
    id: String,
    name: String,
    measures: usize,
    notes: usize,
    rests: usize,
}

#[derive(Clone, Debug, Default)]
struct ScoreOutline {
    title: Option<String>,
    composer: Option<String>,
    parts: Vec<PartOutline>,
}

/// Text engraver: lists title, composer and per-part measure/note counts.
/// Good enough for a terminal surface.
#[derive(Debug, Default)]
pub struct OutlineBackend {
    outline: Option<ScoreOutline>,
}

impl OutlineBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotationBackend for OutlineBackend {
    fn load(&mut self, markup: &str) -> Result<(), NotationError> {
        self.outline = None;
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(markup.trim_start(), options)
            .map_err(|e| NotationError(format!("Could not read score: {e}")))?;
        let root = doc.root_element();

        let text_of = |name: &str| {
            root.descendants()
                .find(|n| n.has_tag_name(name))
                .and_then(|n| n.text())
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        };
        let title = text_of("work-title").or_else(|| text_of("movement-title"));
        let composer = root
            .descendants()
            .filter(|n| n.has_tag_name("creator"))
            .find(|n| n.attribute("type") == Some("composer"))
            .and_then(|n| n.text())
            .map(|t| t.trim().to_string());

        let mut parts: Vec<PartOutline> = root
            .descendants()
            .filter(|n| n.has_tag_name("score-part"))
            .map(|n| PartOutline {
                id: n.attribute("id").unwrap_or_default().to_string(),
                name: n
                    .children()
                    .find(|c| c.has_tag_name("part-name"))
                    .and_then(|c| c.text())
                    .map(|t| t.trim().to_string())
                    .unwrap_or_default(),
                ..PartOutline::default()
            })
            .collect();

        if root.has_tag_name("score-partwise") {
            for part in root.children().filter(|n| n.has_tag_name("part")) {
                let id = part.attribute("id").unwrap_or_default();
                let outline = part_entry(&mut parts, id);
                for measure in part.children().filter(|n| n.has_tag_name("measure")) {
                    outline.measures += 1;
                    count_notes(measure, outline);
                }
            }
        } else {
            // timewise: measures contain parts
            for measure in root.children().filter(|n| n.has_tag_name("measure")) {
                for part in measure.children().filter(|n| n.has_tag_name("part")) {
                    let id = part.attribute("id").unwrap_or_default();
                    let outline = part_entry(&mut parts, id);
                    outline.measures += 1;
                    count_notes(part, outline);
                }
            }
        }

        if parts.is_empty() {
            return Err(NotationError("Score has no parts".to_string()));
        }

        self.outline = Some(ScoreOutline {
            title,
            composer,
            parts,
        });
        Ok(())
    }

    fn render(&mut self) -> Result<NotationOutput, NotationError> {
        let outline = self
            .outline
            .as_ref()
            .ok_or_else(|| NotationError("No score loaded".to_string()))?;

        let mut text = String::new();
        let _ = writeln!(
            text,
            "{}",
            outline.title.as_deref().unwrap_or("Untitled score")
        );
        if let Some(composer) = &outline.composer {
            let _ = writeln!(text, "by {composer}");
        }
        for part in &outline.parts {
            let label = if part.name.is_empty() {
                part.id.as_str()
            } else {
                part.name.as_str()
            };
            let _ = writeln!(
                text,
                "  {label}: {} measures, {} notes, {} rests",
                part.measures, part.notes, part.rests
            );
        }

        Ok(NotationOutput {
            title: outline.title.clone(),
            text,
        })
    }
}

fn part_entry<'a>(parts: &'a mut Vec<PartOutline>, id: &str) -> &'a mut PartOutline {
    let index = match parts.iter().position(|p| p.id == id) {
        Some(index) => index,
        None => {
            parts.push(PartOutline {
                id: id.to_string(),
                ..PartOutline::default()
            });
            parts.len() - 1
        }
    };
    &mut parts[index]
}

fn count_notes(container: roxmltree::Node<'_, '_>, outline: &mut PartOutline) {
    for note in container.children().filter(|n| n.has_tag_name("note")) {
        if note.children().any(|c| c.has_tag_name("rest")) {
            outline.rests += 1;
        } else {
            outline.notes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARTWISE: &str = r#"<score-partwise version="4.0">
  <work><work-title>Minuet</work-title></work>
  <identification><creator type="composer">Petzold</creator></identification>
  <part-list><score-part id="P1"><part-name>Piano</part-name></score-part></part-list>
  <part id="P1">
    <measure number="1"><note><pitch/><duration>4</duration></note><note><rest/></note></measure>
    <measure number="2"><note><pitch/><duration>4</duration></note></measure>
  </part>
</score-partwise>"#;

    #[test]
    fn outlines_partwise_score() {
        let mut backend = OutlineBackend::new();
        backend.load(PARTWISE).unwrap();
        let output = backend.render().unwrap();

        assert_eq!(output.title.as_deref(), Some("Minuet"));
        assert!(output.text.contains("by Petzold"));
        assert!(output.text.contains("Piano: 2 measures, 2 notes, 1 rests"));
    }

    #[test]
    fn outlines_timewise_score() {
        let text = r#"<score-timewise>
  <part-list><score-part id="P1"/></part-list>
  <measure number="1"><part id="P1"><note/><note/></part></measure>
</score-timewise>"#;
        let mut backend = OutlineBackend::new();
        backend.load(text).unwrap();
        let output = backend.render().unwrap();
        assert!(output.text.starts_with("Untitled score"));
        assert!(output.text.contains("P1: 1 measures, 2 notes, 0 rests"));
    }

    #[test]
    fn render_before_load_fails() {
        assert_eq!(
            OutlineBackend::new().render().unwrap_err(),
            NotationError("No score loaded".to_string())
        );
    }

    #[test]
    fn score_without_parts_is_rejected() {
        let mut backend = OutlineBackend::new();
        let err = backend.load("<score-partwise/>").unwrap_err();
        assert!(err.0.contains("no parts"));
    }
}
