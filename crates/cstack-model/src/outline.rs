//! Heading numbering
//!
//! Lines of text steps that start with one to six `#` followed by a space are
//! headings. Numbering is positional: it is recomputed from the whole step
//! sequence and never stored on the steps.

use crate::step::{Step, StepBody};
use once_cell::sync::Lazy;
use regex::Regex;

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6}) (.*)$").expect("heading pattern is valid"));

/// Deepest heading level
pub const MAX_LEVEL: usize = 6;

/// A numbered heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Index of the text step containing the heading
    pub step_index: usize,
    /// Level, 1 to 6
    pub level: usize,
    /// Dotted number, e.g. `2.1.3`
    pub number: String,
    /// Heading text without the hashes
    pub title: String,
}

impl Heading {
    /// Rendered heading line
    #[must_use]
    pub fn render(&self) -> String {
        format!("{} {} {}", "#".repeat(self.level), self.number, self.title)
    }
}

/// Per-level counters for one numbering pass
#[derive(Debug, Default)]
struct HeadingCounters([u32; MAX_LEVEL]);

impl HeadingCounters {
    fn advance(&mut self, level: usize) -> String {
        let idx = level - 1;
        self.0[idx] += 1;
        for deeper in &mut self.0[level..] {
            *deeper = 0;
        }
        self.0[..level]
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let caps = HEADING.captures(line)?;
    let level = caps.get(1)?.as_str().len();
    let title = caps.get(2).map_or("", |m| m.as_str());
    Some((level, title))
}

/// Lines of a text paired with their original terminator (`\n`, `\r\n` or none)
fn text_lines(text: &str) -> impl Iterator<Item = (&str, &str)> {
    text.split_inclusive('\n').map(|segment| {
        let line = segment
            .strip_suffix('\n')
            .map_or(segment, |s| s.strip_suffix('\r').unwrap_or(s));
        (line, &segment[line.len()..])
    })
}

/// Every heading of the sequence, in order
#[must_use]
pub fn headings(steps: &[Step]) -> Vec<Heading> {
    let mut counters = HeadingCounters::default();
    let mut out = Vec::new();

    for (step_index, step) in steps.iter().enumerate() {
        match step.body() {
            StepBody::Text(text) => {
                for (line, _) in text_lines(&text.text) {
                    if let Some((level, title)) = parse_heading(line) {
                        out.push(Heading {
                            step_index,
                            level,
                            number: counters.advance(level),
                            title: title.to_string(),
                        });
                    }
                }
            }
            StepBody::Command(_) | StepBody::Check(_) | StepBody::Verify(_) => {}
        }
    }
    out
}

/// Display text of every step with heading lines numbered
///
/// Non-text steps yield `None`. Non-heading lines and line endings are
/// unchanged.
#[must_use]
pub fn number_headings(steps: &[Step]) -> Vec<Option<String>> {
    let mut numbered = headings(steps).into_iter();

    steps
        .iter()
        .map(|step| match step.body() {
            StepBody::Text(text) => {
                let mut rendered = String::with_capacity(text.text.len());
                for (line, ending) in text_lines(&text.text) {
                    match parse_heading(line).and_then(|_| numbered.next()) {
                        Some(heading) => rendered.push_str(&heading.render()),
                        None => rendered.push_str(line),
                    }
                    rendered.push_str(ending);
                }
                Some(rendered)
            }
            StepBody::Command(_) | StepBody::Check(_) | StepBody::Verify(_) => None,
        })
        .collect()
}
