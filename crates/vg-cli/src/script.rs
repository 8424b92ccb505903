//! Line-oriented command scripts.
//!
//! ```text
//! # comments and blank lines are ignored
//! create B A
//! create BC B C
//! connect BC A
//! children A
//! remove B
//! ```

use std::fmt;

use anyhow::{bail, Context};

/// One command of a script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Create { id: String, parents: Vec<String> },
    Connect { child: String, parent: String },
    Remove { id: String },
    Children { id: String },
    Parents { id: String },
    Exists { id: String },
    Stem,
}

impl Step {
    /// Returns `true` if the step can change the genealogy.
    pub fn mutates(&self) -> bool {
        matches!(self, Self::Create { .. } | Self::Connect { .. } | Self::Remove { .. })
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { id, parents } => write!(f, "create {id} {}", parents.join(" ")),
            Self::Connect { child, parent } => write!(f, "connect {child} {parent}"),
            Self::Remove { id } => write!(f, "remove {id}"),
            Self::Children { id } => write!(f, "children {id}"),
            Self::Parents { id } => write!(f, "parents {id}"),
            Self::Exists { id } => write!(f, "exists {id}"),
            Self::Stem => write!(f, "stem"),
        }
    }
}

/// A step together with its 1-based line number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub step: Step,
}

/// Parse a whole script. Fails on the first malformed line.
pub fn parse(source: &str) -> anyhow::Result<Vec<Line>> {
    let mut lines = Vec::new();
    for (index, text) in source.lines().enumerate() {
        let number = index + 1;
        if let Some(step) = parse_line(text).with_context(|| format!("line {number}"))? {
            lines.push(Line { number, step });
        }
    }
    Ok(lines)
}

fn parse_line(text: &str) -> anyhow::Result<Option<Step>> {
    let text = text.split('#').next().unwrap_or_default();
    let mut words = text.split_whitespace().map(str::to_string);
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let args: Vec<String> = words.collect();

    let step = match (command.as_str(), args.as_slice()) {
        ("create", [id, parents @ ..]) if !parents.is_empty() => Step::Create {
            id: id.clone(),
            parents: parents.to_vec(),
        },
        ("create", _) => bail!("usage: create <id> <parent>..."),
        ("connect", [child, parent]) => Step::Connect {
            child: child.clone(),
            parent: parent.clone(),
        },
        ("connect", _) => bail!("usage: connect <child> <parent>"),
        ("remove", [id]) => Step::Remove { id: id.clone() },
        ("children", [id]) => Step::Children { id: id.clone() },
        ("parents", [id]) => Step::Parents { id: id.clone() },
        ("exists", [id]) => Step::Exists { id: id.clone() },
        ("remove" | "children" | "parents" | "exists", _) => bail!("usage: {command} <id>"),
        ("stem", []) => Step::Stem,
        ("stem", _) => bail!("usage: stem"),
        (other, _) => bail!("unknown command `{other}`"),
    };
    Ok(Some(step))
}
