//! Scope-run tree construction for a single screen line.
//!
//! The flat tag-code encoding is turned into an arena of nodes with a stack of
//! open scope indices: an open code pushes a scope node, a close code pops it,
//! a positive code appends a text leaf under the current top of stack.
//!
//! Invariants:
//! * Node `0` is the line root and is never popped; unbalanced close codes
//!   are ignored.
//! * Text runs are contiguous in column space starting at column 0 and are
//!   listed in document order by `text_runs`.
//! * Runs claiming more chars than remain in the line are truncated.

use core_model::{ScreenLine, ScreenLineId, TagClassifier};
use core_text::ZERO_WIDTH_NBSP;

const ROOT: usize = 0;

/// Scope names rendered verbatim instead of being expanded to syntax classes.
const PLAIN_CLASSES: [&str; 3] = ["fold-marker", "leading-whitespace", "trailing-whitespace"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Line,
    Scope { class: String },
    Text { run: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<usize>,
}

/// One leaf text run. `char_start` / `len` are in columns (chars).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub node: usize,
    pub char_start: u32,
    pub len: u32,
    pub text: String,
}

impl TextRun {
    #[inline]
    pub fn char_end(&self) -> u32 {
        self.char_start + self.len
    }
}

/// Rendered form of one screen line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTree {
    id: ScreenLineId,
    nodes: Vec<Node>,
    runs: Vec<TextRun>,
}

impl LineTree {
    fn new(id: ScreenLineId) -> Self {
        Self {
            id,
            nodes: vec![Node {
                kind: NodeKind::Line,
                children: Vec::new(),
            }],
            runs: Vec::new(),
        }
    }

    pub fn id(&self) -> ScreenLineId {
        self.id
    }

    pub fn root(&self) -> &Node {
        &self.nodes[ROOT]
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn text_runs(&self) -> &[TextRun] {
        &self.runs
    }

    /// Concatenated text of every run.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Scope classes enclosing a node, outermost first.
    pub fn classes_for(&self, node: usize) -> Vec<&str> {
        let mut path = Vec::new();
        self.collect_path(ROOT, node, &mut path);
        path.iter()
            .filter_map(|idx| match &self.nodes[*idx].kind {
                NodeKind::Scope { class } => Some(class.as_str()),
                _ => None,
            })
            .collect()
    }

    fn collect_path(&self, from: usize, target: usize, path: &mut Vec<usize>) -> bool {
        if from == target {
            return true;
        }
        path.push(from);
        for child in &self.nodes[from].children {
            if self.collect_path(*child, target, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    fn push_node(&mut self, parent: usize, kind: NodeKind) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node {
            kind,
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);
        index
    }

    fn push_text(&mut self, parent: usize, char_start: u32, text: String) {
        let len = text.chars().count() as u32;
        let run = self.runs.len();
        let node = self.push_node(parent, NodeKind::Text { run });
        self.runs.push(TextRun {
            node,
            char_start,
            len,
            text,
        });
    }
}

/// CSS-style class list for a scope name: `syntax--` prefixed per dotted
/// segment, except the view's own structural scopes.
pub fn class_name_for_scope(scope: &str) -> String {
    if PLAIN_CLASSES.contains(&scope) {
        return scope.to_string();
    }
    scope
        .split('.')
        .filter(|segment| !segment.is_empty())
        .map(|segment| format!("syntax--{segment}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn build_line_tree<T: TagClassifier + ?Sized>(line: &ScreenLine, tags: &T) -> LineTree {
    let chars: Vec<char> = line.line_text.chars().collect();
    let mut tree = LineTree::new(line.id);
    let mut stack = vec![ROOT];
    let mut offset = 0usize;

    for &code in &line.tag_codes {
        let parent = stack.last().copied().unwrap_or(ROOT);
        if tags.is_open_tag_code(code) {
            let class = tags
                .tag_for_code(code)
                .map(class_name_for_scope)
                .unwrap_or_default();
            let scope = tree.push_node(parent, NodeKind::Scope { class });
            stack.push(scope);
        } else if tags.is_close_tag_code(code) {
            if stack.len() > 1 {
                stack.pop();
            } else {
                tracing::debug!(target: "render.tiles", line = line.id, code, "unbalanced_close_tag");
            }
        } else if code > 0 {
            let remaining = chars.len() - offset;
            let len = (code as usize).min(remaining);
            if len < code as usize {
                tracing::warn!(
                    target: "render.tiles",
                    line = line.id,
                    code,
                    remaining,
                    "text_run_truncated"
                );
            }
            if len == 0 {
                continue;
            }
            let text: String = chars[offset..offset + len].iter().collect();
            tree.push_text(parent, offset as u32, text);
            offset += len;
        }
    }

    if chars.is_empty() {
        // Keeps the line one row tall.
        tree.push_text(ROOT, 0, " ".to_string());
    } else if chars.last() == Some(&tags.fold_character()) {
        tree.push_text(ROOT, chars.len() as u32, ZERO_WIDTH_NBSP.to_string());
    }
    tree
}
