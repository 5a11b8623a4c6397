//! Recorded statement sections
//!
//! Statements observed before the first frame boundary form the
//! initialization section; every frame boundary opens a new frame section.

use super::Scope;

/// Ordered statements of one section
#[derive(Debug, Default, Clone)]
pub struct Section {
    pub statements: Vec<String>,
}

/// Initialization section plus one section per recorded frame
#[derive(Debug, Default)]
pub struct FrameLog {
    init: Section,
    frames: Vec<Section>,
}

impl FrameLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope that new statements are appended to
    pub fn current_scope(&self) -> Scope {
        match self.frames.len() {
            0 => Scope::Init,
            n => Scope::Frame(n - 1),
        }
    }

    /// Open a new frame section, returning its index
    pub fn begin_frame(&mut self) -> usize {
        self.frames.push(Section::default());
        self.frames.len() - 1
    }

    /// Append a statement to the current section
    pub fn push(&mut self, statement: String) {
        match self.frames.last_mut() {
            Some(frame) => frame.statements.push(statement),
            None => self.init.statements.push(statement),
        }
    }

    pub fn init(&self) -> &Section {
        &self.init
    }

    pub fn frames(&self) -> &[Section] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Statements across all sections
    pub fn statement_count(&self) -> usize {
        self.init.statements.len()
            + self
                .frames
                .iter()
                .map(|f| f.statements.len())
                .sum::<usize>()
    }
}
