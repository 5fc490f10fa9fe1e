//! Execution stages ("buckets") of a frame

use std::fmt;

/// A named point in the frame where a group of systems runs.
///
/// The declaration order is the frame order within each group below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    // Start of the variable-rate update
    First,
    Input,

    // Fixed-rate loop
    PreUpdate,
    /// Default stage for game logic
    Update,
    PostPhysics,

    // After the fixed loop
    LateUpdate,
    Cleanup,
    PreRender,

    // Draw callback
    Audio,
    Render,

    /// Runs instead of the fixed loop while paused
    UpdatePaused,
    /// Runs every frame, paused or not
    Transient,
}

impl Stage {
    pub const COUNT: usize = 12;

    pub const ALL: [Stage; Stage::COUNT] = [
        Stage::First,
        Stage::Input,
        Stage::PreUpdate,
        Stage::Update,
        Stage::PostPhysics,
        Stage::LateUpdate,
        Stage::Cleanup,
        Stage::PreRender,
        Stage::Audio,
        Stage::Render,
        Stage::UpdatePaused,
        Stage::Transient,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::First => "First",
            Stage::Input => "Input",
            Stage::PreUpdate => "PreUpdate",
            Stage::Update => "Update",
            Stage::PostPhysics => "PostPhysics",
            Stage::LateUpdate => "LateUpdate",
            Stage::Cleanup => "Cleanup",
            Stage::PreRender => "PreRender",
            Stage::Audio => "Audio",
            Stage::Render => "Render",
            Stage::UpdatePaused => "UpdatePaused",
            Stage::Transient => "Transient",
        }
    }
}

impl Default for Stage {
    fn default() -> Self {
        Stage::Update
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
