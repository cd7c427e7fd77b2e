//! 🫐欢迎光临🫐
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d, Label};

pub use crate::data::{
    CompactLabelSlice, LabelSlice, LabelSliceMut, LabelStack, OwnedLabelSlice,
};

pub use crate::cells::{Cell, CellTable, PossibleMatches};

pub use crate::consts::{DEFAULT_PITCH_NM, DEFAULT_TOLERANCE_NM};

pub use crate::solve::{BranchBoundSolver, LinearSolver};

pub use crate::ted::{evaluate, evaluate_with, TedConfig, TedError, TedErrors, TedOutcome};

pub use crate::dataset::{self, StackPair};

pub use crate::post_proc;
