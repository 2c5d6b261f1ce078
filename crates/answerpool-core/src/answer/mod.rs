//! Question prompt construction and answer cleanup.

pub mod prompt;
