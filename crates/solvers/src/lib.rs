//! Game solvers for the battle mirror.

pub mod battle;
