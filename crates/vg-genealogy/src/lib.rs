//! Virus genealogy: a multi-parent DAG rooted at a single stem virus.
//!
//! Every virus descends from one or more existing viruses, and removing a
//! virus takes down every descendant left without a parent. All operations
//! either succeed completely or fail without changing the genealogy.

pub mod error;
pub mod genealogy;
mod record;
pub mod removal;
pub mod virus;

pub use error::{GenealogyError, GenealogyResult, Violation};
pub use genealogy::Genealogy;
pub use removal::RemovalPlan;
pub use virus::{SampleVirus, Virus};
