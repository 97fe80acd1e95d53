//! Order ledger domain
//!
//! An [`Order`] is one end-to-end run of the command pipeline. Its changes are
//! [`ProposedChange`]s parsed from the Lieutenant's reply; the full stage trace
//! of a run is returned as an [`OrderResult`].

pub mod change;
pub mod entities;
pub mod trace;

pub use change::{ChangeAction, ProposedChange};
pub use entities::{Order, OrderId, OrderStatus, OrderUpdate};
pub use trace::{
    ChangeDisposition, ChangeOutcome, FailureKind, OrderResult, PipelineFailure, Stage,
    StageOutcome, StageRecord, SyncReport,
};
