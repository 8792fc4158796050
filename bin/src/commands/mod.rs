//! CLI command implementations.

pub(crate) mod backfill;
pub(crate) mod cleanup;
pub(crate) mod refresh;
pub(crate) mod serve;
