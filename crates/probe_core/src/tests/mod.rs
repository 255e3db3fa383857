//! Engine test suite, one module per system plus the literal scenario
//! checks from the tuning worksheet.

mod construction;
mod energy;
mod mining;
mod replication;
