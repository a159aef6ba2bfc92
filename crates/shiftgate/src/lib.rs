//! `shiftgate` - Shift data gateway for pyrolysis plant operations
//!
//! This library reads and writes production-shift records kept in an
//! Airtable-style tabular store, normalizes the two schema generations the
//! plant has used, and computes the per-shift view shown to operators:
//! yield, elapsed time, efficiency, status and temperature alerts.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod entities;
pub mod error;
pub mod formula;
pub mod gateway;
pub mod logging;
pub mod metrics;
pub mod poll;
pub mod query;
pub mod record;
pub mod sample;
pub mod shift;
pub mod transport;

pub use config::Config;
pub use entities::{Batch, MassBalance, Person, Process, ProcessStatus, Role, TeamMember};
pub use error::{Error, Result};
pub use formula::Formula;
pub use gateway::{select_current, ShiftGateway};
pub use logging::init_logging;
pub use metrics::{compute_shift_view, Alert, ShiftMetrics, ShiftStatistics, ShiftView};
pub use poll::{PollHandle, PollScope};
pub use record::{Fields, Record};
pub use sample::{ConnectionStatus, DataSource, Labelled};
pub use shift::{Shift, ShiftShape, ShiftStatus};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};
