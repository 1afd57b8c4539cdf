//! Declarative test runner: a JSON document names scenarios and steps, each
//! step dispatches to a caller-registered [`actions::Action`].
//!
//! ```ignore
//! let mut runner = Runner::new("smoke.json")?;
//! runner.import_actions(actions::builtin_registry());
//! if !runner.validate() {
//!     return Err(anyhow!("test validation failed"));
//! }
//! let report = runner.execute().await;
//! ```

pub mod actions;
pub mod errors;
pub mod events;
pub mod flow;
pub mod limits;
pub mod loader;
pub mod protocol;
pub mod runner;
pub mod telemetry;
pub mod validation;

pub use actions::{Action, ActionRegistry, FnAction};
pub use errors::{DispatchError, LoadError, ValidationError};
pub use events::{EventSink, MemorySink, RunEvent, TracingSink};
pub use runner::Runner;
