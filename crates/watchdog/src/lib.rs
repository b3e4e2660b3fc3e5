#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`WatchdogError`)
//! - [`config`]: Watchdog configuration (`WatchdogConfig`, builder)
//! - [`source`]: Log sources (`LogSource` trait, `ApiLogSource`, `CliTailSource`, `ReaderSource`)
//! - [`matcher`]: Error signature matching (`SignatureMatcher`, `MatchMode`)
//! - [`platform`]: Platform command abstraction (`PlatformClient` trait, CLI/API backends)
//! - [`remediation`]: Remediation actions (`RemediationAction`, `RemediationExecutor`)
//! - [`watchdog`]: Main orchestrator (`Watchdog`, `WatchReport`)
//!
//! # Architecture
//!
//! ```text
//! LogSource.next_line()
//!        |
//!   SignatureMatcher.matches()
//!        |
//!   RemediationExecutor.trigger()  (cooldown guard)
//!        |
//!   PlatformClient.scale() / restart()
//! ```

pub mod config;
pub mod error;
pub mod matcher;
pub mod platform;
pub mod remediation;
pub mod source;
pub mod watchdog;

// --- Public API Re-exports ---

// Watchdog (main orchestrator)
pub use watchdog::{WatchOutcome, WatchReport, Watchdog};

// Configuration
pub use config::{Backend, SourceMode, WatchdogConfig, WatchdogConfigBuilder};

// Error
pub use error::WatchdogError;

// Sources
pub use source::{
    ApiLogSource, CliTailSource, ConfiguredSource, LogSource, ReaderSource, collect_lines,
};

// Matcher
pub use matcher::{MatchMode, SignatureMatcher};

// Platform
pub use platform::{CommandOutput, HerokuApiClient, HerokuCliClient, PlatformBackend, PlatformClient};

// Remediation
pub use remediation::{
    RemediationAction, RemediationEvent, RemediationExecutor, RemediationOutcome,
    RemediationReport, RemediationState, RemediationStrategy,
};
