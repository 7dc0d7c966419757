//! Username claim form with simulated email confirmation.
//!
//! This example shows the asynchronous submission lifecycle end to end:
//!
//! - Input validation before anything is submitted
//! - Optimistic `Pending` entries shown while the email is in flight
//! - A mutation runner tracking pending/error flags
//! - Success and error notifications through an injected sink
//! - Configurable latency and fault injection instead of hard-coded randomness
//!
//! # Quick Start
//!
//! ```no_run
//! use claim_form::{ClaimForm, SimulatedEmailClient, SubmissionEnvironment, SubmissionMode};
//! use composable_forms_core::environment::SystemClock;
//! use composable_forms_core::submission::NoFaults;
//! use composable_forms_runtime::notify::TracingSink;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SimulatedEmailClient::new(Duration::from_millis(100), Arc::new(NoFaults));
//! let env = SubmissionEnvironment::new(Arc::new(client), Arc::new(TracingSink), Arc::new(SystemClock));
//! let form = ClaimForm::new(SubmissionMode::Optimistic, env);
//!
//! let outcome = form.submit("alice").await?;
//! println!("{outcome:?}");
//! println!("{} entries", form.display_list().await.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod email;
pub mod form;
pub mod reducer;
pub mod types;

// Re-export commonly used types
pub use config::{ClaimConfig, ConfigError};
pub use email::SimulatedEmailClient;
pub use form::{ClaimForm, FormError, SubmitOutcome};
pub use reducer::{ClaimMessages, SubmissionEnvironment, SubmissionReducer};
pub use types::{SubmissionAction, SubmissionMode, SubmissionState};
