// ============================================================================
// Strict linting
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// Tests may unwrap freely
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # OSAC Provision
//!
//! Declarative provisioning of clusters, compute instances, hosts and host
//! pools against a fulfillment API.
//!
//! ## Overview
//!
//! Resources are declared in an `osac.yaml` file. Creating or updating a
//! resource is an asynchronous request to the API; the engine then polls the
//! object until its provisioning state settles and reports the final object,
//! a failure carrying the last observed state, or a timeout.
//!
//! ## Architecture
//!
//! 1. **Declared State**: Defined in `osac.yaml`
//! 2. **Recorded State**: What previous applies created, kept in `.osac/state.json`
//! 3. **Plan**: The creates, updates, replacements and deletes that bring one to the other
//! 4. **Reconcilers**: Per-kind create/update/delete/read with polling until ready
//!
//! ## Modules
//!
//! - [`params`]: Template parameter envelopes
//! - [`provision`]: State classification and the poll engine
//! - [`fulfillment`]: Fulfillment API client and wire types
//! - [`resources`]: Per-kind reconcilers
//! - [`config`]: Configuration parsing and validation
//! - [`state`]: Local state storage and locking
//! - [`planner`]: Diff computation and plan execution
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! provider:
//!   endpoint: https://fulfillment.example.com
//!
//! hosts:
//!   bmc-01:
//!     power_state: "ON"
//!
//! clusters:
//!   edge:
//!     template: ocp_4_17_small
//!     template_parameters:
//!       pull_secret: "{...}"
//!     node_sets:
//!       workers:
//!         host_class: fc430
//!         size: 3
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod fulfillment;
pub mod params;
pub mod planner;
pub mod provision;
pub mod resources;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, OsacConfig};
pub use error::{OsacError, Result};
pub use fulfillment::{CatalogService, FulfillmentClient, ResourceService};
pub use planner::{DiffEngine, PlanExecutor, ProvisioningPlan};
pub use provision::{classify, wait_for_ready, CancelHandle, CancelSignal, WaitOutcome};
pub use resources::{ResourceKind, ResourceReconciler, ResourceType};
pub use state::{LocalStateStore, ProvisioningState, StateStore};
