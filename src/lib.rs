// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![warn(dead_code)]                   // Unused code is flagged
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are flagged
#![warn(unused_variables)]            // Unused variables are flagged
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
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Resource Lifecycle
//!
//! Declarative provisioning and guaranteed teardown of dependent cloud resources.
//!
//! ## Overview
//!
//! A scenario declares a forest of resources (resource groups, messaging
//! namespaces, queues, authorization rules) and a list of updates. A run:
//!
//! - Creates every resource parent first, stopping at the first failure
//! - Applies idempotent partial updates to created resources
//! - Deletes everything it created, children first, exactly once
//! - Reports one line per resource and exits non-zero if anything leaked
//!
//! ## Architecture
//!
//! 1. **Scenario**: Defined in `lifecycle.yaml`
//! 2. **Plan**: Dependency-ordered nodes derived from the scenario
//! 3. **Orchestrator**: Walks the plan against a provider adapter
//!
//! ## Modules
//!
//! - [`config`]: Scenario parsing, resource kinds, and validation
//! - [`planner`]: Plan construction and node lifecycle states
//! - [`provider`]: Provider adapter contract, simulated and REST adapters
//! - [`orchestrator`]: Provision, update, cleanup, events, and reports
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project:
//!   name: messaging-smoke-test
//!
//! resources:
//!   - name: rg
//!     kind: resource_group
//!   - name: ns
//!     kind: namespace
//!     parent: rg
//!   - name: orders
//!     kind: queue
//!     parent: ns
//!     config:
//!       requires_session: true
//!       max_delivery_count: 40
//!
//! updates:
//!   - resource: orders
//!     patch:
//!       auto_delete_on_idle: 5m
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod provider;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, ScenarioConfig};
pub use error::{ErrorKind, LifecycleError, Result};
pub use orchestrator::{CleanupReport, LifecycleEvent, Orchestrator, RunReport};
pub use planner::{NodeState, Plan, ResourceNode};
pub use provider::{HttpProvider, MemoryProvider, ProviderAdapter};
