//! Input-schema resolution — which form fields must a user fill in to
//! start or resume a workflow?
//!
//! The pipeline:
//!
//! 1. [`compose::parse_fragments`] turns the declared (possibly multi-part)
//!    schema into an ordered list of form fragments.
//! 2. [`initial::extract`] reads already-known values for those fragments
//!    out of a process instance's variable snapshot.
//! 3. [`merge::merge`] applies the primary/assessment precedence rule and
//!    computes the read-only field set.
//! 4. [`resolver::InputSchemaResolver`] orchestrates the collaborator
//!    lookups and assembles the response.
//!
//! Steps 1–3 are pure functions over already-fetched data; the resolver is
//! the only component that performs I/O. Everything is request-scoped —
//! no caches, no shared mutable state.

pub mod compose;
pub mod initial;
pub mod merge;
pub mod resolver;

pub use compose::{InputSchemaDefinition, SchemaFragment, parse_fragments};
pub use initial::{DATA_KEY, FragmentValues, InitialState, extract};
pub use merge::{MergedState, merge};
pub use resolver::{InputSchemaResolver, WorkflowDataInputSchemaResponse, WorkflowItemRef};
