//! Activity schema for parley conversation turns.
//!
//! Defines the activity exchanged with a conversation partner, the account and
//! conversation-reference shapes around it, and the resolver that maps the
//! open-ended `type` discriminator onto a closed [`ActivityKind`] set.
//!
//! ```rust
//! use parley_schema::{resolve_activity_kind, Activity, ActivityKind};
//!
//! assert_eq!(resolve_activity_kind("messageDelete"), ActivityKind::MessageDelete);
//! assert_eq!(resolve_activity_kind("somethingNew"), ActivityKind::Generic);
//!
//! let activity = Activity::message("hello");
//! assert_eq!(activity.kind(), ActivityKind::Message);
//! ```

pub mod activity;
pub mod activity_kind;

pub use activity::*;
pub use activity_kind::*;
