#![warn(missing_docs)]

//! AppDom sync subsystem: secondary-host resource visibility, ignored types, reload gating

pub mod ignore;
pub mod unused;
pub mod view;

pub use ignore::{IgnoredResourcePolicy, SyncError};
pub use unused::{ReferencedSet, UnusedConfigResolver};
pub use view::HostView;
