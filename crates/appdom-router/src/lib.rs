#![warn(missing_docs)]

//! AppDom router subsystem: domain topology, process clients, concurrent dispatch, aggregation

pub mod aggregate;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod topology;

pub use aggregate::aggregate_group_responses;
pub use client::{LocalProcess, ProcessClient, ProcessState};
pub use dispatch::{DispatchOutcome, RouteTarget, Router};
pub use error::{Result, RouterError};
pub use protocol::{decode_frame, encode_frame, ManagementRequest, ManagementResponse};
pub use topology::{DomainTopology, HostInfo, ServerGroupInfo, ServerInfo, ServerStatus};
