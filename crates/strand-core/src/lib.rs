//! Core contracts for the Strand web-serving toolkit.
//!
//! This crate defines the message-passing boundary between a network
//! transport and application code: the per-request [`Scope`] record, the
//! inbound/outbound frame types, the channel handles that carry them, and
//! the [`Application`] trait that ties them together. It also provides
//! configuration loading and the core error type shared across the
//! workspace.
//!
//! The transport itself (socket handling, HTTP framing, TLS) lives outside
//! this workspace; anything that can deliver a [`Scope`] plus a stream of
//! [`BodyFrame`]s and consume [`ResponseFrame`]s can drive a Strand
//! application.

mod config;
mod error;
mod message;

pub use config::StrandConfig;
pub use error::{StrandError, StrandResult};
pub use message::{
    Address, Application, BodyFrame, BodyReceiver, BodySender, FrameReceiver, FrameSender,
    ResponseFrame, Scope, body_channel, frame_channel,
};
