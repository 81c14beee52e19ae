//! Outbound record submission.
//!
//! `RequestChannel` POSTs a JSON record with a timeout and falls back to an
//! unconfirmed (opaque) delivery when the response is blocked by
//! cross-origin policy. `LeadSender` adds request metadata to leads.

mod channel;
mod lead;
mod transport;

pub use channel::{RequestChannel, SubmissionResult, SubmitReply};
pub use lead::{Lead, LeadContext, LeadMeta, LeadSender};
pub use transport::{
  DeliveryMode, HttpTransport, Transport, TransportError, TransportResponse, SIMPLE_CONTENT_TYPE,
};
