//! JSONL request dispatch for the control socket.
//!
//! Each connection carries exactly one request line holding an
//! [`RpcRequest`](pst_lmc_types::RpcRequest):
//!
//! ```json
//! {"rpc":"configure_beam","config":{"BEAM_ID":"1"}}
//! ```
//!
//! Unary calls are answered with a single `response` or `error` message:
//!
//! ```json
//! {"kind":"response","result":{"type":"empty"}}
//! {"kind":"error","error":{"status":"rejected","code":"invalid_request","message":"..."}}
//! ```
//!
//! The `monitor` call streams `monitor` messages until the observation state
//! leaves `SCANNING`, then writes `stream_end`. A client cancels the stream by
//! closing its connection or writing any further byte.

mod errors;
mod handler;
mod request;
mod response;

pub(crate) use self::handler::DispatchConnectionHandler;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
