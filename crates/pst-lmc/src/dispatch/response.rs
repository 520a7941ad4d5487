//! JSONL framing of server messages.

use std::io::Write;

use pst_lmc_types::{MonitorData, RpcError, RpcResponse, ServerMessage};

use super::errors::DispatchError;

/// Writer that serialises server messages as JSONL.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Creates a new response writer wrapping the given output stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one message as a line and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_message(&mut self, message: &ServerMessage) -> Result<(), DispatchError> {
        serde_json::to_writer(&mut self.writer, message)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes the outcome of a unary call.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_result(&mut self, result: Result<RpcResponse, RpcError>) -> Result<(), DispatchError> {
        self.write_message(&ServerMessage::from(result))
    }

    /// Writes a structured error.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_error(&mut self, error: RpcError) -> Result<(), DispatchError> {
        self.write_message(&ServerMessage::Error { error })
    }

    /// Writes one monitor sample.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_monitor(&mut self, data: &MonitorData) -> Result<(), DispatchError> {
        self.write_message(&ServerMessage::Monitor { data: data.clone() })
    }

    /// Writes the end-of-stream marker.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_stream_end(&mut self) -> Result<(), DispatchError> {
        self.write_message(&ServerMessage::StreamEnd)
    }

    /// Mutable access to the wrapped stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }
}
