//! Structured error payload returned across the RPC boundary.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad category of an RPC failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcStatus {
    /// The call is not legal in the current observation state.
    Rejected,
    /// The request payload failed validation.
    InvalidArgument,
    /// The application failed while carrying out a legal request.
    Internal,
}

impl fmt::Display for RpcStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Rejected => "rejected",
            Self::InvalidArgument => "invalid_argument",
            Self::Internal => "internal",
        })
    }
}

/// Machine-readable reason for an RPC failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request is malformed or not legal in the current state.
    InvalidRequest,
    /// Beam resources are already assigned.
    ConfiguredForBeamAlready,
    /// No beam resources are assigned.
    NotConfiguredForBeam,
    /// A scan is already configured.
    ConfiguredForScanAlready,
    /// No scan is configured.
    NotConfiguredForScan,
    /// A scan is already running.
    AlreadyScanning,
    /// No scan is running.
    NotScanning,
    /// Unexpected application failure.
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::InvalidRequest => "invalid_request",
            Self::ConfiguredForBeamAlready => "configured_for_beam_already",
            Self::NotConfiguredForBeam => "not_configured_for_beam",
            Self::ConfiguredForScanAlready => "configured_for_scan_already",
            Self::NotConfiguredForScan => "not_configured_for_scan",
            Self::AlreadyScanning => "already_scanning",
            Self::NotScanning => "not_scanning",
            Self::InternalError => "internal_error",
        })
    }
}

/// Error record carried in an `error` response.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{status} ({code}): {message}")]
pub struct RpcError {
    /// Failure category.
    pub status: RpcStatus,
    /// Specific reason.
    pub code: ErrorCode,
    /// Human-readable detail.
    pub message: String,
}

impl RpcError {
    /// Builds an error from its parts.
    pub fn new(status: RpcStatus, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// Precondition failure: the call is not legal right now.
    pub fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(RpcStatus::Rejected, code, message)
    }

    /// Payload validation failure.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(RpcStatus::InvalidArgument, ErrorCode::InvalidRequest, message)
    }

    /// Unexpected application failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcStatus::Internal, ErrorCode::InternalError, message)
    }

    /// Returns `true` when the call was refused by a precondition check.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.status == RpcStatus::Rejected
    }
}
