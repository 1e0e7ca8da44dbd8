//! Outbound response and error envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::clock::format_rfc3339;
use crate::error::ValidationErrors;
use crate::keys::RequestId;
use crate::record::FusedRecord;
use crate::request::EnrichmentField;

/// Premium quota consumption reported after an enriched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumUsage {
    /// Calendar month, 1-12.
    pub month: u8,
    pub total_calls: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub request_correlation_id: RequestId,
    pub cache_hit: bool,
    #[serde(
        rename = "attom_usage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub premium_usage: Option<PremiumUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_fallback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_open_fallback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_time: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub premium_fields: Vec<EnrichmentField>,
    #[serde(default)]
    pub latency_ms: u64,
}

impl ResponseMetadata {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_correlation_id: request_id,
            cache_hit: false,
            premium_usage: None,
            rate_limit_fallback: None,
            circuit_open_fallback: None,
            enrichment_error: None,
            cache_time: None,
            data_sources: Vec::new(),
            premium_fields: Vec::new(),
            latency_ms: 0,
        }
    }
}

/// Successful lookup response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub data: Vec<FusedRecord>,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    ApiError,
    SystemError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: u16,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMetadata {
    pub request_id: RequestId,
    pub error_type: ErrorType,
}

/// Failed lookup response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub metadata: ErrorMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<ValidationErrors>,
}

impl ErrorResponse {
    pub fn validation(request_id: RequestId, errors: ValidationErrors, at: OffsetDateTime) -> Self {
        Self {
            error: ErrorBody {
                message: errors.to_string(),
                code: ReplyStatus::BadRequest.as_u16(),
                timestamp: format_rfc3339(at),
            },
            metadata: ErrorMetadata {
                request_id,
                error_type: ErrorType::ApiError,
            },
            validation_errors: Some(errors),
        }
    }

    pub fn system(request_id: RequestId, message: impl Into<String>, at: OffsetDateTime) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                code: ReplyStatus::InternalServerError.as_u16(),
                timestamp: format_rfc3339(at),
            },
            metadata: ErrorMetadata {
                request_id,
                error_type: ErrorType::SystemError,
            },
            validation_errors: None,
        }
    }
}

/// The three status codes the gateway can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplyStatus {
    Ok,
    BadRequest,
    InternalServerError,
}

impl ReplyStatus {
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::InternalServerError => 500,
        }
    }
}

/// Outcome of [`crate::gateway::Gateway::handle`]: a body plus its status.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayReply {
    Success(GatewayResponse),
    Failure(ErrorResponse),
}

impl GatewayReply {
    pub fn status(&self) -> ReplyStatus {
        match self {
            Self::Success(_) => ReplyStatus::Ok,
            Self::Failure(error) if error.metadata.error_type == ErrorType::ApiError => {
                ReplyStatus::BadRequest
            }
            Self::Failure(_) => ReplyStatus::InternalServerError,
        }
    }

    pub fn success(&self) -> Option<&GatewayResponse> {
        match self {
            Self::Success(response) => Some(response),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        match self {
            Self::Success(response) => serde_json::to_value(response),
            Self::Failure(error) => serde_json::to_value(error),
        }
    }
}
