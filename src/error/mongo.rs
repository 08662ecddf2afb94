use std::fmt;

use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// Structured information pulled out of a driver error.
///
/// Shown to users as JSON so server codes survive the trip through
/// whatever presentation layer sits on top of the cursor or exporter.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(rename = "codeName", skip_serializing_if = "Option::is_none")]
    pub code_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// Details of a failed write, taken from the server's error document.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(rename = "keyValue", skip_serializing_if = "Option::is_none")]
    pub key_value: Option<Document>,
}

impl ErrorInfo {
    /// Compact single-line JSON, suitable for logs.
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Render a driver error as `{"error": {...}}` pretty JSON.
pub fn format_mongodb_error(
    f: &mut fmt::Formatter<'_>,
    error: &mongodb::error::Error,
) -> fmt::Result {
    let info = extract_error_info(error);
    let wrapper = serde_json::json!({ "error": info });
    let json_output = serde_json::to_string_pretty(&wrapper).map_err(|_| fmt::Error)?;
    write!(f, "\n{json_output}")
}

/// Extract structured information from a driver error using its typed kinds.
pub fn extract_error_info(error: &mongodb::error::Error) -> ErrorInfo {
    use mongodb::error::{ErrorKind, WriteFailure};

    let mut info = ErrorInfo::default();

    match error.kind.as_ref() {
        ErrorKind::Command(command_error) => {
            info.error_type = Some("mongo.command_error".to_string());
            info.code = Some(command_error.code);
            info.code_name = Some(command_error.code_name.clone());
            info.message = Some(command_error.message.clone());
        }
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            info.error_type = Some("mongo.write_error".to_string());
            info.code = Some(write_error.code);
            info.code_name = write_error.code_name.clone();
            info.message = Some(write_error.message.clone());
            info.details = write_error.details.as_ref().map(details_from);
        }
        ErrorKind::Write(WriteFailure::WriteConcernError(wc_error)) => {
            info.error_type = Some("mongo.write_concern_error".to_string());
            info.code = Some(wc_error.code);
            info.code_name = Some(wc_error.code_name.clone());
            info.message = Some(wc_error.message.clone());
        }
        ErrorKind::InsertMany(insert_error) => {
            info.error_type = Some("mongo.insert_many_error".to_string());
            if let Some(first) = insert_error.write_errors.as_ref().and_then(|e| e.first()) {
                info.code = Some(first.code);
                info.code_name = first.code_name.clone();
                info.message = Some(first.message.clone());
                info.details = first.details.as_ref().map(details_from);
            }
        }
        ErrorKind::Authentication { message, .. } => {
            info.error_type = Some("mongo.authentication_error".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::ServerSelection { message, .. } => {
            info.error_type = Some("mongo.server_selection_error".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::InvalidArgument { message, .. } => {
            info.error_type = Some("mongo.invalid_argument".to_string());
            info.message = Some(message.clone());
        }
        _ => {
            info.message = Some(error.to_string());
        }
    }

    if matches!(info.code, Some(11000) | Some(11001)) {
        info.code_name.get_or_insert_with(|| "DuplicateKey".to_string());
    }

    info
}

fn details_from(doc: &Document) -> ErrorDetails {
    let index = match doc.get("index").or_else(|| doc.get("indexName")) {
        Some(Bson::String(name)) => Some(name.clone()),
        _ => None,
    };
    let key_value = match doc.get("keyValue") {
        Some(Bson::Document(key)) => Some(key.clone()),
        _ => None,
    };
    ErrorDetails { index, key_value }
}
