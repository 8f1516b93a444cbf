//! Raw submissions as handed over by the HTTP layer.

use crate::error::{RegistrationError, Result};
use crate::event_name::{EventName, json_type_name};
use crate::record::{Attachment, RegistrationRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reference to a file already stored by the upload collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    /// Form field the file was uploaded under, e.g. `paymentReceipt` or
    /// `participants[1][idFile]`
    pub field: String,
    /// Public URL of the stored file
    pub url: String,
    /// Storage-side identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<String>,
    /// Name of the file on the uploader's machine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl FileReference {
    /// Reference a stored file under `field`.
    #[must_use]
    pub fn new(field: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            url: url.into(),
            storage_id: None,
            file_name: None,
        }
    }

    /// Attach the storage identifier.
    #[must_use]
    pub fn with_storage_id(mut self, storage_id: impl Into<String>) -> Self {
        self.storage_id = Some(storage_id.into());
        self
    }

    /// Attach the original file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    fn attachment(&self) -> Attachment {
        Attachment {
            file_name: self.file_name.clone(),
            url: self.url.clone(),
            storage_id: self.storage_id.clone(),
        }
    }
}

/// Where an uploaded file ends up on the record.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileTarget {
    PaymentReceipt,
    PaymentScreenshot,
    CashReceipt,
    ParticipantId(usize),
    Document(String),
}

impl FileTarget {
    fn of(field: &str) -> Self {
        match field {
            "paymentReceipt" => Self::PaymentReceipt,
            "paymentScreenshot" => Self::PaymentScreenshot,
            "cashReceipt" => Self::CashReceipt,
            other => participant_index(other).map_or_else(|| Self::Document(other.to_string()), Self::ParticipantId),
        }
    }
}

/// Accepts `participants.<n>.idFile` and `participants[<n>][idFile]`.
fn participant_index(field: &str) -> Option<usize> {
    let rest = field.strip_prefix("participants")?;
    let (index, tail) = if let Some(dotted) = rest.strip_prefix('.') {
        dotted.split_once('.')?
    } else {
        let bracketed = rest.strip_prefix('[')?;
        let (index, tail) = bracketed.split_once(']')?;
        (index, tail.strip_prefix('[')?.strip_suffix(']')?)
    };
    if tail != "idFile" {
        return None;
    }
    index.parse().ok()
}

/// One form submission: free-form fields plus uploaded-file references.
///
/// # Examples
///
/// ```
/// use registration_core::{FileReference, Submission};
/// use serde_json::json;
///
/// let submission = Submission::from_value(json!({"eventName": "Tech Hunt", "teamName": "Alpha"}))
///     .unwrap()
///     .with_file(FileReference::new("paymentReceipt", "https://files.example/r.png"));
/// assert_eq!(submission.event_name().unwrap().as_str(), "Tech Hunt");
/// assert_eq!(submission.files.len(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Submission {
    /// Field map as posted by the form
    pub fields: Map<String, Value>,
    /// Files stored by the upload collaborator
    pub files: Vec<FileReference>,
}

impl Submission {
    /// Submission without files.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            files: Vec::new(),
        }
    }

    /// Build from a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidArgument`] if the payload is not
    /// a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self::new(fields)),
            other => Err(RegistrationError::InvalidArgument(format!(
                "Submission must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Add an uploaded file.
    #[must_use]
    pub fn with_file(mut self, file: FileReference) -> Self {
        self.files.push(file);
        self
    }

    /// Event name carried in the payload's `eventName` field.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidArgument`] if the field is
    /// missing, not a string, or blank.
    pub fn event_name(&self) -> Result<EventName> {
        self.fields.get("eventName").map_or_else(
            || {
                Err(RegistrationError::InvalidArgument(
                    "Event name must be a non-empty string".to_string(),
                ))
            },
            EventName::from_value,
        )
    }
}

/// Place uploaded files on a freshly built record.
///
/// Payment files go to the payment attachments, `participants.<n>.idFile`
/// to participant `n` (zero-based), and everything else into `documents`
/// under its field name. A later file for the same field replaces an
/// earlier one.
///
/// # Errors
///
/// Returns [`RegistrationError::Validation`] when a participant file refers
/// to a participant the submission did not include.
pub fn apply_files(record: &mut RegistrationRecord, files: &[FileReference]) -> Result<()> {
    for file in files {
        let attachment = file.attachment();
        match FileTarget::of(&file.field) {
            FileTarget::PaymentReceipt => record.payment.payment_receipt = Some(attachment),
            FileTarget::PaymentScreenshot => record.payment.payment_screenshot = Some(attachment),
            FileTarget::CashReceipt => record.payment.cash_receipt = Some(attachment),
            FileTarget::ParticipantId(index) => {
                let submitted = record.team.participants.len();
                let participant = record.team.participants.get_mut(index).ok_or_else(|| {
                    RegistrationError::validation(
                        file.field.clone(),
                        format!("file refers to participant {index} but only {submitted} were submitted"),
                    )
                })?;
                participant.id_file = Some(attachment);
            }
            FileTarget::Document(field) => {
                record.documents.insert(field, attachment);
            }
        }
    }
    Ok(())
}
