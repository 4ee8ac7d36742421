use thiserror::Error;

/// Success status for numeric C entry points.
pub const DAL_OK: i32 = 0;

/// Sentinel returned by numeric C entry points on failure.
pub const DAL_ERROR: i32 = -9_999_999;

/// Error category for decision-making (branch on document shape, abort, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The source document is malformed or reported a service-side failure.
    Document,
    /// A handle, index, key or name did not resolve.
    Lookup,
    /// A stored value could not be converted to the requested type.
    Conversion,
    /// Fetching a document or dataset failed.
    Transport,
    /// Allocation or infrastructure failure; the current operation is abandoned.
    Fatal,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DalError {
    #[error("Invalid handle: {0}")]
    BadHandle(i32),

    #[error("Memory allocation failed: {0}")]
    MemAllocFail(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Service base URL not specified")]
    NoBaseUrl,

    #[error("Service protocol not specified")]
    NoProtocol,

    #[error("Service protocol version not specified")]
    NoVersion,

    #[error("Query parameter not found: {0}")]
    ParamNotFound(String),

    #[error("Cannot form query URL: {0}")]
    FormQueryUrl(String),

    #[error("Query execution failed: {0}")]
    ExecuteQuery(String),

    #[error("Query has not been executed")]
    QueryNotExecuted,

    #[error("Cannot parse response document: {0}")]
    DocumentParse(String),

    #[error(
        "Service reported QUERY_STATUS=ERROR: {}",
        .message.as_deref().unwrap_or("no message")
    )]
    VoQueryError { message: Option<String> },

    #[error("No RESOURCE at index {index}")]
    NoResource { index: usize },

    #[error("No TABLE at index {index}")]
    NoTable { index: usize },

    #[error("TABLE has no DATA element")]
    NoData,

    #[error("DATA has no TABLEDATA element")]
    NoTableData,

    #[error("INFO not found at index {0}")]
    InfoNotFound(i64),

    #[error("Cannot access field at index {0}")]
    FieldAccess(i64),

    #[error("Attribute not found: {0}")]
    AttrNotFound(String),

    #[error("No field with {attr}='{key}'")]
    FieldNotFound { key: String, attr: String },

    #[error("Record not found: {0}")]
    RecordNotFound(i64),

    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    #[error("Invalid integer value for property '{0}'")]
    InvalidIntProperty(String),

    #[error("Invalid float value for property '{0}'")]
    InvalidFloatProperty(String),

    #[error("Index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("Invalid integer value in field {0}")]
    InvalidIntField(usize),

    #[error("Invalid float value in field {0}")]
    InvalidFloatField(usize),

    #[error("Invalid URL: '{0}'")]
    InvalidUrl(String),

    #[error("Invalid filename: '{0}'")]
    InvalidFilename(String),

    #[error("Cannot open file '{path}': {reason}")]
    CannotOpenFile { path: String, reason: String },

    #[error("Row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Output buffer too small: need {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },

    #[error("Source document text has been released")]
    SourceReleased,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Cannot connect to host: {0}")]
    HostNoConnect(String),

    #[error("HTTP status {status} from {url}")]
    HttpError { status: u16, url: String },

    #[error("HTTP request timed out: {0}")]
    HttpTimeout(String),

    #[error("Too many redirects: {0}")]
    HttpRedirectLoop(String),

    #[error("Response exceeds {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DalError {
    fn from(err: std::io::Error) -> Self {
        DalError::Io(err.to_string())
    }
}

impl DalError {
    /// Stable numeric code, shared with the C ABI.
    pub fn code(&self) -> i32 {
        match self {
            DalError::BadHandle(_) => 100,
            DalError::MemAllocFail(_) => 101,
            DalError::LockPoisoned(_) => 102,
            DalError::NoBaseUrl => 104,
            DalError::NoProtocol => 105,
            DalError::NoVersion => 106,
            DalError::ParamNotFound(_) => 107,
            DalError::FormQueryUrl(_) => 120,
            DalError::ExecuteQuery(_) => 121,
            DalError::QueryNotExecuted => 123,
            DalError::DocumentParse(_) => 124,
            DalError::VoQueryError { .. } => 125,
            DalError::NoResource { .. } => 126,
            DalError::NoTable { .. } => 127,
            DalError::NoData => 128,
            DalError::NoTableData => 129,
            DalError::InfoNotFound(_) => 131,
            DalError::FieldAccess(_) => 132,
            DalError::AttrNotFound(_) => 133,
            DalError::FieldNotFound { .. } => 134,
            DalError::RecordNotFound(_) => 135,
            DalError::PropertyNotFound(_) => 136,
            DalError::InvalidIntProperty(_) => 137,
            DalError::InvalidFloatProperty(_) => 138,
            DalError::IndexOutOfBounds { .. } => 139,
            DalError::InvalidIntField(_) => 140,
            DalError::InvalidFloatField(_) => 141,
            DalError::InvalidUrl(_) => 142,
            DalError::InvalidFilename(_) => 143,
            DalError::CannotOpenFile { .. } => 144,
            DalError::RaggedRow { .. } => 145,
            DalError::BufferTooSmall { .. } => 146,
            DalError::SourceReleased => 147,
            DalError::Transport(_) => 152,
            DalError::HostNoConnect(_) => 153,
            DalError::HttpError { .. } => 154,
            DalError::HttpTimeout(_) => 155,
            DalError::HttpRedirectLoop(_) => 156,
            DalError::FileTooLarge { .. } => 157,
            DalError::Io(_) => 158,
        }
    }

    pub fn to_structured(&self) -> StructuredError {
        StructuredError {
            code: self.code(),
            message: self.to_string(),
        }
    }

    /// Returns true for document-shape, lookup and conversion failures,
    /// which callers are expected to branch on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.error_category(),
            ErrorCategory::Document | ErrorCategory::Lookup | ErrorCategory::Conversion
        )
    }

    /// Returns true if this is a network-related error
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            DalError::Transport(_)
                | DalError::HostNoConnect(_)
                | DalError::HttpError { .. }
                | DalError::HttpTimeout(_)
                | DalError::HttpRedirectLoop(_)
                | DalError::FileTooLarge { .. }
        )
    }

    /// Returns the error category for decision-making
    pub fn error_category(&self) -> ErrorCategory {
        if self.is_transport_error() {
            return ErrorCategory::Transport;
        }
        match self {
            DalError::DocumentParse(_)
            | DalError::VoQueryError { .. }
            | DalError::NoResource { .. }
            | DalError::NoTable { .. }
            | DalError::NoData
            | DalError::NoTableData
            | DalError::RaggedRow { .. } => ErrorCategory::Document,
            DalError::BadHandle(_)
            | DalError::ParamNotFound(_)
            | DalError::QueryNotExecuted
            | DalError::InfoNotFound(_)
            | DalError::FieldAccess(_)
            | DalError::AttrNotFound(_)
            | DalError::FieldNotFound { .. }
            | DalError::RecordNotFound(_)
            | DalError::PropertyNotFound(_)
            | DalError::IndexOutOfBounds { .. } => ErrorCategory::Lookup,
            DalError::InvalidIntProperty(_)
            | DalError::InvalidFloatProperty(_)
            | DalError::InvalidIntField(_)
            | DalError::InvalidFloatField(_) => ErrorCategory::Conversion,
            _ => ErrorCategory::Fatal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredError {
    pub code: i32,
    pub message: String,
}

/// Posted-error slot: holds the most recent failure until cleared or
/// overwritten by the next one.
#[derive(Debug, Clone, Default)]
pub struct ErrorSlot {
    last: Option<StructuredError>,
}

impl ErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, err: &DalError) {
        self.last = Some(err.to_structured());
    }

    pub fn clear(&mut self) {
        self.last = None;
    }

    /// Code of the posted error, or `DAL_OK` when the slot is empty.
    pub fn code(&self) -> i32 {
        self.last.as_ref().map_or(DAL_OK, |e| e.code)
    }

    pub fn message(&self) -> Option<&str> {
        self.last.as_ref().map(|e| e.message.as_str())
    }

    pub fn last(&self) -> Option<&StructuredError> {
        self.last.as_ref()
    }
}

pub type Result<T> = std::result::Result<T, DalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(DalError::BadHandle(3).code(), 100);
        assert_eq!(DalError::LockPoisoned("state".to_string()).code(), 102);
        assert_eq!(DalError::VoQueryError { message: None }.code(), 125);
        assert_eq!(DalError::NoResource { index: 0 }.code(), 126);
        assert_eq!(DalError::RecordNotFound(-1).code(), 135);
        assert_eq!(DalError::InvalidFloatField(2).code(), 141);
        assert_eq!(DalError::Io("x".to_string()).code(), 158);
    }

    #[test]
    fn test_error_display() {
        let err = DalError::VoQueryError {
            message: Some("bad position".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Service reported QUERY_STATUS=ERROR: bad position"
        );

        let err = DalError::VoQueryError { message: None };
        assert!(err.to_string().ends_with("no message"));

        let err = DalError::FieldNotFound {
            key: "ra".to_string(),
            attr: "name".to_string(),
        };
        assert_eq!(err.to_string(), "No field with name='ra'");
    }

    #[test]
    fn test_error_category() {
        assert_eq!(DalError::NoData.error_category(), ErrorCategory::Document);
        assert_eq!(
            DalError::RecordNotFound(4).error_category(),
            ErrorCategory::Lookup
        );
        assert_eq!(
            DalError::InvalidIntField(0).error_category(),
            ErrorCategory::Conversion
        );
        assert_eq!(
            DalError::HttpTimeout("u".to_string()).error_category(),
            ErrorCategory::Transport
        );
        assert_eq!(
            DalError::MemAllocFail("rows".to_string()).error_category(),
            ErrorCategory::Fatal
        );
    }

    #[test]
    fn test_is_recoverable() {
        assert!(DalError::NoTable { index: 1 }.is_recoverable());
        assert!(DalError::PropertyNotFound("ra".to_string()).is_recoverable());
        assert!(!DalError::MemAllocFail("arena".to_string()).is_recoverable());
        assert!(!DalError::HostNoConnect("h".to_string()).is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DalError = io.into();
        match err {
            DalError::Io(msg) => assert!(msg.contains("gone")),
            _ => panic!("Expected Io"),
        }
    }

    #[test]
    fn test_error_slot_post_and_clear() {
        let mut slot = ErrorSlot::new();
        assert_eq!(slot.code(), DAL_OK);
        assert!(slot.message().is_none());

        slot.post(&DalError::NoData);
        assert_eq!(slot.code(), 128);
        assert_eq!(slot.message(), Some("TABLE has no DATA element"));

        slot.post(&DalError::NoTableData);
        assert_eq!(slot.code(), 129);

        slot.clear();
        assert_eq!(slot.code(), DAL_OK);
        assert!(slot.last().is_none());
    }
}
