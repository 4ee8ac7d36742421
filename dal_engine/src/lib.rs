pub mod collections;
pub mod config;
pub mod document;
pub mod engine;
mod error;
pub mod ffi;
pub mod handles;
pub mod observability;
pub mod plugins;
pub mod protocol;
pub mod transport;

pub use config::{AttributeLimits, BuildOptions, ClientConfig, RaggedRowPolicy};
pub use document::{Delimiter, DocumentCodec, Element, JsonDocumentCodec, VoNode};
pub use engine::{
    DalConnection, FieldEntry, Property, PropertyValue, PropertyWriter, Query, QueryParam, QueryResponse,
    Record, ResponseBuilder,
};
pub use error::{DalError, ErrorCategory, ErrorSlot, Result, StructuredError, DAL_ERROR, DAL_OK};
pub use handles::{QueryHandle, RecordHandle, ResponseHandle};
pub use plugins::{PluginRegistry, PropertyMapper};
pub use protocol::{AttrCode, EntryKind, ServiceType};
pub use transport::Transport;
