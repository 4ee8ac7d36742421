pub mod builder;
pub mod connection;
pub mod properties;
pub mod query;
pub mod record;
pub mod response;

pub use builder::ResponseBuilder;
pub use connection::DalConnection;
pub use properties::PropertyWriter;
pub use query::{Query, QueryParam};
pub use record::Record;
pub use response::{FieldEntry, Property, PropertyValue, QueryResponse};
