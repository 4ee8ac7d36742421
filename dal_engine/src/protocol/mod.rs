pub mod arena;
pub mod converter;
pub mod types;

pub use arena::{Span, StringArena};
pub use converter::{format_float_g15, parse_float, parse_int};
pub use types::{AttrCode, EntryKind, ServiceType};
