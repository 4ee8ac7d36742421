pub mod hash_index;
pub mod ordered_list;

pub use hash_index::{CaseInsensitiveIndex, CaseInsensitiveMultiIndex};
pub use ordered_list::{OrderedList, SeekFrom};
