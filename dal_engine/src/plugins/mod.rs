pub mod cone;
pub mod image;
pub mod property_mapper;
pub mod registry;
pub mod spectrum;

pub use cone::ConeMapper;
pub use image::ImageMapper;
pub use property_mapper::{apply_property_set, FieldKey, PropertyMapper, PropertySet, PropertySpec};
pub use registry::PluginRegistry;
pub use spectrum::SpectrumMapper;
