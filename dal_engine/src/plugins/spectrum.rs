use super::property_mapper::{FieldKey, PropertyMapper, PropertySet, PropertySpec};
use crate::protocol::ServiceType;

const DEFAULT_VERSION: &str = "1.1";

/// Simple Spectral Access: SSA data-model UTYPEs first, then the UCDs
/// pre-1.0 services used.
pub struct SpectrumMapper;

impl Default for SpectrumMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumMapper {
    pub fn new() -> Self {
        Self
    }
}

impl PropertyMapper for SpectrumMapper {
    fn name(&self) -> &str {
        "spectrum"
    }

    fn service_type(&self) -> ServiceType {
        ServiceType::Spectrum
    }

    fn property_set(&self, version: &str) -> PropertySet {
        let version = if version.is_empty() { DEFAULT_VERSION } else { version };
        PropertySet {
            constants: vec![
                ("protocol".to_string(), "ssa".to_string()),
                ("version".to_string(), version.to_string()),
            ],
            per_row: vec![
                PropertySpec::new(
                    "title",
                    &[FieldKey::utype("ssa:DataID.Title"), FieldKey::ucd("VOX:Title")],
                ),
                PropertySpec::new(
                    "pos",
                    &[
                        FieldKey::utype("ssa:Char.SpatialAxis.Coverage.Location.Value"),
                        FieldKey::ucd("pos.eq;meta.main"),
                    ],
                ),
                PropertySpec::new(
                    "format",
                    &[FieldKey::utype("ssa:Access.Format"), FieldKey::ucd("VOX:Format")],
                ),
                PropertySpec::new(
                    "acref",
                    &[
                        FieldKey::utype("ssa:Access.Reference"),
                        FieldKey::ucd("DATA_LINK"),
                        FieldKey::ucd("meta.ref.url"),
                    ],
                ),
                PropertySpec::new(
                    "estsize",
                    &[FieldKey::utype("ssa:Access.Size"), FieldKey::ucd("VOX:FileSize")],
                ),
            ],
        }
    }
}
