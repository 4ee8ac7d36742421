use super::property_mapper::{FieldKey, PropertyMapper, PropertySet, PropertySpec};
use crate::protocol::ServiceType;

const DEFAULT_VERSION: &str = "1.0";

/// Simple Cone Search: `id`, `ra`, `dec` per record.
pub struct ConeMapper;

impl Default for ConeMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl ConeMapper {
    pub fn new() -> Self {
        Self
    }
}

impl PropertyMapper for ConeMapper {
    fn name(&self) -> &str {
        "cone"
    }

    fn service_type(&self) -> ServiceType {
        ServiceType::Cone
    }

    fn property_set(&self, version: &str) -> PropertySet {
        let version = if version.is_empty() { DEFAULT_VERSION } else { version };
        PropertySet {
            constants: vec![
                ("protocol".to_string(), "scs".to_string()),
                ("version".to_string(), version.to_string()),
            ],
            per_row: vec![
                PropertySpec::new("id", &[FieldKey::ucd("ID_MAIN"), FieldKey::ucd("meta.id;meta.main")]),
                PropertySpec::new(
                    "ra",
                    &[FieldKey::ucd("POS_EQ_RA_MAIN"), FieldKey::ucd("pos.eq.ra;meta.main")],
                ),
                PropertySpec::new(
                    "dec",
                    &[FieldKey::ucd("POS_EQ_DEC_MAIN"), FieldKey::ucd("pos.eq.dec;meta.main")],
                ),
            ],
        }
    }
}
