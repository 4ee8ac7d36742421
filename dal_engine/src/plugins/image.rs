use super::property_mapper::{FieldKey, PropertyMapper, PropertySet, PropertySpec};
use crate::protocol::ServiceType;

const DEFAULT_VERSION: &str = "1.0";

/// Simple Image Access. Version 1 services tag columns with `VOX:` UCDs,
/// version 2 services with ObsCore UTYPEs; both spellings are tried.
pub struct ImageMapper;

impl Default for ImageMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageMapper {
    pub fn new() -> Self {
        Self
    }
}

impl PropertyMapper for ImageMapper {
    fn name(&self) -> &str {
        "image"
    }

    fn service_type(&self) -> ServiceType {
        ServiceType::Image
    }

    fn property_set(&self, version: &str) -> PropertySet {
        let version = if version.is_empty() { DEFAULT_VERSION } else { version };
        let v2 = version.starts_with('2');

        let keyed = |v1: &[FieldKey], v2_keys: &[FieldKey]| -> Vec<FieldKey> {
            let (first, second) = if v2 { (v2_keys, v1) } else { (v1, v2_keys) };
            first.iter().chain(second).copied().collect()
        };
        let spec = |name, v1: &[FieldKey], v2_keys: &[FieldKey]| PropertySpec {
            name,
            candidates: keyed(v1, v2_keys),
        };

        PropertySet {
            constants: vec![
                ("protocol".to_string(), "sia".to_string()),
                ("version".to_string(), version.to_string()),
            ],
            per_row: vec![
                spec(
                    "title",
                    &[FieldKey::ucd("VOX:Image_Title")],
                    &[FieldKey::utype("obscore:DataID.Title")],
                ),
                spec(
                    "ra",
                    &[FieldKey::ucd("POS_EQ_RA_MAIN"), FieldKey::ucd("pos.eq.ra;meta.main")],
                    &[FieldKey::utype(
                        "obscore:Char.SpatialAxis.Coverage.Location.Coord.Position2D.Value2.C1",
                    )],
                ),
                spec(
                    "dec",
                    &[FieldKey::ucd("POS_EQ_DEC_MAIN"), FieldKey::ucd("pos.eq.dec;meta.main")],
                    &[FieldKey::utype(
                        "obscore:Char.SpatialAxis.Coverage.Location.Coord.Position2D.Value2.C2",
                    )],
                ),
                spec("naxes", &[FieldKey::ucd("VOX:Image_Naxes")], &[]),
                spec("naxis", &[FieldKey::ucd("VOX:Image_Naxis")], &[]),
                spec("scale", &[FieldKey::ucd("VOX:Image_Scale")], &[]),
                spec(
                    "format",
                    &[FieldKey::ucd("VOX:Image_Format")],
                    &[FieldKey::utype("obscore:Access.Format")],
                ),
                spec(
                    "acref",
                    &[FieldKey::ucd("VOX:Image_AccessReference")],
                    &[FieldKey::utype("obscore:Access.Reference")],
                ),
                spec(
                    "estsize",
                    &[FieldKey::ucd("VOX:Image_FileSize")],
                    &[FieldKey::utype("obscore:Access.Size")],
                ),
            ],
        }
    }
}
