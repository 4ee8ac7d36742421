use crate::engine::PropertyWriter;
use crate::error::Result;
use crate::protocol::{AttrCode, ServiceType};
use log::debug;

/// Attribute and value identifying a Field, e.g. UCD `POS_EQ_RA_MAIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldKey {
    pub attr: AttrCode,
    pub key: &'static str,
}

impl FieldKey {
    pub const fn ucd(key: &'static str) -> Self {
        Self {
            attr: AttrCode::Ucd,
            key,
        }
    }

    pub const fn utype(key: &'static str) -> Self {
        Self {
            attr: AttrCode::Utype,
            key,
        }
    }
}

/// A per-record property and the Fields that may carry it, tried in
/// order. Listing several keys covers UCD1/UCD1+ and UTYPE spellings used
/// by different service versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub candidates: Vec<FieldKey>,
}

impl PropertySpec {
    pub fn new(name: &'static str, candidates: &[FieldKey]) -> Self {
        Self {
            name,
            candidates: candidates.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySet {
    pub constants: Vec<(String, String)>,
    pub per_row: Vec<PropertySpec>,
}

/// Populates the Property layer of a response for one service family.
pub trait PropertyMapper: Send + Sync {
    fn name(&self) -> &str;

    fn service_type(&self) -> ServiceType;

    /// Properties registered for a service speaking `version`.
    fn property_set(&self, version: &str) -> PropertySet;

    /// Runs once per built response.
    fn init_properties(&self, writer: &mut PropertyWriter<'_>, version: &str) -> Result<()> {
        apply_property_set(writer, &self.property_set(version))
    }
}

/// Registers every property of `set`, resolves each per-record property to
/// its first matching Field and copies that Field into every record. An
/// unresolved property stays absent on every record.
pub fn apply_property_set(writer: &mut PropertyWriter<'_>, set: &PropertySet) -> Result<()> {
    for (name, value) in &set.constants {
        writer.add_constant(name, value)?;
    }
    for spec in &set.per_row {
        writer.add_per_row(spec.name);
    }
    for spec in &set.per_row {
        let field = spec
            .candidates
            .iter()
            .find_map(|c| writer.response().field_index(c.key, c.attr).ok());
        match field {
            Some(index) => debug!("Property '{}' mapped to field {}", spec.name, index),
            None => debug!("Property '{}' has no matching field", spec.name),
        }
        writer.copy_field(spec.name, field)?;
    }
    Ok(())
}
