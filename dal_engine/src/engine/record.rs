use super::response::QueryResponse;
use crate::error::{DalError, Result};
use crate::protocol::{parse_float, parse_int};

/// Read-only view of one row. Borrowed from its response, so it can
/// never outlive the storage it reads.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    response: &'a QueryResponse,
    row: usize,
}

impl<'a> Record<'a> {
    pub(super) fn new(response: &'a QueryResponse, row: usize) -> Self {
        Self { response, row }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn response(&self) -> &'a QueryResponse {
        self.response
    }

    /// `None` when the property has no value for this record.
    pub fn string_property(&self, name: &str) -> Result<Option<&'a str>> {
        let property = self.response.property(name)?;
        Ok(self.response.property_value(self.row, property))
    }

    pub fn int_property(&self, name: &str) -> Result<i64> {
        self.string_property(name)?
            .and_then(parse_int)
            .ok_or_else(|| DalError::InvalidIntProperty(name.to_string()))
    }

    pub fn float_property(&self, name: &str) -> Result<f64> {
        self.string_property(name)?
            .and_then(parse_float)
            .ok_or_else(|| DalError::InvalidFloatProperty(name.to_string()))
    }

    /// Value of Field `index`: the PARAM constant or this row's cell.
    pub fn string_field(&self, index: usize) -> Result<Option<&'a str>> {
        let field = self
            .response
            .fields
            .get(index)
            .ok_or(DalError::IndexOutOfBounds {
                index: index as i64,
                len: self.response.field_count(),
            })?;
        Ok(self.response.field_value(self.row, field))
    }

    pub fn int_field(&self, index: usize) -> Result<i64> {
        self.string_field(index)?
            .and_then(parse_int)
            .ok_or(DalError::InvalidIntField(index))
    }

    pub fn float_field(&self, index: usize) -> Result<f64> {
        self.string_field(index)?
            .and_then(parse_float)
            .ok_or(DalError::InvalidFloatField(index))
    }
}
