use super::response::{Property, PropertyValue, QueryResponse};
use crate::error::{DalError, Result};
use crate::protocol::Span;

/// Write access to the Property layer of a freshly built response.
///
/// Only the engine hands these out, once per response, to the protocol
/// mapper; afterwards the response is read-only.
pub struct PropertyWriter<'a> {
    response: &'a mut QueryResponse,
}

impl<'a> PropertyWriter<'a> {
    pub(crate) fn new(response: &'a mut QueryResponse) -> Self {
        Self { response }
    }

    pub fn response(&self) -> &QueryResponse {
        self.response
    }

    /// Registers a constant property, or replaces the definition of an
    /// existing one. Returns the property's index.
    ///
    /// An existing per-record property keeps its column and gets `value`
    /// in every record, so per-record columns stay contiguous.
    pub fn add_constant(&mut self, name: &str, value: &str) -> Result<usize> {
        if let Ok(property) = self.response.property(name) {
            if let PropertyValue::PerRow { column } = property.value {
                let index = property.index;
                let span = self.response.arena.copy(value)?;
                for row in 0..self.response.row_count {
                    self.store(row, column, Some(span));
                }
                return Ok(index);
            }
        }
        Ok(self.define(name, PropertyValue::Constant(Some(value.to_string()))))
    }

    /// Registers a per-record property and returns its column. An existing
    /// per-record property keeps its column.
    pub fn add_per_row(&mut self, name: &str) -> usize {
        if let Ok(PropertyValue::PerRow { column }) = self.response.property(name).map(Property::value) {
            return *column;
        }
        let column = self.response.per_row_properties;
        self.response.per_row_properties += 1;
        self.define(name, PropertyValue::PerRow { column });
        column
    }

    fn define(&mut self, name: &str, value: PropertyValue) -> usize {
        let response = &mut *self.response;
        if let Some(position) = response.by_property.find(name) {
            if let Some(existing) = response.properties.get_mut(position) {
                existing.value = value;
                return position;
            }
        }
        let index = response.properties.count();
        response.by_property.insert(name, index);
        response.properties.append(Property {
            name: name.to_string(),
            index,
            value,
        })
    }

    /// Sets one record's value. For a constant property this replaces the
    /// constant; `None` leaves it absent.
    pub fn set_value(&mut self, row: usize, name: &str, value: Option<&str>) -> Result<()> {
        if row >= self.response.row_count {
            return Err(DalError::RecordNotFound(row as i64));
        }
        let property = self.response.property(name)?.value().clone();
        match property {
            PropertyValue::Constant(_) => {
                self.define(name, PropertyValue::Constant(value.map(str::to_string)));
            }
            PropertyValue::PerRow { column } => {
                let span = value.map(|v| self.response.arena.copy(v)).transpose()?;
                self.store(row, column, span);
            }
        }
        Ok(())
    }

    /// Fills a per-record property from Field `field` for every record.
    /// FIELD cells are shared with the property rather than copied;
    /// `None` leaves the property absent on every record.
    pub fn copy_field(&mut self, name: &str, field: Option<usize>) -> Result<()> {
        let column = match self.response.property(name)?.value() {
            PropertyValue::PerRow { column } => *column,
            PropertyValue::Constant(_) => return Err(DalError::PropertyNotFound(name.to_string())),
        };
        let Some(field) = field else {
            for row in 0..self.response.row_count {
                self.store(row, column, None);
            }
            return Ok(());
        };

        let entry = self.response.field(field)?;
        match (entry.column(), entry.value().map(str::to_string)) {
            (Some(cell_column), _) => {
                for row in 0..self.response.row_count {
                    let span = self.response.cell_span(row, cell_column);
                    self.store(row, column, span);
                }
            }
            (None, constant) => {
                let span = constant
                    .as_deref()
                    .map(|v| self.response.arena.copy(v))
                    .transpose()?;
                for row in 0..self.response.row_count {
                    self.store(row, column, span);
                }
            }
        }
        Ok(())
    }

    fn store(&mut self, row: usize, column: usize, span: Option<Span>) {
        let width = self.response.per_row_properties;
        if let Some(record) = self.response.rows.get_mut(row) {
            if record.props.len() < width {
                record.props.resize(width, None);
            }
            record.props[column] = span;
        }
    }
}
