use super::record::Record;
use crate::collections::{CaseInsensitiveIndex, OrderedList, SeekFrom};
use crate::document::{DelimitedTable, Delimiter, DocumentCodec};
use crate::error::{DalError, Result};
use crate::protocol::{parse_float, parse_int, AttrCode, EntryKind, Span, StringArena};
use log::debug;

/// One INFO, PARAM or FIELD element as copied at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    pub(super) kind: EntryKind,
    pub(super) index: usize,
    pub(super) column: Option<usize>,
    /// id through precision, indexed by `AttrCode as usize - 1`.
    pub(super) attrs: [String; 10],
    pub(super) value: Option<String>,
    pub(super) truncated: bool,
}

impl FieldEntry {
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Position in the owning list.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Column number for FIELD entries.
    pub fn column(&self) -> Option<usize> {
        self.column
    }

    /// Attribute text; `Value` is only present on PARAM and INFO entries.
    pub fn attr(&self, attr: AttrCode) -> Option<&str> {
        match attr {
            AttrCode::Value => self.value.as_deref(),
            other => self.attrs.get(other as usize - 1).map(String::as_str),
        }
    }

    pub fn id(&self) -> &str {
        &self.attrs[0]
    }

    pub fn name(&self) -> &str {
        &self.attrs[1]
    }

    pub fn utype(&self) -> &str {
        &self.attrs[2]
    }

    pub fn ucd(&self) -> &str {
        &self.attrs[3]
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// True if any attribute was cut to its length limit.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// Same value for every record; `None` when the value is absent.
    Constant(Option<String>),
    /// Per-record slot at `column` in each record's property storage.
    PerRow { column: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub(super) name: String,
    pub(super) index: usize,
    pub(super) value: PropertyValue,
}

impl Property {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.value, PropertyValue::Constant(_))
    }
}

#[derive(Debug)]
pub(super) struct RowData {
    pub(super) cells: Box<[Option<Span>]>,
    pub(super) props: Vec<Option<Span>>,
}

#[derive(Debug)]
pub(super) enum SourceText {
    Absent,
    Document(String),
    Delimited(DelimitedTable),
    Released,
}

/// An immutable, indexed table built from one document table.
///
/// PARAM entries occupy the low positions of the Field list, FIELD
/// entries follow with column numbers `0..column_count()`. Every cell
/// string lives in one arena owned by the response.
#[derive(Debug)]
pub struct QueryResponse {
    pub(super) row_count: usize,
    pub(super) column_count: usize,
    pub(super) infos: OrderedList<FieldEntry>,
    pub(super) fields: OrderedList<FieldEntry>,
    pub(super) by_id: CaseInsensitiveIndex,
    pub(super) by_name: CaseInsensitiveIndex,
    pub(super) by_utype: CaseInsensitiveIndex,
    pub(super) by_ucd: CaseInsensitiveIndex,
    pub(super) properties: OrderedList<Property>,
    pub(super) by_property: CaseInsensitiveIndex,
    pub(super) per_row_properties: usize,
    pub(super) rows: Vec<RowData>,
    pub(super) arena: StringArena,
    pub(super) source: SourceText,
    pub(super) selection: (usize, usize),
    pub(super) truncated_attributes: usize,
    pub(super) ragged_rows: usize,
}

impl QueryResponse {
    pub(super) fn with_shape(row_count: usize, column_count: usize, arena_chunk_size: usize) -> Self {
        Self {
            row_count,
            column_count,
            infos: OrderedList::new(),
            fields: OrderedList::with_capacity(column_count),
            by_id: CaseInsensitiveIndex::with_capacity(column_count),
            by_name: CaseInsensitiveIndex::with_capacity(column_count),
            by_utype: CaseInsensitiveIndex::with_capacity(column_count),
            by_ucd: CaseInsensitiveIndex::with_capacity(column_count),
            properties: OrderedList::new(),
            by_property: CaseInsensitiveIndex::new(),
            per_row_properties: 0,
            rows: Vec::new(),
            arena: StringArena::new(arena_chunk_size),
            source: SourceText::Absent,
            selection: (0, 0),
            truncated_attributes: 0,
            ragged_rows: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        Self::with_shape(0, 0, 64)
    }

    pub(super) fn push_field(&mut self, mut entry: FieldEntry) -> usize {
        entry.index = self.fields.count();
        let position = entry.index;
        self.by_id.insert(entry.id(), position);
        self.by_name.insert(entry.name(), position);
        self.by_utype.insert(entry.utype(), position);
        self.by_ucd.insert(entry.ucd(), position);
        self.fields.append(entry)
    }

    pub(super) fn push_info(&mut self, mut entry: FieldEntry) -> usize {
        entry.index = self.infos.count();
        self.infos.append(entry)
    }

    /// Attaches the text the response was built from.
    pub(super) fn set_source(&mut self, text: String) {
        self.source = SourceText::Document(text);
    }

    /// RESOURCE and TABLE positions the response was built from.
    pub fn selection(&self) -> (usize, usize) {
        self.selection
    }

    pub fn record_count(&self) -> usize {
        self.row_count
    }

    /// Number of FIELD columns; PARAM entries are not columns.
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn info_count(&self) -> usize {
        self.infos.count()
    }

    /// PARAM plus FIELD entries.
    pub fn field_count(&self) -> usize {
        self.fields.count()
    }

    pub fn property_count(&self) -> usize {
        self.properties.count()
    }

    pub fn infos(&self) -> impl Iterator<Item = &FieldEntry> {
        self.infos.iter()
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldEntry> {
        self.fields.iter()
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    pub fn property_name(&self, index: usize) -> Result<&str> {
        self.properties
            .seek(SeekFrom::Start(index))
            .map(|p| p.name.as_str())
            .ok_or_else(|| DalError::PropertyNotFound(format!("#{}", index)))
    }

    pub fn info(&self, index: usize) -> Result<&FieldEntry> {
        self.infos
            .seek(SeekFrom::Start(index))
            .ok_or(DalError::InfoNotFound(index as i64))
    }

    pub fn info_attr(&self, index: usize, attr: AttrCode) -> Result<Option<&str>> {
        self.info(index).map(|entry| entry.attr(attr))
    }

    pub fn field(&self, index: usize) -> Result<&FieldEntry> {
        self.fields
            .seek(SeekFrom::Start(index))
            .ok_or(DalError::FieldAccess(index as i64))
    }

    pub fn field_attr(&self, index: usize, attr: AttrCode) -> Result<Option<&str>> {
        self.field(index).map(|entry| entry.attr(attr))
    }

    /// Position of the Field whose `attr` equals `key`, ignoring case.
    /// When several Fields share the key, the last one wins.
    pub fn field_index(&self, key: &str, attr: AttrCode) -> Result<usize> {
        let index = match attr {
            AttrCode::Id => &self.by_id,
            AttrCode::Name => &self.by_name,
            AttrCode::Utype => &self.by_utype,
            AttrCode::Ucd => &self.by_ucd,
            other => return Err(DalError::AttrNotFound(other.to_string())),
        };
        index.find(key).ok_or_else(|| DalError::FieldNotFound {
            key: key.to_string(),
            attr: attr.to_string(),
        })
    }

    pub fn property(&self, name: &str) -> Result<&Property> {
        self.by_property
            .find(name)
            .and_then(|position| self.properties.get(position))
            .ok_or_else(|| DalError::PropertyNotFound(name.to_string()))
    }

    pub fn record(&self, row: usize) -> Result<Record<'_>> {
        if row >= self.row_count {
            return Err(DalError::RecordNotFound(row as i64));
        }
        Ok(Record::new(self, row))
    }

    /// Iterates all records in row order.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        (0..self.row_count).map(move |row| Record::new(self, row))
    }

    /// Fills `out[..N]` with one column; returns N. A PARAM entry yields
    /// its constant for every row.
    pub fn int_column(&self, index: usize, out: &mut [i64]) -> Result<usize> {
        let field = self.column_field(index, out.len())?;
        for (row, slot) in out.iter_mut().take(self.row_count).enumerate() {
            *slot = self
                .field_value(row, field)
                .and_then(parse_int)
                .ok_or(DalError::InvalidIntField(index))?;
        }
        Ok(self.row_count)
    }

    pub fn float_column(&self, index: usize, out: &mut [f64]) -> Result<usize> {
        let field = self.column_field(index, out.len())?;
        for (row, slot) in out.iter_mut().take(self.row_count).enumerate() {
            *slot = self
                .field_value(row, field)
                .and_then(parse_float)
                .ok_or(DalError::InvalidFloatField(index))?;
        }
        Ok(self.row_count)
    }

    /// Null cells come back as `None`.
    pub fn string_column<'a>(&'a self, index: usize, out: &mut [Option<&'a str>]) -> Result<usize> {
        let field = self.column_field(index, out.len())?;
        for (row, slot) in out.iter_mut().take(self.row_count).enumerate() {
            *slot = self.field_value(row, field);
        }
        Ok(self.row_count)
    }

    fn column_field(&self, index: usize, capacity: usize) -> Result<&FieldEntry> {
        let field = self
            .fields
            .get(index)
            .ok_or(DalError::IndexOutOfBounds {
                index: index as i64,
                len: self.fields.count(),
            })?;
        if capacity < self.row_count {
            return Err(DalError::BufferTooSmall {
                needed: self.row_count,
                got: capacity,
            });
        }
        Ok(field)
    }

    pub(super) fn field_value<'a>(&'a self, row: usize, field: &'a FieldEntry) -> Option<&'a str> {
        match field.column {
            Some(column) => self
                .cell_span(row, column)
                .map(|span| self.arena.get(span)),
            None => field.value.as_deref(),
        }
    }

    pub(super) fn cell_span(&self, row: usize, column: usize) -> Option<Span> {
        self.rows
            .get(row)
            .and_then(|r| r.cells.get(column).copied().flatten())
    }

    pub(super) fn property_value<'a>(&'a self, row: usize, property: &'a Property) -> Option<&'a str> {
        match &property.value {
            PropertyValue::Constant(value) => value.as_deref(),
            PropertyValue::PerRow { column } => self
                .rows
                .get(row)
                .and_then(|r| r.props.get(*column).copied().flatten())
                .map(|span| self.arena.get(span)),
        }
    }

    /// Number of attributes cut to their length limit during the build.
    pub fn truncated_attribute_count(&self) -> usize {
        self.truncated_attributes
    }

    /// Number of rows whose cell count differed from the column count.
    pub fn ragged_row_count(&self) -> usize {
        self.ragged_rows
    }

    /// Original document text, while still held.
    pub fn source_text(&self) -> Option<&str> {
        match &self.source {
            SourceText::Document(text) => Some(text),
            _ => None,
        }
    }

    /// Frees the source text (or its delimited conversion).
    pub fn release_source(&mut self) {
        self.source = SourceText::Released;
    }

    /// Renders the selected table of the source as delimited text. The
    /// first call converts the document text into a table that replaces
    /// it; later calls re-render that table with whichever delimiter is
    /// asked for.
    pub fn export_delimited(&mut self, codec: &dyn DocumentCodec, delimiter: Delimiter) -> Result<String> {
        if let SourceText::Document(text) = &self.source {
            let (resource, table) = self.selection;
            let table = codec.to_table(text, resource, table)?;
            debug!(
                "Converted source text ({} bytes) to {}x{} delimited table",
                text.len(),
                table.row_count(),
                table.column_count()
            );
            self.source = SourceText::Delimited(table);
        }
        match &self.source {
            SourceText::Delimited(table) => Ok(table.render(delimiter)),
            _ => Err(DalError::SourceReleased),
        }
    }
}
