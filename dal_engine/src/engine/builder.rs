use super::response::{FieldEntry, QueryResponse, RowData};
use crate::config::{BuildOptions, RaggedRowPolicy};
use crate::document::{select_table, Tag, VoNode};
use crate::error::{DalError, Result};
use crate::protocol::{AttrCode, EntryKind};
use log::{debug, warn};

/// Builds a [`QueryResponse`] from one table of a document.
///
/// The response is owned locally until every step has succeeded, so a
/// failure at any step drops everything allocated so far.
pub struct ResponseBuilder<'o> {
    options: &'o BuildOptions,
}

impl<'o> ResponseBuilder<'o> {
    pub fn new(options: &'o BuildOptions) -> Self {
        Self { options }
    }

    pub fn build<N: VoNode>(&self, root: &N, resource: usize, table: usize) -> Result<QueryResponse> {
        let selected = select_table(root, resource, table)?;

        let row_count = selected.tabledata.children_tagged(Tag::Tr).count();
        let column_count = selected.table.children_tagged(Tag::Field).count();
        let mut response =
            QueryResponse::with_shape(row_count, column_count, self.options.arena_chunk_size);
        response.selection = (resource, table);

        for info in selected.resource.children_tagged(Tag::Info) {
            let entry = self.copy_entry(info, EntryKind::Info, None, &mut response.truncated_attributes);
            response.push_info(entry);
        }
        for param in selected.table.children_tagged(Tag::Param) {
            let entry = self.copy_entry(param, EntryKind::Param, None, &mut response.truncated_attributes);
            response.push_field(entry);
        }
        for (column, field) in selected.table.children_tagged(Tag::Field).enumerate() {
            let entry = self.copy_entry(
                field,
                EntryKind::Field,
                Some(column),
                &mut response.truncated_attributes,
            );
            response.push_field(entry);
        }

        let mut rows = Vec::new();
        rows.try_reserve_exact(row_count).map_err(|e| {
            DalError::MemAllocFail(format!("record array of {} rows: {}", row_count, e))
        })?;

        for (row, tr) in selected.tabledata.children_tagged(Tag::Tr).enumerate() {
            let found = tr.children_tagged(Tag::Td).count();
            if found != column_count {
                match self.options.ragged_rows {
                    RaggedRowPolicy::Reject => {
                        return Err(DalError::RaggedRow {
                            row,
                            expected: column_count,
                            found,
                        })
                    }
                    RaggedRowPolicy::Pad => {
                        debug!("Row {} has {} cells, expected {}", row, found, column_count);
                        response.ragged_rows += 1;
                    }
                }
            }

            let mut cells = vec![None; column_count].into_boxed_slice();
            for (slot, td) in cells.iter_mut().zip(tr.children_tagged(Tag::Td)) {
                *slot = Some(response.arena.copy(td.value().unwrap_or(""))?);
            }
            rows.push(RowData {
                cells,
                props: Vec::new(),
            });
        }
        response.rows = rows;

        if response.ragged_rows > 0 {
            warn!(
                "{} of {} rows did not match {} columns; short rows null-padded, extra cells dropped",
                response.ragged_rows, row_count, column_count
            );
        }
        if response.truncated_attributes > 0 {
            warn!(
                "{} attribute values exceeded their length limit and were truncated",
                response.truncated_attributes
            );
        }
        debug!(
            "Built response: rows={} columns={} params={} infos={} arena_bytes={}",
            row_count,
            column_count,
            response.field_count() - column_count,
            response.info_count(),
            response.arena.bytes_used()
        );
        Ok(response)
    }

    fn copy_entry<N: VoNode>(
        &self,
        element: &N,
        kind: EntryKind,
        column: Option<usize>,
        truncated_count: &mut usize,
    ) -> FieldEntry {
        let limits = &self.options.attribute_limits;
        let mut truncated = false;
        let mut bounded = |attr: AttrCode| {
            let raw = element.attr(attr.attribute_name()).unwrap_or("");
            let (value, cut) = bounded_copy(raw, limits.limit_for(attr));
            if cut {
                truncated = true;
                *truncated_count += 1;
            }
            value
        };

        let attrs = [
            bounded(AttrCode::Id),
            bounded(AttrCode::Name),
            bounded(AttrCode::Utype),
            bounded(AttrCode::Ucd),
            bounded(AttrCode::Unit),
            bounded(AttrCode::Xtype),
            bounded(AttrCode::Datatype),
            bounded(AttrCode::Arraysize),
            bounded(AttrCode::Width),
            bounded(AttrCode::Precision),
        ];
        let value = match kind {
            EntryKind::Field => None,
            EntryKind::Info | EntryKind::Param => Some(bounded(AttrCode::Value)),
        };

        FieldEntry {
            kind,
            index: 0,
            column,
            attrs,
            value,
            truncated,
        }
    }
}

/// Copies at most `limit` bytes, backing off to a character boundary.
fn bounded_copy(value: &str, limit: usize) -> (String, bool) {
    if value.len() <= limit {
        return (value.to_string(), false);
    }
    let mut end = limit;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    (value[..end].to_string(), true)
}

impl QueryResponse {
    /// Builds from table `table` of RESOURCE `resource` with default options.
    pub fn from_document<N: VoNode>(root: &N, resource: usize, table: usize) -> Result<Self> {
        ResponseBuilder::new(&BuildOptions::default()).build(root, resource, table)
    }
}
