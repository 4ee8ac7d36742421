//! Navigation over VOTable-shaped documents.
//!
//! The engine only needs ordered children, attribute lookup and element
//! text; [`VoNode`] is that contract. [`Element`] is the owned tree the
//! bundled codec produces.

pub mod codec;
pub mod element;

pub use codec::{DelimitedTable, Delimiter, DocumentCodec, JsonDocumentCodec};
pub use element::Element;

use crate::error::{DalError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Votable,
    Resource,
    Info,
    Table,
    Param,
    Field,
    Data,
    Tabledata,
    Tr,
    Td,
    Other,
}

impl Tag {
    pub fn from_name(name: &str) -> Self {
        const NAMES: [(&str, Tag); 10] = [
            ("VOTABLE", Tag::Votable),
            ("RESOURCE", Tag::Resource),
            ("INFO", Tag::Info),
            ("TABLE", Tag::Table),
            ("PARAM", Tag::Param),
            ("FIELD", Tag::Field),
            ("DATA", Tag::Data),
            ("TABLEDATA", Tag::Tabledata),
            ("TR", Tag::Tr),
            ("TD", Tag::Td),
        ];
        NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map_or(Tag::Other, |(_, tag)| *tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            Tag::Votable => "VOTABLE",
            Tag::Resource => "RESOURCE",
            Tag::Info => "INFO",
            Tag::Table => "TABLE",
            Tag::Param => "PARAM",
            Tag::Field => "FIELD",
            Tag::Data => "DATA",
            Tag::Tabledata => "TABLEDATA",
            Tag::Tr => "TR",
            Tag::Td => "TD",
            Tag::Other => "",
        }
    }
}

/// Read-only navigation over a parsed document node.
pub trait VoNode: Sized {
    fn tag(&self) -> Tag;

    /// Attribute value by name, matched case-insensitively.
    fn attr(&self, name: &str) -> Option<&str>;

    /// Element text content.
    fn value(&self) -> Option<&str>;

    fn children(&self) -> impl Iterator<Item = &Self>;

    fn children_tagged(&self, tag: Tag) -> impl Iterator<Item = &Self> {
        self.children().filter(move |c| c.tag() == tag)
    }

    fn first_child(&self, tag: Tag) -> Option<&Self> {
        self.children_tagged(tag).next()
    }
}

/// The elements a table build or export reads from.
pub struct SelectedTable<'a, N> {
    pub resource: &'a N,
    pub table: &'a N,
    pub tabledata: &'a N,
}

/// Selects RESOURCE `resource` and its TABLE `table`, failing on a
/// `QUERY_STATUS=ERROR` INFO or a missing DATA/TABLEDATA.
///
/// A root that is itself a RESOURCE is not searched; callers pass the
/// document element.
pub fn select_table<N: VoNode>(root: &N, resource: usize, table: usize) -> Result<SelectedTable<'_, N>> {
    let res = root
        .children_tagged(Tag::Resource)
        .nth(resource)
        .ok_or(DalError::NoResource { index: resource })?;

    // Services may emit QUERY_STATUS both before and after the table.
    if let Some(status) = res.children_tagged(Tag::Info).find(|info| {
        info.attr("name") == Some("QUERY_STATUS") && info.attr("value") == Some("ERROR")
    }) {
        let message = status
            .value()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        return Err(DalError::VoQueryError { message });
    }

    let tab = res
        .children_tagged(Tag::Table)
        .nth(table)
        .ok_or(DalError::NoTable { index: table })?;
    let data = tab.first_child(Tag::Data).ok_or(DalError::NoData)?;
    let tabledata = data
        .first_child(Tag::Tabledata)
        .ok_or(DalError::NoTableData)?;

    Ok(SelectedTable {
        resource: res,
        table: tab,
        tabledata,
    })
}
