use super::{select_table, Element, Tag, VoNode};
use crate::error::{DalError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Tab,
    Space,
}

impl Delimiter {
    pub fn as_char(self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::Tab => '\t',
            Delimiter::Space => ' ',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            ',' => Some(Delimiter::Comma),
            '\t' => Some(Delimiter::Tab),
            ' ' => Some(Delimiter::Space),
            _ => None,
        }
    }
}

/// Header plus rows of cell text, every row padded or cut to the header
/// width. Rendering with different delimiters yields the same shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DelimitedTable {
    /// Reads the FIELD names and TR/TD text of one table. Fields without
    /// a name fall back to their ID.
    pub fn from_document<N: VoNode>(root: &N, resource: usize, table: usize) -> Result<Self> {
        let selected = select_table(root, resource, table)?;
        let header: Vec<String> = selected
            .table
            .children_tagged(Tag::Field)
            .map(|f| f.attr("name").or_else(|| f.attr("ID")).unwrap_or("").to_string())
            .collect();

        let width = header.len();
        let rows = selected
            .tabledata
            .children_tagged(Tag::Tr)
            .map(|tr| {
                let mut cells: Vec<String> = tr
                    .children_tagged(Tag::Td)
                    .take(width)
                    .map(|td| td.value().unwrap_or("").to_string())
                    .collect();
                cells.resize(width, String::new());
                cells
            })
            .collect();

        Ok(Self { header, rows })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    /// One header line then one line per row, each terminated by `\n`.
    /// Cells containing the delimiter, a quote or a line break are quoted
    /// with embedded quotes doubled.
    pub fn render(&self, delimiter: Delimiter) -> String {
        let mut out = String::new();
        for line in std::iter::once(&self.header).chain(self.rows.iter()) {
            for (i, cell) in line.iter().enumerate() {
                if i > 0 {
                    out.push(delimiter.as_char());
                }
                push_cell(&mut out, cell, delimiter);
            }
            out.push('\n');
        }
        out
    }
}

fn push_cell(out: &mut String, cell: &str, delimiter: Delimiter) {
    let needs_quotes = cell.is_empty() && delimiter == Delimiter::Space
        || cell
            .chars()
            .any(|c| c == delimiter.as_char() || c == '"' || c == '\n' || c == '\r');
    if needs_quotes {
        out.push('"');
        out.push_str(&cell.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(cell);
    }
}

/// Turns fetched document text into a navigable tree, and into a
/// delimited table for export.
pub trait DocumentCodec: Send {
    fn name(&self) -> &str;

    fn parse(&self, text: &str) -> Result<Element>;

    /// Converts TABLE `table` of RESOURCE `resource`.
    fn to_table(&self, text: &str, resource: usize, table: usize) -> Result<DelimitedTable> {
        let root = self.parse(text)?;
        DelimitedTable::from_document(&root, resource, table)
    }
}

/// Reads the JSON form of [`Element`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDocumentCodec;

impl JsonDocumentCodec {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentCodec for JsonDocumentCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn parse(&self, text: &str) -> Result<Element> {
        serde_json::from_str(text).map_err(|e| DalError::DocumentParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Element {
        Element::new("VOTABLE").with_child(
            Element::new("RESOURCE").with_child(
                Element::new("TABLE")
                    .with_child(Element::new("FIELD").with_attr("name", "name"))
                    .with_child(Element::new("FIELD").with_attr("ID", "mag"))
                    .with_child(
                        Element::new("DATA").with_child(
                            Element::new("TABLEDATA")
                                .with_child(Element::tr(["M 31", "3.4"]))
                                .with_child(Element::tr(["a,\"b\""]))
                                .with_child(Element::tr(["x", "1", "extra"])),
                        ),
                    ),
            ),
        )
    }

    #[test]
    fn test_delimiter_chars() {
        assert_eq!(Delimiter::from_char('\t'), Some(Delimiter::Tab));
        assert_eq!(Delimiter::Comma.as_char(), ',');
        assert_eq!(Delimiter::from_char(';'), None);
    }

    #[test]
    fn test_from_document_normalizes_rows() {
        let table = DelimitedTable::from_document(&doc(), 0, 0).unwrap();
        assert_eq!(table.header(), &["name".to_string(), "mag".to_string()]);
        assert_eq!(table.row_count(), 3);
        assert!(table.rows().iter().all(|r| r.len() == 2));
        assert_eq!(table.rows()[1][1], "");
    }

    #[test]
    fn test_render_csv() {
        let table = DelimitedTable::from_document(&doc(), 0, 0).unwrap();
        let csv = table.render(Delimiter::Comma);
        assert_eq!(csv, "name,mag\nM 31,3.4\n\"a,\"\"b\"\"\",\nx,1\n");
    }

    #[test]
    fn test_render_ascii_quotes_spaces() {
        let table = DelimitedTable::from_document(&doc(), 0, 0).unwrap();
        let ascii = table.render(Delimiter::Space);
        assert_eq!(ascii.lines().nth(1), Some("\"M 31\" 3.4"));
        assert_eq!(ascii.lines().nth(2), Some("\"a,\"\"b\"\"\" \"\""));
    }

    #[test]
    fn test_json_codec_parse_error() {
        let codec = JsonDocumentCodec::new();
        match codec.parse("<VOTABLE/>") {
            Err(DalError::DocumentParse(_)) => (),
            _ => panic!("Expected DocumentParse"),
        }
    }

    #[test]
    fn test_json_codec_to_table() {
        let codec = JsonDocumentCodec::new();
        let text = serde_json::to_string(&doc()).unwrap();
        let table = codec.to_table(&text, 0, 0).unwrap();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 3);
    }
}
