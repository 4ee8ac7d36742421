use std::fmt;

/// Element attribute selector, numbered as in the C ABI.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttrCode {
    Id = 1,
    Name = 2,
    Utype = 3,
    Ucd = 4,
    Unit = 5,
    Xtype = 6,
    Datatype = 7,
    Arraysize = 8,
    Width = 9,
    Precision = 10,
    Value = 11,
}

impl AttrCode {
    pub const ALL: [AttrCode; 11] = [
        AttrCode::Id,
        AttrCode::Name,
        AttrCode::Utype,
        AttrCode::Ucd,
        AttrCode::Unit,
        AttrCode::Xtype,
        AttrCode::Datatype,
        AttrCode::Arraysize,
        AttrCode::Width,
        AttrCode::Precision,
        AttrCode::Value,
    ];

    /// Attributes carrying a hash index over the Field list.
    pub const INDEXED: [AttrCode; 4] = [AttrCode::Id, AttrCode::Name, AttrCode::Utype, AttrCode::Ucd];

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.code() == code)
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Attribute name as spelled in the document.
    pub fn attribute_name(self) -> &'static str {
        match self {
            AttrCode::Id => "ID",
            AttrCode::Name => "name",
            AttrCode::Utype => "utype",
            AttrCode::Ucd => "ucd",
            AttrCode::Unit => "unit",
            AttrCode::Xtype => "xtype",
            AttrCode::Datatype => "datatype",
            AttrCode::Arraysize => "arraysize",
            AttrCode::Width => "width",
            AttrCode::Precision => "precision",
            AttrCode::Value => "value",
        }
    }

    pub fn is_indexed(self) -> bool {
        Self::INDEXED.contains(&self)
    }
}

impl fmt::Display for AttrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute_name())
    }
}

/// Which document element an entry was copied from.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Info = 1,
    Param = 2,
    Field = 3,
}

/// Service family, derived from the protocol name of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceType {
    Generic,
    Cone,
    Image,
    Spectrum,
}

impl ServiceType {
    pub fn from_protocol(protocol: &str) -> Self {
        let prefix = protocol.get(..3).unwrap_or("");
        if prefix.eq_ignore_ascii_case("scs") {
            ServiceType::Cone
        } else if prefix.eq_ignore_ascii_case("sia") {
            ServiceType::Image
        } else if prefix.eq_ignore_ascii_case("ssa") {
            ServiceType::Spectrum
        } else {
            ServiceType::Generic
        }
    }
}
