//! The eight lookup tables and their join tables.

use crate::{PtmError, Result};

/// A deduplicated named value referenced by models through a join table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LookupTable {
    Architecture,
    Author,
    Framework,
    Language,
    Library,
    License,
    Paper,
    Tag,
}

impl LookupTable {
    pub const ALL: [LookupTable; 8] = [
        LookupTable::Architecture,
        LookupTable::Author,
        LookupTable::Framework,
        LookupTable::Language,
        LookupTable::Library,
        LookupTable::License,
        LookupTable::Paper,
        LookupTable::Tag,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            LookupTable::Architecture => "architecture",
            LookupTable::Author => "author",
            LookupTable::Framework => "framework",
            LookupTable::Language => "language",
            LookupTable::Library => "library",
            LookupTable::License => "license",
            LookupTable::Paper => "paper",
            LookupTable::Tag => "tag",
        }
    }

    /// `model_to_<table>`
    pub fn join_table(&self) -> &'static str {
        match self {
            LookupTable::Architecture => "model_to_architecture",
            LookupTable::Author => "model_to_author",
            LookupTable::Framework => "model_to_framework",
            LookupTable::Language => "model_to_language",
            LookupTable::Library => "model_to_library",
            LookupTable::License => "model_to_license",
            LookupTable::Paper => "model_to_paper",
            LookupTable::Tag => "model_to_tag",
        }
    }

    /// Foreign key column of the join table (`<table>_id`).
    pub fn join_column(&self) -> &'static str {
        match self {
            LookupTable::Architecture => "architecture_id",
            LookupTable::Author => "author_id",
            LookupTable::Framework => "framework_id",
            LookupTable::Language => "language_id",
            LookupTable::Library => "library_id",
            LookupTable::License => "license_id",
            LookupTable::Paper => "paper_id",
            LookupTable::Tag => "tag_id",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.table_name() == name)
    }

    /// Resolve a table name; an unknown name is a structural error.
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_name(name).ok_or_else(|| PtmError::UnknownTable(name.to_string()))
    }
}

impl std::fmt::Display for LookupTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}
