use std::fmt;

/// Block number of the per-file end-of-file sentinel.
///
/// No real block ever has a negative number; locking this pseudo-block
/// guards file-length reads and appends against phantom growth.
pub const END_OF_FILE: i64 = -1;

/// Identifies one fixed-size block of one file: `(file name, block number)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockId {
    file_name: String,
    number: i64,
}

impl BlockId {
    pub fn new(file_name: impl Into<String>, number: i64) -> Self {
        Self {
            file_name: file_name.into(),
            number,
        }
    }

    /// The end-of-file sentinel block for `file_name`.
    pub fn end_of_file(file_name: impl Into<String>) -> Self {
        Self::new(file_name, END_OF_FILE)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn number(&self) -> i64 {
        self.number
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[file {}, block {}]", self.file_name, self.number)
    }
}
