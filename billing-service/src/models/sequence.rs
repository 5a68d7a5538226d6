//! Document numbering sequences.

/// The two yearly-scoped counters backing human-readable document numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    Invoice,
    Receipt,
}

impl SequenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceKind::Invoice => "invoice",
            SequenceKind::Receipt => "receipt",
        }
    }

    /// Prefix of the formatted number. Persisted format is bit-exact:
    /// `PP-{year}-{seq:06}` for invoices, `RCT-{year}-{seq:06}` for receipts.
    pub fn prefix(&self) -> &'static str {
        match self {
            SequenceKind::Invoice => "PP",
            SequenceKind::Receipt => "RCT",
        }
    }
}
