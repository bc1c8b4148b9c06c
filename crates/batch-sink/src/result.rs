/// What happened to one event of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Staged and committed. `fallback` is set when at least one value had
    /// no registered codec and was passed through unconverted.
    Applied { fallback: bool },
    /// No declared field survived conversion
    Dropped,
    Failed(String),
}

/// Aggregate result of writing a batch to one table.
///
/// Counters follow the logical operation, not the physical statement: an
/// Update that a destination applies as an append still counts as modified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteListResult {
    pub inserted: u64,
    pub modified: u64,
    pub removed: u64,
    /// One entry per event, in batch order
    pub outcomes: Vec<EventOutcome>,
}

impl WriteListResult {
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, EventOutcome::Failed(_)))
            .count()
    }

    pub fn dropped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, EventOutcome::Dropped))
            .count()
    }

    pub fn fallbacks(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, EventOutcome::Applied { fallback: true }))
            .count()
    }

    pub fn merge(&mut self, other: WriteListResult) {
        self.inserted += other.inserted;
        self.modified += other.modified;
        self.removed += other.removed;
        self.outcomes.extend(other.outcomes);
    }
}

impl std::fmt::Display for WriteListResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "inserted={} modified={} removed={} dropped={} failed={}",
            self.inserted,
            self.modified,
            self.removed,
            self.dropped(),
            self.failed()
        )
    }
}
