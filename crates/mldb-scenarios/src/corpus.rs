// crates/mldb-scenarios/src/corpus.rs
// ============================================================================
// Module: Example Corpus
// Description: Token vocabulary and seeded example generation.
// Purpose: Produce reproducible labeled rows for classifier training.
// Dependencies: mldb-client, rand
// ============================================================================

//! ## Overview
//! The vocabulary is a fixed English paragraph split on single spaces, so
//! punctuation stays attached to tokens (`"finale"` and `"finale."` are
//! distinct columns). Each example samples tokens uniformly with
//! replacement, records every sampled token as a column with value `1`, and
//! appends a `LABEL` column alternating `"true"` and `"false"`.

use mldb_client::Cell;
use mldb_client::CellTimestamp;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Source paragraph for the token vocabulary.
pub const RAW_TEXT: &str = "All Good Things... comprises the 25th and 26th episodes of the seventh \
season and the series finale of the syndicated American science fiction television series Star \
Trek: The Next Generation. It is the 177th and 178th episodes of the series overall. The title is \
derived from the expression All good things must come to an end, a phrase used by the character Q \
during the episode itself. The finale was written as a valentine to the show's fans, and is now \
generally regarded as one of the series' best episodes.";

/// Column holding the example label.
pub const LABEL_COLUMN: &str = "LABEL";

/// Returns the vocabulary in paragraph order, duplicates included.
#[must_use]
pub fn vocabulary() -> Vec<&'static str> {
    RAW_TEXT.split(' ').collect()
}

/// Returns the label of the example at `index`.
#[must_use]
pub const fn label_for(index: usize) -> &'static str {
    if index % 2 == 0 { "true" } else { "false" }
}

/// Returns the row name of the example at `index`.
#[must_use]
pub fn example_row_name(index: usize) -> String {
    format!("example-{index}")
}

/// Seeded generator of labeled example rows.
pub struct ExampleGenerator {
    /// Token source.
    vocabulary: Vec<&'static str>,
    /// Seeded RNG.
    rng: StdRng,
    /// Tokens sampled per row.
    tokens_per_row: usize,
    /// Timestamp stamped on every cell.
    timestamp: CellTimestamp,
}

impl ExampleGenerator {
    /// Creates a generator; identical seeds yield identical rows.
    #[must_use]
    pub fn new(seed: u64, tokens_per_row: usize, timestamp: CellTimestamp) -> Self {
        Self {
            vocabulary: vocabulary(),
            rng: StdRng::seed_from_u64(seed),
            tokens_per_row,
            timestamp,
        }
    }

    /// Samples `tokens_per_row` tokens with replacement.
    pub fn sample_tokens(&mut self) -> Vec<&'static str> {
        let len = self.vocabulary.len();
        (0..self.tokens_per_row).map(|_| self.vocabulary[self.rng.gen_range(0..len)]).collect()
    }

    /// Builds the cells of the example at `index`.
    pub fn example_cells(&mut self, index: usize) -> Vec<Cell> {
        let timestamp = self.timestamp;
        let mut cells: Vec<Cell> =
            self.sample_tokens().into_iter().map(|token| Cell::new(token, 1, timestamp)).collect();
        cells.push(Cell::new(LABEL_COLUMN, label_for(index), timestamp));
        cells
    }
}
