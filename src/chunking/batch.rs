use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ChunkingError, Segment};

/// Consecutive segments joined into one unit of downstream work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch(String);

impl Batch {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Batch {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Group segments into windows of `batch_size`, joined by a single space.
///
/// The last batch may hold fewer segments; no segments means no batches.
pub fn group(segments: &[Segment], batch_size: usize) -> Result<Vec<Batch>, ChunkingError> {
    if batch_size == 0 {
        return Err(ChunkingError::ZeroBatchSize);
    }

    Ok(segments
        .chunks(batch_size)
        .map(|window| {
            Batch(
                window
                    .iter()
                    .map(Segment::as_str)
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        })
        .collect())
}
