//! Enforcement of a stream's declared sortedness.

use std::fmt::Display;

use crate::error::SyncError;
use crate::stream::StreamDescriptor;

/// Tracks the highest replication value seen by a stream and rejects
/// anything that would move it backwards.
///
/// Seeded with the checkpoint the run resumed from, so a record older than
/// the persisted bookmark is caught as well. Equal values are accepted:
/// both streams re-fetch the boundary record of the previous page.
#[derive(Debug, Clone)]
pub struct SortednessGuard<C> {
    stream: String,
    replication_key: String,
    last: Option<C>,
}

impl<C: Ord + Clone + Display> SortednessGuard<C> {
    pub fn new(descriptor: &StreamDescriptor, start: Option<C>) -> Self {
        Self {
            stream: descriptor.name.to_string(),
            replication_key: descriptor.replication_key.to_string(),
            last: start,
        }
    }

    /// Highest value accepted so far.
    pub fn last(&self) -> Option<&C> {
        self.last.as_ref()
    }

    /// Validate a whole page without changing the guard.
    ///
    /// Returns the page's last value, which is what [`commit`](Self::commit)
    /// should receive once the page has been emitted. `None` for an empty page.
    pub fn check_page<'a, I>(&self, values: I) -> Result<Option<C>, SyncError>
    where
        I: IntoIterator<Item = &'a C>,
        C: 'a,
    {
        let mut previous = self.last.as_ref();
        for value in values {
            self.check(previous, value)?;
            previous = Some(value);
        }
        Ok(previous.filter(|p| Some(*p) != self.last.as_ref()).cloned())
    }

    /// Advance the high-water mark after a page was emitted.
    pub fn commit(&mut self, value: C) {
        if self.last.as_ref().map(|last| value > *last).unwrap_or(true) {
            self.last = Some(value);
        }
    }

    fn check(&self, previous: Option<&C>, value: &C) -> Result<(), SyncError> {
        match previous {
            Some(previous) if value < previous => Err(SyncError::OutOfOrder {
                stream: self.stream.clone(),
                replication_key: self.replication_key.clone(),
                previous: previous.to_string(),
                current: value.to_string(),
            }),
            _ => Ok(()),
        }
    }
}
