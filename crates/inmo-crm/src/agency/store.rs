use std::sync::{Mutex, RwLock};

use super::records::AgencyRecords;

/// Transaction boundary around the agency records.
///
/// `write` runs a whole unit of work: either every change it makes is published,
/// or (on `Err`) none of them is.
pub trait AgencyStore: Send + Sync {
    fn read<T, F>(&self, query: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&AgencyRecords) -> T;

    fn write<T, E, F>(&self, unit_of_work: F) -> Result<T, E>
    where
        F: FnOnce(&mut AgencyRecords) -> Result<T, E>,
        E: From<RepositoryError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("constraint violated: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Records held in memory. Writes are staged on a copy and swapped in on success,
/// so readers only ever observe committed state and never wait on a unit of work,
/// only on the swap itself. Writers are serialized by `writer`.
#[derive(Default)]
pub struct InMemoryAgencyStore {
    committed: RwLock<AgencyRecords>,
    writer: Mutex<()>,
}

impl InMemoryAgencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: AgencyRecords) -> Self {
        Self {
            committed: RwLock::new(records),
            writer: Mutex::new(()),
        }
    }
}

impl AgencyStore for InMemoryAgencyStore {
    fn read<T, F>(&self, query: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&AgencyRecords) -> T,
    {
        let guard = self
            .committed
            .read()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))?;
        Ok(query(&*guard))
    }

    fn write<T, E, F>(&self, unit_of_work: F) -> Result<T, E>
    where
        F: FnOnce(&mut AgencyRecords) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| RepositoryError::Unavailable("writer lock poisoned".to_string()))?;
        let mut staged = self
            .committed
            .read()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))?
            .clone();
        let outcome = unit_of_work(&mut staged)?;
        *self
            .committed
            .write()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))? = staged;
        Ok(outcome)
    }
}
