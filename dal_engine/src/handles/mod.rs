use crate::engine::{Query, QueryResponse};
use crate::error::{DalError, Result};

const SLOT_BITS: u32 = 20;
const SLOT_MASK: u32 = (1 << SLOT_BITS) - 1;
const GENERATION_MASK: u32 = (1 << (31 - SLOT_BITS)) - 1;
const MAX_SLOTS: usize = (SLOT_MASK - 1) as usize;

/// Slot index plus generation counter. Packs into a positive `i32` so it
/// can cross the C ABI; zero and negative values never decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    slot: u32,
    generation: u32,
}

impl Handle {
    pub fn to_raw(self) -> i32 {
        (((self.generation & GENERATION_MASK) << SLOT_BITS) | (self.slot + 1)) as i32
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        if raw <= 0 {
            return None;
        }
        let raw = raw as u32;
        let slot = raw & SLOT_MASK;
        if slot == 0 {
            return None;
        }
        Some(Self {
            slot: slot - 1,
            generation: raw >> SLOT_BITS,
        })
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Handle);

        impl $name {
            pub fn raw(self) -> i32 {
                self.0.to_raw()
            }

            pub fn from_raw(raw: i32) -> Option<Self> {
                Handle::from_raw(raw).map(Self)
            }

            fn resolve(raw: i32) -> Result<Self> {
                Self::from_raw(raw).ok_or(DalError::BadHandle(raw))
            }
        }
    };
}

typed_handle!(
    /// Handle to a [`Query`] within one connection.
    QueryHandle
);
typed_handle!(
    /// Handle to a built [`QueryResponse`] within one connection.
    ResponseHandle
);
typed_handle!(
    /// Handle to a record view (response + row) within one connection.
    RecordHandle
);
typed_handle!(
    /// Handle to a connection in the process-wide C ABI table.
    ConnectionHandle
);

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generation-checked slot map. Releasing a handle bumps the slot's
/// generation, so stale copies of the handle fail with `BadHandle`.
pub struct HandleRegistry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> Result<Handle> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                if self.slots.len() >= MAX_SLOTS {
                    return Err(DalError::MemAllocFail("handle space exhausted".to_string()));
                }
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let entry = &mut self.slots[slot as usize];
        entry.value = Some(value);
        self.live += 1;
        Ok(Handle {
            slot,
            generation: entry.generation,
        })
    }

    pub fn get(&self, handle: Handle) -> Result<&T> {
        self.slots
            .get(handle.slot as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_ref())
            .ok_or(DalError::BadHandle(handle.to_raw()))
    }

    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut T> {
        self.slots
            .get_mut(handle.slot as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_mut())
            .ok_or(DalError::BadHandle(handle.to_raw()))
    }

    pub fn remove(&mut self, handle: Handle) -> Result<T> {
        let entry = self
            .slots
            .get_mut(handle.slot as usize)
            .filter(|s| s.generation == handle.generation)
            .ok_or(DalError::BadHandle(handle.to_raw()))?;
        let value = entry
            .value
            .take()
            .ok_or(DalError::BadHandle(handle.to_raw()))?;
        entry.generation = (entry.generation + 1) & GENERATION_MASK;
        self.free.push(handle.slot);
        self.live -= 1;
        Ok(value)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_ok()
    }

    /// Releases every entry for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        for (index, entry) in self.slots.iter_mut().enumerate() {
            if entry.value.as_ref().is_some_and(|v| !keep(v)) {
                entry.value = None;
                entry.generation = (entry.generation + 1) & GENERATION_MASK;
                self.free.push(index as u32);
                self.live -= 1;
            }
        }
    }

    pub fn clear(&mut self) {
        self.retain(|_| false);
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A record view: which response, which row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRef {
    pub response: ResponseHandle,
    pub row: usize,
}

/// Connection-scoped handle space for queries, responses and record views.
#[derive(Default)]
pub struct HandleContext {
    queries: HandleRegistry<Query>,
    responses: HandleRegistry<QueryResponse>,
    records: HandleRegistry<RecordRef>,
}

impl HandleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_query(&mut self, query: Query) -> Result<QueryHandle> {
        self.queries.insert(query).map(QueryHandle)
    }

    pub fn get_query(&self, handle: QueryHandle) -> Result<&Query> {
        self.queries.get(handle.0)
    }

    pub fn get_query_mut(&mut self, handle: QueryHandle) -> Result<&mut Query> {
        self.queries.get_mut(handle.0)
    }

    pub fn remove_query(&mut self, handle: QueryHandle) -> Result<Query> {
        self.queries.remove(handle.0)
    }

    pub fn create_response(&mut self, response: QueryResponse) -> Result<ResponseHandle> {
        self.responses.insert(response).map(ResponseHandle)
    }

    pub fn get_response(&self, handle: ResponseHandle) -> Result<&QueryResponse> {
        self.responses.get(handle.0)
    }

    pub fn get_response_mut(&mut self, handle: ResponseHandle) -> Result<&mut QueryResponse> {
        self.responses.get_mut(handle.0)
    }

    /// Releases a response and every record view that references it.
    pub fn remove_response(&mut self, handle: ResponseHandle) -> Result<QueryResponse> {
        let response = self.responses.remove(handle.0)?;
        self.records.retain(|r| r.response != handle);
        Ok(response)
    }

    pub fn create_record(&mut self, record: RecordRef) -> Result<RecordHandle> {
        self.records.insert(record).map(RecordHandle)
    }

    pub fn get_record(&self, handle: RecordHandle) -> Result<RecordRef> {
        self.records.get(handle.0).copied()
    }

    pub fn remove_record(&mut self, handle: RecordHandle) -> Result<()> {
        self.records.remove(handle.0)?;
        Ok(())
    }

    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.responses.clear();
        self.queries.clear();
    }
}

impl QueryHandle {
    pub(crate) fn checked(raw: i32) -> Result<Self> {
        Self::resolve(raw)
    }
}

impl ResponseHandle {
    pub(crate) fn checked(raw: i32) -> Result<Self> {
        Self::resolve(raw)
    }
}

impl RecordHandle {
    pub(crate) fn checked(raw: i32) -> Result<Self> {
        Self::resolve(raw)
    }
}

impl ConnectionHandle {
    pub(crate) fn checked(raw: i32) -> Result<Self> {
        Self::resolve(raw)
    }

    pub(crate) fn new(handle: Handle) -> Self {
        Self(handle)
    }

    pub(crate) fn handle(self) -> Handle {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_raw_is_positive() {
        let mut registry = HandleRegistry::new();
        let handle = registry.insert("a").unwrap();
        assert!(handle.to_raw() > 0);
        assert_eq!(Handle::from_raw(handle.to_raw()), Some(handle));
    }

    #[test]
    fn test_handle_from_raw_rejects_non_positive() {
        assert!(Handle::from_raw(0).is_none());
        assert!(Handle::from_raw(-1).is_none());
        assert!(Handle::from_raw(crate::error::DAL_ERROR).is_none());
        // generation bits set but slot bits zero
        assert!(Handle::from_raw(1 << SLOT_BITS).is_none());
    }

    #[test]
    fn test_registry_insert_get_remove() {
        let mut registry = HandleRegistry::new();
        let a = registry.insert(10).unwrap();
        let b = registry.insert(20).unwrap();
        assert_ne!(a, b);
        assert_eq!(*registry.get(a).unwrap(), 10);
        assert_eq!(*registry.get(b).unwrap(), 20);
        assert_eq!(registry.len(), 2);

        *registry.get_mut(a).unwrap() = 11;
        assert_eq!(registry.remove(a).unwrap(), 11);
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(a));
    }

    #[test]
    fn test_registry_stale_handle_after_reuse() {
        let mut registry = HandleRegistry::new();
        let a = registry.insert("first").unwrap();
        registry.remove(a).unwrap();
        let b = registry.insert("second").unwrap();

        // slot reused with a new generation
        assert_ne!(a.to_raw(), b.to_raw());
        match registry.get(a) {
            Err(DalError::BadHandle(raw)) => assert_eq!(raw, a.to_raw()),
            _ => panic!("Expected BadHandle"),
        }
        assert_eq!(*registry.get(b).unwrap(), "second");
    }

    #[test]
    fn test_registry_double_remove() {
        let mut registry = HandleRegistry::new();
        let a = registry.insert(1u8).unwrap();
        registry.remove(a).unwrap();
        assert!(matches!(registry.remove(a), Err(DalError::BadHandle(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_retain() {
        let mut registry = HandleRegistry::new();
        let handles: Vec<_> = (0..5).map(|i| registry.insert(i).unwrap()).collect();
        registry.retain(|v| v % 2 == 0);
        assert_eq!(registry.len(), 3);
        assert!(registry.contains(handles[0]));
        assert!(!registry.contains(handles[1]));
        assert!(registry.contains(handles[4]));
    }

    #[test]
    fn test_context_remove_response_drops_records() {
        let mut ctx = HandleContext::new();
        let qr = ctx.create_response(QueryResponse::empty()).unwrap();
        let other = ctx.create_response(QueryResponse::empty()).unwrap();
        let rec = ctx
            .create_record(RecordRef {
                response: qr,
                row: 0,
            })
            .unwrap();
        let kept = ctx
            .create_record(RecordRef {
                response: other,
                row: 0,
            })
            .unwrap();

        ctx.remove_response(qr).unwrap();
        assert!(matches!(ctx.get_record(rec), Err(DalError::BadHandle(_))));
        assert!(ctx.get_record(kept).is_ok());
        assert_eq!(ctx.response_count(), 1);
    }

    #[test]
    fn test_context_clear() {
        let mut ctx = HandleContext::new();
        let q = ctx.create_query(Query::new()).unwrap();
        ctx.clear();
        assert!(ctx.get_query(q).is_err());
        assert_eq!(ctx.query_count(), 0);
    }

    #[test]
    fn test_typed_handle_checked() {
        assert!(matches!(
            QueryHandle::checked(-5),
            Err(DalError::BadHandle(-5))
        ));
        assert!(RecordHandle::checked(1).is_ok());
    }
}
