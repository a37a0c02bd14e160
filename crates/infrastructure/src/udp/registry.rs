use lru::LruCache;

use super::request::{Request, RequestId, RequestState};

/// Bounded, insertion-ordered collection of in-flight requests.
///
/// Backed by an unbounded `LruCache` that is only ever read through `peek`
/// and `push`, so entry order stays insertion order: the least recently used
/// entry is always the oldest request. The capacity is enforced by the relay,
/// which evicts through its own teardown path before admitting.
pub struct RequestRegistry {
    entries: LruCache<RequestId, Request>,
    capacity: usize,
    next_id: u64,
}

impl RequestRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            capacity,
            next_id: 0,
        }
    }

    /// Appends `request` at the tail and returns its handle.
    ///
    /// The caller makes room first; admitting while full is allowed but
    /// breaks the capacity bound.
    pub fn admit(&mut self, mut request: Request) -> RequestId {
        self.next_id += 1;
        let id = RequestId(self.next_id);
        request.set_state(RequestState::InRegistry);
        self.entries.push(id, request);
        id
    }

    pub fn oldest(&self) -> Option<(RequestId, &Request)> {
        self.entries.peek_lru().map(|(id, request)| (*id, request))
    }

    pub fn oldest_id(&self) -> Option<RequestId> {
        self.entries.peek_lru().map(|(id, _)| *id)
    }

    pub fn get(&self, id: RequestId) -> Option<&Request> {
        self.entries.peek(&id)
    }

    pub(crate) fn get_mut(&mut self, id: RequestId) -> Option<&mut Request> {
        self.entries.peek_mut(&id)
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.entries.contains(&id)
    }

    pub(crate) fn remove(&mut self, id: RequestId) -> Option<Request> {
        self.entries.pop(&id)
    }

    /// Request handles, oldest first.
    pub fn ids(&self) -> Vec<RequestId> {
        self.entries.iter().rev().map(|(id, _)| *id).collect()
    }

    pub fn live(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
