//! Scoped multi-step resource ledger
//!
//! A stack of `(resource, releaser)` pairs for sequences where each step
//! acquires something and any later step may fail. Push right after a
//! resource is acquired; on any early exit the ledger releases what is
//! still held, newest first.
//!
//! A resource can leave the ledger two ways: [`Ledger::release`] runs its
//! releaser now, [`Ledger::commit`] hands it back to the caller untouched
//! (ownership moves to some longer-lived structure).
//!
//! ```ignore
//! let mut ledger = Ledger::new();
//! let dir = ledger.acquire("temp dir", make_dir()?, remove_dir);
//! let file = ledger.acquire("temp file", create(&dir)?, remove_file);
//! link(ledger.get(&file))?;         // failure: file removed, then dir
//! let path = ledger.commit(file);   // kept; only dir is removed on drop
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error};

/// Typed receipt for a resource held by a [`Ledger`].
///
/// Not `Clone`: a resource is committed or released at most once.
pub struct Held<T> {
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Held<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Held").field(&self.id).finish()
    }
}

type Releaser<'a> = Box<dyn FnOnce(Box<dyn Any>) + 'a>;

struct Entry<'a> {
    id: u64,
    label: &'static str,
    resource: Box<dyn Any>,
    release: Releaser<'a>,
}

/// Ordered cleanup stack. Unwinds on drop.
pub struct Ledger<'a> {
    entries: Vec<Entry<'a>>,
    next_id: u64,
}

impl<'a> Ledger<'a> {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Record a freshly acquired resource and how to release it.
    pub fn acquire<T: 'static>(
        &mut self,
        label: &'static str,
        resource: T,
        release: impl FnOnce(T) + 'a,
    ) -> Held<T> {
        let id = self.next_id;
        self.next_id += 1;

        let release: Releaser<'a> = Box::new(move |any: Box<dyn Any>| {
            if let Ok(resource) = any.downcast::<T>() {
                release(*resource);
            }
        });
        self.entries.push(Entry {
            id,
            label,
            resource: Box::new(resource),
            release,
        });
        debug!(label, id, depth = self.entries.len(), "ledger acquire");

        Held {
            id,
            _marker: PhantomData,
        }
    }

    /// Borrow a held resource.
    pub fn get<T: 'static>(&self, held: &Held<T>) -> Option<&T> {
        self.entries
            .iter()
            .find(|e| e.id == held.id)
            .and_then(|e| e.resource.downcast_ref::<T>())
    }

    /// Mutably borrow a held resource.
    pub fn get_mut<T: 'static>(&mut self, held: &Held<T>) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|e| e.id == held.id)
            .and_then(|e| e.resource.downcast_mut::<T>())
    }

    /// Take a resource out without releasing it.
    ///
    /// Returns `None` if it was already released.
    pub fn commit<T: 'static>(&mut self, held: Held<T>) -> Option<T> {
        let entry = self.take(held.id)?;
        debug!(label = entry.label, id = entry.id, "ledger commit");
        entry.resource.downcast::<T>().ok().map(|b| *b)
    }

    /// Release one resource now. A no-op if it is no longer held.
    pub fn release<T>(&mut self, held: Held<T>) -> bool {
        match self.take(held.id) {
            Some(entry) => {
                run_isolated(entry);
                true
            }
            None => false,
        }
    }

    /// Release everything still held, newest first.
    pub fn unwind_all(&mut self) {
        while let Some(entry) = self.entries.pop() {
            run_isolated(entry);
        }
    }

    /// Labels of the held resources, oldest first.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.label)
    }

    /// Number of resources still held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn take(&mut self, id: u64) -> Option<Entry<'a>> {
        let index = self.entries.iter().rposition(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }
}

impl Default for Ledger<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Ledger<'_> {
    fn drop(&mut self) {
        self.unwind_all();
    }
}

/// Run a releaser; a panic is logged and does not stop the caller.
fn run_isolated(entry: Entry<'_>) {
    let Entry {
        id,
        label,
        resource,
        release,
    } = entry;
    debug!(label, id, "ledger release");
    if catch_unwind(AssertUnwindSafe(move || release(resource))).is_err() {
        error!(label, id, "releaser panicked; continuing unwind");
    }
}
