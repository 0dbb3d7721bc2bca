use std::cell::Cell;
use std::rc::Rc;

///
/// OperationGuard
///
/// Critical-section marker for the unit of work. Every state-mutating or
/// snapshot-fetching operation enters before touching any entry and the
/// scope releases on drop, so the guard is released on every exit path,
/// including panics and early `?` returns. Re-entrant entry fails fast
/// before anything is mutated.
///

#[derive(Debug, Default)]
pub(crate) struct OperationGuard {
    busy: Rc<Cell<bool>>,
}

impl OperationGuard {
    /// Enter the critical section; `None` when it is already held.
    pub(crate) fn enter(&self) -> Option<OperationScope> {
        if self.busy.get() {
            return None;
        }
        self.busy.set(true);
        Some(OperationScope {
            busy: Rc::clone(&self.busy),
        })
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self) -> bool {
        self.busy.get()
    }
}

///
/// OperationScope
///

#[derive(Debug)]
pub(crate) struct OperationScope {
    busy: Rc<Cell<bool>>,
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::OperationGuard;

    #[test]
    fn reentrant_entry_is_refused() {
        let guard = OperationGuard::default();
        let scope = guard.enter().expect("first entry");
        assert!(guard.enter().is_none());
        drop(scope);
        assert!(guard.enter().is_some());
    }

    #[test]
    fn scope_releases_on_drop() {
        let guard = OperationGuard::default();
        {
            let _scope = guard.enter().expect("entry");
            assert!(guard.is_held());
        }
        assert!(!guard.is_held());
    }
}
