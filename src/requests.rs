//! One cancellation slot per request class. Starting a request aborts the
//! previous occupant of its slot, and every completion checks its ticket
//! before touching the UI, so a superseded response can never be rendered.
//! The pending summary timer is owned here too, so a route change drops it
//! along with the summary request.

use leptos::prelude::TimeoutHandle;

pub trait AbortHandle {
    fn abort(&self);
}

impl AbortHandle for web_sys::AbortController {
    fn abort(&self) {
        web_sys::AbortController::abort(self);
    }
}

impl AbortHandle for TimeoutHandle {
    fn abort(&self) {
        self.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug)]
pub struct RequestSlot<H> {
    generation: u64,
    active: Option<H>,
}

impl<H> Default for RequestSlot<H> {
    fn default() -> Self {
        Self {
            generation: 0,
            active: None,
        }
    }
}

impl<H: AbortHandle> RequestSlot<H> {
    pub fn begin(&mut self, handle: H) -> Ticket {
        self.cancel();
        self.active = Some(handle);
        Ticket(self.generation)
    }

    /// Abort whatever is in flight and invalidate its ticket.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.abort();
        }
        self.generation += 1;
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.active.is_some() && ticket.0 == self.generation
    }

    /// Release the slot after a completed request. Stale tickets are ignored.
    pub fn finish(&mut self, ticket: Ticket) {
        if self.is_current(ticket) {
            self.active = None;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestClass {
    Document,
    Summary,
    Search,
}

/// Owner of every cancellation slot in the app.
#[derive(Debug)]
pub struct Requests<H = web_sys::AbortController, T = TimeoutHandle> {
    document: RequestSlot<H>,
    summary: RequestSlot<H>,
    search: RequestSlot<H>,
    summary_timer: Option<T>,
}

impl<H, T> Default for Requests<H, T> {
    fn default() -> Self {
        Self {
            document: RequestSlot::default(),
            summary: RequestSlot::default(),
            search: RequestSlot::default(),
            summary_timer: None,
        }
    }
}

impl<H: AbortHandle, T: AbortHandle> Requests<H, T> {
    fn slot(&self, class: RequestClass) -> &RequestSlot<H> {
        match class {
            RequestClass::Document => &self.document,
            RequestClass::Summary => &self.summary,
            RequestClass::Search => &self.search,
        }
    }

    fn slot_mut(&mut self, class: RequestClass) -> &mut RequestSlot<H> {
        match class {
            RequestClass::Document => &mut self.document,
            RequestClass::Summary => &mut self.summary,
            RequestClass::Search => &mut self.search,
        }
    }

    pub fn begin(&mut self, class: RequestClass, handle: H) -> Ticket {
        self.slot_mut(class).begin(handle)
    }

    pub fn cancel(&mut self, class: RequestClass) {
        self.slot_mut(class).cancel();
    }

    pub fn is_current(&self, class: RequestClass, ticket: Ticket) -> bool {
        self.slot(class).is_current(ticket)
    }

    pub fn finish(&mut self, class: RequestClass, ticket: Ticket) {
        self.slot_mut(class).finish(ticket);
    }

    /// Replace the pending summary timer, clearing the one it supersedes.
    pub fn schedule_summary(&mut self, timer: T) {
        self.clear_summary_timer();
        self.summary_timer = Some(timer);
    }

    fn clear_summary_timer(&mut self) {
        if let Some(timer) = self.summary_timer.take() {
            timer.abort();
        }
    }

    /// A new route supersedes the document fetch and drops the summary,
    /// pending or in flight.
    pub fn navigate(&mut self) {
        self.clear_summary_timer();
        self.summary.cancel();
    }
}
