//! UI thread → render thread request channel.
//!
//! The render thread owns the repository and the graph. Other threads never
//! touch them; they post requests here and the render thread drains the queue
//! between frames. A poster can block until its request has been handled.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;

use crate::input::InputEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum VisRequest {
    Redisplay,
    Reshape { width: usize, height: usize },
    Mouse(InputEvent),
    Key { key: String, ctrl: bool, shift: bool, alt: bool },
    /// The script that builds the graph changed and must be re-run.
    ScriptChanged,
}

#[derive(Debug, Default)]
struct Queue {
    pending: VecDeque<(u64, VisRequest)>,
    next_ticket: u64,
    /// Tickets below this have been handled.
    completed: u64,
    /// Highest ticket handed out by `drain`, plus one.
    drained: u64,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct VisChannel {
    queue: Mutex<Queue>,
    done: Condvar,
    vis: Mutex<()>,
}

impl VisChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request. With `wait`, block until the render thread has
    /// completed it (or the channel is closed).
    ///
    /// Returns `false` if the channel is closed.
    pub fn post(&self, request: VisRequest, wait: bool) -> bool {
        let mut q = self.queue.lock();
        if q.closed {
            return false;
        }
        let ticket = q.next_ticket;
        q.next_ticket += 1;
        q.pending.push_back((ticket, request));

        if wait {
            while q.completed <= ticket && !q.closed {
                self.done.wait(&mut q);
            }
        }
        true
    }

    /// Take every queued request, in posting order.
    pub fn drain(&self) -> Vec<VisRequest> {
        let mut q = self.queue.lock();
        if let Some(&(last, _)) = q.pending.back() {
            q.drained = last + 1;
        }
        q.pending.drain(..).map(|(_, r)| r).collect()
    }

    /// Mark everything drained so far as handled and wake waiting posters.
    pub fn complete(&self) {
        let mut q = self.queue.lock();
        q.completed = q.drained;
        self.done.notify_all();
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().pending.len()
    }

    /// Refuse further requests and release every waiting poster.
    pub fn close(&self) {
        let mut q = self.queue.lock();
        q.closed = true;
        q.pending.clear();
        self.done.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.queue.lock().closed
    }

    /// Exclusive access to the visualisation, held by the render thread for
    /// the duration of a frame and by anyone who must see a consistent frame.
    pub fn lock_vis(&self) -> MutexGuard<'_, ()> {
        self.vis.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn drain_returns_requests_in_order() {
        let ch = VisChannel::new();
        ch.post(VisRequest::Redisplay, false);
        ch.post(VisRequest::Reshape { width: 4, height: 3 }, false);
        assert_eq!(ch.pending(), 2);
        assert_eq!(
            ch.drain(),
            vec![VisRequest::Redisplay, VisRequest::Reshape { width: 4, height: 3 }]
        );
        assert_eq!(ch.pending(), 0);
        assert!(ch.drain().is_empty());
    }

    #[test]
    fn waiting_post_returns_after_completion() {
        let ch = Arc::new(VisChannel::new());
        let poster = {
            let ch = Arc::clone(&ch);
            thread::spawn(move || ch.post(VisRequest::ScriptChanged, true))
        };

        let mut seen = Vec::new();
        while seen.is_empty() {
            seen = ch.drain();
            thread::yield_now();
        }
        assert_eq!(seen, vec![VisRequest::ScriptChanged]);
        ch.complete();
        assert!(poster.join().unwrap());
    }

    #[test]
    fn close_releases_waiters_and_rejects_posts() {
        let ch = Arc::new(VisChannel::new());
        let poster = {
            let ch = Arc::clone(&ch);
            thread::spawn(move || ch.post(VisRequest::Redisplay, true))
        };
        while ch.pending() == 0 && !poster.is_finished() {
            thread::yield_now();
        }
        ch.close();
        assert!(poster.join().unwrap());
        assert!(!ch.post(VisRequest::Redisplay, false));
        assert!(ch.is_closed());
    }
}
