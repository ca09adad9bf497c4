//! Synchronous compilation events.
//!
//! The compiler posts a [`Notification`] at each observable step. Every
//! registered [`Listener`] receives it before compilation continues.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use kiln_model::{Props, Reference, SnapshotName};
use tracing::{debug, trace};

use crate::writer::WriteKind;

/// One observable compilation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The executor started running a rep's action sequence.
    CompilationStarted {
        /// The rep.
        rep: Reference,
    },
    /// A rep's action sequence completed.
    CompilationEnded {
        /// The rep.
        rep: Reference,
    },
    /// A rep's compilation stopped to wait for another rep.
    CompilationSuspended {
        /// The waiting rep.
        rep: Reference,
        /// The rep it waits for.
        dependency: Reference,
    },
    /// A filter is about to run.
    FilteringStarted {
        /// The rep.
        rep: Reference,
        /// The filter name.
        filter: String,
    },
    /// A filter returned successfully.
    FilteringEnded {
        /// The rep.
        rep: Reference,
        /// The filter name.
        filter: String,
    },
    /// A snapshot was stored.
    SnapshotCreated {
        /// The rep.
        rep: Reference,
        /// The snapshot.
        snapshot: SnapshotName,
    },
    /// A rep's snapshots were taken from the compiled-content cache.
    CachedContentUsed {
        /// The rep.
        rep: Reference,
    },
    /// A snapshot was written to the output directory.
    RepWritten {
        /// The rep.
        rep: Reference,
        /// The output file.
        path: PathBuf,
        /// Whether the file was created, updated or left alone.
        kind: WriteKind,
    },
    /// A dependency edge was recorded.
    DependencyCreated {
        /// The object depended on.
        from: Reference,
        /// The dependent object.
        to: Reference,
        /// The aspects depended on.
        props: Props,
    },
}

/// Receives notifications.
pub trait Listener {
    /// Handles one notification.
    fn notify(&self, notification: &Notification);
}

impl<L: Listener + ?Sized> Listener for Rc<L> {
    fn notify(&self, notification: &Notification) {
        (**self).notify(notification)
    }
}

/// Delivers notifications to listeners in registration order.
#[derive(Default)]
pub struct NotificationCenter {
    listeners: Vec<Box<dyn Listener>>,
}

impl NotificationCenter {
    /// Creates a center with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn subscribe(&mut self, listener: Box<dyn Listener>) {
        self.listeners.push(listener);
    }

    /// Delivers `notification` to every listener.
    pub fn post(&self, notification: Notification) {
        for listener in &self.listeners {
            listener.notify(&notification);
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// Keeps every notification it receives.
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: RefCell<Vec<Notification>>,
}

impl NotificationLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the recorded notifications, leaving the log empty.
    pub fn take_all(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }
}

impl Listener for NotificationLog {
    fn notify(&self, notification: &Notification) {
        self.entries.borrow_mut().push(notification.clone());
    }
}

/// Forwards notifications to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl Listener for TracingListener {
    fn notify(&self, notification: &Notification) {
        match notification {
            Notification::CompilationStarted { rep } => debug!(%rep, "compiling"),
            Notification::CompilationEnded { rep } => debug!(%rep, "compiled"),
            Notification::CompilationSuspended { rep, dependency } => {
                debug!(%rep, %dependency, "suspended")
            }
            Notification::CachedContentUsed { rep } => debug!(%rep, "using cached content"),
            Notification::RepWritten { rep, path, kind } => {
                debug!(%rep, path = %path.display(), %kind, "wrote")
            }
            Notification::FilteringStarted { rep, filter } => trace!(%rep, filter, "filtering"),
            Notification::FilteringEnded { rep, filter } => trace!(%rep, filter, "filtered"),
            Notification::SnapshotCreated { rep, snapshot } => trace!(%rep, %snapshot, "snapshot"),
            Notification::DependencyCreated { from, to, props } => {
                trace!(%from, %to, %props, "dependency")
            }
        }
    }
}
