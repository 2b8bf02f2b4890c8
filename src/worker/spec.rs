//! # Worker specification for supervised execution.
//!
//! Defines [`WorkerSpec`], a configuration bundle describing one worker: its
//! name and slot index, the [`Entry`] that manufactures its collaborators,
//! its access flags, restart policy, and start time.
//!
//! A spec is created through [`WorkerSpec::builder`] and then handed to a
//! host's registration entry points (see
//! [`WorkerHost`](crate::core::WorkerHost)). The host validates the name at
//! registration time; building a spec never fails.
//!
//! [`Entry`] separates *what is shared* from *what is owned*: the maintenance
//! unit is one shared object, while each registered worker receives its own
//! fresh context provider.

use std::sync::Arc;

use crate::error::RegisterError;
use crate::work::{ContextProvider, MaintenanceRef, NoopContext};
use crate::worker::policy::{RestartPolicy, StartTime};

/// Upper bound on worker name length, in bytes.
pub const MAX_NAME_LEN: usize = 96;

/// Shared handle to an [`Entry`].
pub type EntryRef = Arc<dyn Entry>;

/// # Factory for the collaborators one worker owns.
///
/// The supervisor stamps many workers out of one entry: each registration
/// gets the shared maintenance unit plus a **fresh** context provider that the
/// new worker owns exclusively. A crash restart also draws a fresh provider,
/// so a poisoned context never leaks into the next incarnation.
pub trait Entry: Send + Sync + 'static {
    /// The maintenance pass every worker built from this entry invokes.
    fn maintenance(&self) -> MaintenanceRef;

    /// A fresh provider for one worker.
    ///
    /// Called once per registration and once per crash restart.
    fn context_provider(&self) -> Box<dyn ContextProvider>;
}

/// Function-backed entry: a shared unit plus a provider factory closure.
///
/// ## Example
/// ```rust
/// use bgvisor::{EntryFn, EntryRef, MaintenanceFn, NoopContext, WorkError};
///
/// let entry: EntryRef = EntryFn::arc(
///     MaintenanceFn::arc(|| async { Ok::<_, WorkError>(()) }),
///     || Box::new(NoopContext),
/// );
/// ```
pub struct EntryFn<C> {
    unit: MaintenanceRef,
    contexts: C,
}

impl<C> EntryFn<C>
where
    C: Fn() -> Box<dyn ContextProvider> + Send + Sync + 'static,
{
    /// Creates a new function-backed entry.
    pub fn new(unit: MaintenanceRef, contexts: C) -> Self {
        Self { unit, contexts }
    }

    /// Creates the entry and returns it as a shared handle.
    pub fn arc(unit: MaintenanceRef, contexts: C) -> Arc<Self> {
        Arc::new(Self::new(unit, contexts))
    }
}

impl EntryFn<fn() -> Box<dyn ContextProvider>> {
    /// Creates an entry whose workers need no surrounding context.
    pub fn contextless(unit: MaintenanceRef) -> Arc<Self> {
        EntryFn::arc(
            unit,
            (|| Box::new(NoopContext) as Box<dyn ContextProvider>) as fn() -> _,
        )
    }
}

impl<C> Entry for EntryFn<C>
where
    C: Fn() -> Box<dyn ContextProvider> + Send + Sync + 'static,
{
    fn maintenance(&self) -> MaintenanceRef {
        Arc::clone(&self.unit)
    }

    fn context_provider(&self) -> Box<dyn ContextProvider> {
        (self.contexts)()
    }
}

/// What a worker's provider is allowed to reach.
///
/// Declarative: the host records the flags, and the worker loop skips
/// [`ContextProvider::connect`] for workers without
/// [`AccessFlags::data_connection`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccessFlags {
    /// The worker participates in the host's shared state.
    pub shared_state: bool,
    /// The worker opens a long-lived data connection through its provider.
    pub data_connection: bool,
}

impl AccessFlags {
    /// Both flags set; what a typical pool worker wants.
    pub const fn all() -> Self {
        Self {
            shared_state: true,
            data_connection: true,
        }
    }
}

/// Specification for running a worker under supervision.
///
/// ## Example
/// ```rust
/// use bgvisor::{EntryFn, MaintenanceFn, RestartPolicy, WorkError, WorkerSpec};
///
/// let entry = EntryFn::contextless(MaintenanceFn::arc(|| async { Ok::<_, WorkError>(()) }));
///
/// let spec = WorkerSpec::builder("sweep_1")
///     .index(1)
///     .restart(RestartPolicy::Never)
///     .build(entry);
///
/// assert_eq!(spec.name(), "sweep_1");
/// assert_eq!(spec.index(), 1);
/// ```
#[derive(Clone)]
pub struct WorkerSpec {
    name: String,
    index: u32,
    entry: EntryRef,
    access: AccessFlags,
    restart: RestartPolicy,
    start_time: StartTime,
}

impl WorkerSpec {
    /// Starts building a spec for a worker with the given name.
    pub fn builder(name: impl Into<String>) -> WorkerSpecBuilder {
        WorkerSpecBuilder {
            name: name.into(),
            index: 0,
            access: AccessFlags::all(),
            restart: RestartPolicy::default(),
            start_time: StartTime::default(),
        }
    }

    /// The worker's name, unique within a host.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The slot index the supervisor assigned (1-based for pool workers).
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The entry manufacturing this worker's collaborators.
    pub fn entry(&self) -> &EntryRef {
        &self.entry
    }

    /// The worker's access flags.
    pub fn access(&self) -> AccessFlags {
        self.access
    }

    /// The worker's restart policy.
    pub fn restart(&self) -> RestartPolicy {
        self.restart
    }

    /// When the worker may begin running.
    pub fn start_time(&self) -> StartTime {
        self.start_time
    }

    /// Checks the name against the host's bounds.
    ///
    /// Hosts call this at registration time so an invalid spec is refused
    /// instead of silently truncated.
    pub fn validate_name(&self) -> Result<(), RegisterError> {
        if self.name.is_empty() {
            return Err(RegisterError::InvalidName {
                name: self.name.clone(),
                reason: "name must not be empty",
            });
        }
        if self.name.len() > MAX_NAME_LEN {
            return Err(RegisterError::InvalidName {
                name: self.name.clone(),
                reason: "name exceeds 96 bytes",
            });
        }
        Ok(())
    }
}

/// Builder for [`WorkerSpec`]. Building never fails; hosts validate at
/// registration.
pub struct WorkerSpecBuilder {
    name: String,
    index: u32,
    access: AccessFlags,
    restart: RestartPolicy,
    start_time: StartTime,
}

impl WorkerSpecBuilder {
    /// Sets the slot index (1-based for pool workers).
    pub fn index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    /// Sets the access flags. The builder default is [`AccessFlags::all`].
    pub fn access(mut self, access: AccessFlags) -> Self {
        self.access = access;
        self
    }

    /// Sets the restart policy.
    pub fn restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }

    /// Sets the start time.
    pub fn start_time(mut self, start_time: StartTime) -> Self {
        self.start_time = start_time;
        self
    }

    /// Finishes the spec with the entry its workers are built from.
    pub fn build(self, entry: EntryRef) -> WorkerSpec {
        WorkerSpec {
            name: self.name,
            index: self.index,
            entry,
            access: self.access,
            restart: self.restart,
            start_time: self.start_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::MaintenanceFn;

    fn entry() -> EntryRef {
        EntryFn::contextless(MaintenanceFn::arc(|| async { Ok(()) }))
    }

    #[test]
    fn test_builder_defaults() {
        let spec = WorkerSpec::builder("w").build(entry());

        assert_eq!(spec.index(), 0);
        assert_eq!(spec.access(), AccessFlags::all());
        assert_eq!(spec.restart(), RestartPolicy::Never);
        assert_eq!(spec.start_time(), StartTime::AfterRecovery);
        assert!(spec.validate_name().is_ok());
    }

    #[test]
    fn test_validate_name_rejects_empty() {
        let spec = WorkerSpec::builder("").build(entry());
        assert!(matches!(
            spec.validate_name(),
            Err(RegisterError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_validate_name_rejects_oversized() {
        let spec = WorkerSpec::builder("x".repeat(MAX_NAME_LEN + 1)).build(entry());
        assert!(matches!(
            spec.validate_name(),
            Err(RegisterError::InvalidName { .. })
        ));

        let spec = WorkerSpec::builder("x".repeat(MAX_NAME_LEN)).build(entry());
        assert!(spec.validate_name().is_ok());
    }

    #[tokio::test]
    async fn test_entry_hands_out_fresh_providers() {
        let e = entry();
        let mut a = e.context_provider();
        let mut b = e.context_provider();

        // Independent providers; both usable.
        a.begin().await.unwrap();
        b.begin().await.unwrap();
        a.commit().await.unwrap();
        b.rollback().await.unwrap();
    }
}
