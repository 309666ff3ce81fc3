use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::builtins::instance::OldInstance;
use crate::call::bind::{DefaultBinder, MethodBinder};
use crate::call::call;
use crate::call::host::HostMemberResolver;
use crate::config::{InstanceDictKind, RuntimeConfig, global_config};
use crate::constants::DEL;
use crate::object::dict::{DictRef, FieldIdDict, InstanceDict};
use crate::object::weakref::FinalizerRegistry;
use crate::state::recursion::ComparisonGuard;

/// Collaborators and settings shared by every call made against one object
/// graph.
pub struct Runtime {
    config: RuntimeConfig,
    binder: Arc<dyn MethodBinder>,
    host: Option<Arc<dyn HostMemberResolver>>,
    finalizers: FinalizerRegistry,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            binder: Arc::new(DefaultBinder),
            host: None,
            finalizers: FinalizerRegistry::new(),
        }
    }

    pub fn with_binder(mut self, binder: Arc<dyn MethodBinder>) -> Self {
        self.binder = binder;
        self
    }

    pub fn with_host_resolver(mut self, resolver: Arc<dyn HostMemberResolver>) -> Self {
        self.host = Some(resolver);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn binder(&self) -> &dyn MethodBinder {
        self.binder.as_ref()
    }

    pub fn host_resolver(&self) -> Option<&dyn HostMemberResolver> {
        self.host.as_deref()
    }

    pub fn finalizers(&self) -> &FinalizerRegistry {
        &self.finalizers
    }

    /// Fresh per-call-stack context.
    pub fn enter(&self) -> CallCx<'_> {
        CallCx {
            runtime: self,
            guard: ComparisonGuard::new(self.config.compare_depth_limit),
        }
    }

    /// Empty attribute store of the configured kind for a new instance.
    pub fn new_instance_dict(&self) -> DictRef {
        match self.config.instance_dict {
            InstanceDictKind::Compact => Arc::new(InstanceDict::new()),
            InstanceDictKind::Generic => Arc::new(FieldIdDict::new()),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(global_config().clone())
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("host", &self.host.is_some())
            .field("finalizers", &self.finalizers)
            .finish()
    }
}

/// Context threaded through every operation that may run user code.
///
/// Owns the comparison guard for its call stack, so two threads never share
/// recursion state.
pub struct CallCx<'rt> {
    runtime: &'rt Runtime,
    guard: ComparisonGuard,
}

impl<'rt> CallCx<'rt> {
    pub fn runtime(&self) -> &'rt Runtime {
        self.runtime
    }

    pub fn guard(&self) -> &ComparisonGuard {
        &self.guard
    }

    pub(crate) fn guard_mut(&mut self) -> &mut ComparisonGuard {
        &mut self.guard
    }

    /// Runs `__del__` for every instance that died since the last call.
    ///
    /// Each instance is rebuilt from its class and store before its
    /// finalizer runs; errors are logged and swallowed. Instances that die
    /// during this pass wait for the next call. Returns the number of
    /// finalizers that completed.
    pub fn run_pending_finalizers(&mut self) -> usize {
        let pending = self.runtime.finalizers().drain_pending();
        let mut completed = 0;
        for item in pending {
            let id = item.id;
            let inst = OldInstance::resurrect(item.class, item.dict);
            let Some(del) = inst.lookup_unhooked(self, DEL) else {
                debug!(id, "finalizer vanished before it ran");
                continue;
            };
            match call(self, &del, &[]) {
                Ok(_) => completed += 1,
                Err(err) => warn!(
                    id,
                    class = %inst.class().name(),
                    error = %err,
                    "exception ignored in __del__"
                ),
            }
        }
        completed
    }
}

impl fmt::Debug for CallCx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallCx")
            .field("guard_depth", &self.guard.depth())
            .finish()
    }
}
