//! Top-level execution of loaded code
//!
//! Loaded code runs as if it were the outermost code of the program: the
//! top-level object is `self`, definitions land on the root class, and no
//! arguments or block are passed.
//!
//! Runtimes that expose "run with receiver and class" get the
//! [`ExecutionBridge::Direct`] strategy. Older ones only offer "run as the
//! toplevel of the active context", so [`ExecutionBridge::FabricatedContext`]
//! installs a fresh, minimal context around the call and always puts the
//! previous one back, whether or not the call raised.

use std::ops::{Deref, DerefMut};

use reqplus_sdk::{Capabilities, ContextLayout, HostResult, HostRuntime};
use tracing::debug;

/// Strategy for running a proc at the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionBridge {
    /// Call through the runtime's receiver-and-class entry point
    Direct,
    /// Run inside a temporary context sized by `layout`
    FabricatedContext {
        /// Size of the temporary context
        layout: ContextLayout,
    },
}

impl ExecutionBridge {
    /// Pick the strategy for a runtime with `caps`.
    pub fn select(caps: Capabilities) -> Self {
        if caps.direct_toplevel {
            ExecutionBridge::Direct
        } else {
            ExecutionBridge::FabricatedContext {
                layout: ContextLayout::TRIVIAL_CALL,
            }
        }
    }

    /// Run `proc` at the top level of `rt`.
    ///
    /// Exceptions raised by the proc are returned unchanged.
    pub fn run_at_top_level<R: HostRuntime>(
        &self,
        rt: &mut R,
        mut proc: R::Proc,
    ) -> HostResult<R::Value> {
        let object = rt.object_class();
        rt.set_target_class(&mut proc, object.clone());

        match *self {
            ExecutionBridge::Direct => {
                rt.clear_frame_method();
                let receiver = rt.top_self();
                rt.yield_with_class(&proc, receiver, object)
            }
            ExecutionBridge::FabricatedContext { layout } => {
                let mut scope = ContextScope::install(rt, layout, object);
                scope.toplevel_run(&proc)
            }
        }
    }
}

/// A fabricated context installed as the active one until dropped.
struct ContextScope<'r, R: HostRuntime> {
    rt: &'r mut R,
    saved: Option<R::Context>,
}

impl<'r, R: HostRuntime> ContextScope<'r, R> {
    fn install(rt: &'r mut R, layout: ContextLayout, class: R::Class) -> Self {
        let work = rt.new_context(layout, class);
        let saved = rt.swap_context(work);
        debug!(
            stack_slots = layout.stack_slots,
            call_frames = layout.call_frames,
            "installed temporary top-level context"
        );
        ContextScope {
            rt,
            saved: Some(saved),
        }
    }
}

impl<R: HostRuntime> Deref for ContextScope<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.rt
    }
}

impl<R: HostRuntime> DerefMut for ContextScope<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.rt
    }
}

impl<R: HostRuntime> Drop for ContextScope<'_, R> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            let work = self.rt.swap_context(saved);
            self.rt.free_context(work);
            debug!("restored previous context");
        }
    }
}
