//! Host runtime services consumed by the loader

use std::ffi::c_void;

use crate::error::HostResult;

/// Entry point exported by a native module (`init` or `final`).
///
/// The argument is the host's opaque interpreter state, as handed out by
/// [`NativeHooks::invoke_hook`].
pub type NativeHook = unsafe extern "C" fn(state: *mut c_void);

/// Fixed-width version tag carried in a bytecode header.
pub type BinaryVersion = [u8; 4];

/// What the host can do natively.
///
/// Queried once when a loader is created to pick an execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The runtime has a public "run with receiver and class" entry point.
    ///
    /// When false the loader fabricates a temporary execution context and
    /// uses [`HostRuntime::toplevel_run`] inside it.
    pub direct_toplevel: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            direct_toplevel: true,
        }
    }
}

/// Sizes of a fabricated execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLayout {
    /// Number of value-stack slots
    pub stack_slots: usize,
    /// Number of call-info frames
    pub call_frames: usize,
}

impl ContextLayout {
    /// Enough room for a zero-argument call at the top level.
    pub const TRIVIAL_CALL: ContextLayout = ContextLayout {
        stack_slots: 64,
        call_frames: 8,
    };
}

/// Invocation of native-module hooks.
///
/// Split out of [`HostRuntime`] because teardown needs nothing else.
pub trait NativeHooks {
    /// Call `hook` with the interpreter state.
    ///
    /// An exception left pending by the hook is returned as `Err`.
    ///
    /// # Safety
    ///
    /// `hook` must point into a library that stays linked for the whole call.
    unsafe fn invoke_hook(&mut self, hook: NativeHook) -> HostResult<()>;
}

/// Services the embedding runtime provides to the loader.
pub trait HostRuntime: NativeHooks {
    /// A script value
    type Value;
    /// A callable unit ready to run
    type Proc;
    /// A decoded bytecode unit, reference-counted by the host
    type Bytecode;
    /// A class reference
    type Class: Clone;
    /// An execution context (value stack + call-info stack)
    type Context;

    // ------------------------------------------------------------------
    // Compiler and bytecode reader
    // ------------------------------------------------------------------

    /// Parse program text, reporting `filename` in diagnostics.
    fn compile(&mut self, source: &[u8], filename: &str) -> HostResult<Self::Proc>;

    /// The version tag this runtime's bytecode reader accepts.
    fn binary_version(&self) -> BinaryVersion;

    /// Decode a bytecode image. `None` means the image was rejected.
    fn read_bytecode(&mut self, image: &[u8]) -> Option<Self::Bytecode>;

    /// Wrap a decoded unit into a callable unit.
    ///
    /// The returned proc holds its own reference to the underlying code.
    fn proc_from_bytecode(&mut self, unit: &Self::Bytecode) -> Self::Proc;

    // ------------------------------------------------------------------
    // Top-level execution
    // ------------------------------------------------------------------

    /// Which top-level entry points exist.
    fn capabilities(&self) -> Capabilities;

    /// The top-level receiver (`main`).
    fn top_self(&self) -> Self::Value;

    /// The root class (`Object`).
    fn object_class(&self) -> Self::Class;

    /// Set the class that definitions inside `proc` are made on.
    fn set_target_class(&mut self, proc: &mut Self::Proc, class: Self::Class);

    /// Forget the method name of the current frame so backtraces do not
    /// label top-level code with a synthetic `in <method>`.
    fn clear_frame_method(&mut self);

    /// Call `proc` with `receiver` as self, no arguments and no block.
    fn yield_with_class(
        &mut self,
        proc: &Self::Proc,
        receiver: Self::Value,
        class: Self::Class,
    ) -> HostResult<Self::Value>;

    /// Run `proc` as the outermost code of the active context.
    fn toplevel_run(&mut self, proc: &Self::Proc) -> HostResult<Self::Value>;

    // ------------------------------------------------------------------
    // Execution contexts
    // ------------------------------------------------------------------

    /// Allocate a context whose root frame targets `class`.
    fn new_context(&mut self, layout: ContextLayout, class: Self::Class) -> Self::Context;

    /// Make `context` active, returning the previously active one.
    fn swap_context(&mut self, context: Self::Context) -> Self::Context;

    /// Release a context that is no longer active.
    fn free_context(&mut self, context: Self::Context);
}
