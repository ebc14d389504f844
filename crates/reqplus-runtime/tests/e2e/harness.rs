//! Test harness for end-to-end loading
//!
//! Provides `ToyRuntime`, a tiny line-oriented host language, and helpers
//! to build bytecode images and native modules for it.
//!
//! Statements, one per line:
//!
//! - `ret N` - the result becomes the integer `N`
//! - `self` - the result becomes the receiver
//! - `def NAME` - define `NAME` on the target class
//! - `raise MSG` - raise a `RuntimeError`

#![allow(dead_code)]

use std::borrow::Cow;
use std::ffi::c_void;
use std::io;
use std::path::Path;
use std::process::Command;
use std::rc::Rc;

use reqplus_runtime::sdk::{
    BinaryVersion, Capabilities, ContextLayout, Exception, HostResult, HostRuntime, NativeHook,
    NativeHooks, Vfs,
};
use reqplus_runtime::{Loader, LoaderOptions};

/// Version tag the toy bytecode reader accepts.
pub const TOY_VERSION: BinaryVersion = *b"0300";

#[derive(Debug, Clone, PartialEq)]
pub enum ToyValue {
    Nil,
    Int(i64),
    Main,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToyClass(pub &'static str);

#[derive(Debug, Clone)]
pub enum Stmt {
    Ret(i64),
    SelfRef,
    Def(String),
    Raise(String),
}

#[derive(Debug)]
pub struct ToyProc {
    program: Rc<Vec<Stmt>>,
    pub target: Option<ToyClass>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ToyContext {
    pub id: u32,
    pub layout: Option<ContextLayout>,
    pub class: Option<ToyClass>,
}

/// State handed to native hooks; must match the C side of `build_native`.
#[repr(C)]
#[derive(Debug, Default)]
pub struct HookState {
    pub init_calls: u32,
    pub final_calls: u32,
    pub raise: u32,
    pub trace: u32,
}

pub struct ToyRuntime {
    caps: Capabilities,
    active: ToyContext,
    next_context: u32,
    pub frame_method: Option<String>,
    pub events: Vec<String>,
    pub results: Vec<ToyValue>,
    pub definitions: Vec<(&'static str, String)>,
    pub hooks: HookState,
}

impl ToyRuntime {
    pub fn new() -> Self {
        Self::with_caps(Capabilities::default())
    }

    /// A runtime without a direct top-level entry point.
    pub fn legacy() -> Self {
        Self::with_caps(Capabilities {
            direct_toplevel: false,
        })
    }

    fn with_caps(caps: Capabilities) -> Self {
        ToyRuntime {
            caps,
            active: ToyContext {
                id: 0,
                layout: None,
                class: None,
            },
            next_context: 1,
            frame_method: Some("require".to_string()),
            events: Vec::new(),
            results: Vec::new(),
            definitions: Vec::new(),
            hooks: HookState::default(),
        }
    }

    pub fn active_context(&self) -> &ToyContext {
        &self.active
    }

    fn parse(source: &[u8], filename: &str) -> HostResult<Vec<Stmt>> {
        let text = std::str::from_utf8(source)
            .map_err(|_| Exception::new("SyntaxError", format!("{filename}: invalid encoding")))?;

        let mut program = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (op, arg) = line.split_once(' ').unwrap_or((line, ""));
            let stmt = match op {
                "ret" => arg.parse().ok().map(Stmt::Ret),
                "self" => Some(Stmt::SelfRef),
                "def" if !arg.is_empty() => Some(Stmt::Def(arg.to_string())),
                "raise" => Some(Stmt::Raise(arg.to_string())),
                _ => None,
            };
            match stmt {
                Some(stmt) => program.push(stmt),
                None => {
                    return Err(Exception::new(
                        "SyntaxError",
                        format!("{filename}:{}: unknown statement", lineno + 1),
                    ))
                }
            }
        }
        Ok(program)
    }

    fn execute(
        &mut self,
        proc: &ToyProc,
        receiver: ToyValue,
        class: ToyClass,
    ) -> HostResult<ToyValue> {
        let mut result = ToyValue::Nil;
        for stmt in proc.program.iter() {
            match stmt {
                Stmt::Ret(n) => result = ToyValue::Int(*n),
                Stmt::SelfRef => result = receiver.clone(),
                Stmt::Def(name) => self.definitions.push((class.0, name.clone())),
                Stmt::Raise(msg) => return Err(Exception::new("RuntimeError", msg.clone())),
            }
        }
        self.results.push(result.clone());
        Ok(result)
    }
}

impl NativeHooks for ToyRuntime {
    unsafe fn invoke_hook(&mut self, hook: NativeHook) -> HostResult<()> {
        hook(&mut self.hooks as *mut HookState as *mut c_void);
        if std::mem::take(&mut self.hooks.raise) != 0 {
            return Err(Exception::new("RuntimeError", "hook raised"));
        }
        Ok(())
    }
}

impl HostRuntime for ToyRuntime {
    type Value = ToyValue;
    type Proc = ToyProc;
    type Bytecode = Rc<Vec<Stmt>>;
    type Class = ToyClass;
    type Context = ToyContext;

    fn compile(&mut self, source: &[u8], filename: &str) -> HostResult<ToyProc> {
        self.events.push(format!("compile {filename}"));
        Ok(ToyProc {
            program: Rc::new(Self::parse(source, filename)?),
            target: None,
        })
    }

    fn binary_version(&self) -> BinaryVersion {
        TOY_VERSION
    }

    fn read_bytecode(&mut self, image: &[u8]) -> Option<Rc<Vec<Stmt>>> {
        if image.len() < 22 || &image[..4] != b"RITE" {
            return None;
        }
        let total = u32::from_be_bytes([image[10], image[11], image[12], image[13]]) as usize;
        let body = image.get(22..total)?;
        Self::parse(body, "(bytecode)").ok().map(Rc::new)
    }

    fn proc_from_bytecode(&mut self, unit: &Rc<Vec<Stmt>>) -> ToyProc {
        ToyProc {
            program: Rc::clone(unit),
            target: None,
        }
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn top_self(&self) -> ToyValue {
        ToyValue::Main
    }

    fn object_class(&self) -> ToyClass {
        ToyClass("Object")
    }

    fn set_target_class(&mut self, proc: &mut ToyProc, class: ToyClass) {
        proc.target = Some(class);
    }

    fn clear_frame_method(&mut self) {
        self.frame_method = None;
    }

    fn yield_with_class(
        &mut self,
        proc: &ToyProc,
        receiver: ToyValue,
        class: ToyClass,
    ) -> HostResult<ToyValue> {
        self.events.push("yield".to_string());
        self.execute(proc, receiver, class)
    }

    fn toplevel_run(&mut self, proc: &ToyProc) -> HostResult<ToyValue> {
        self.events.push(format!("toplevel_run ctx={}", self.active.id));
        let class = self
            .active
            .class
            .clone()
            .or_else(|| proc.target.clone())
            .unwrap_or(ToyClass("(none)"));
        self.execute(proc, ToyValue::Main, class)
    }

    fn new_context(&mut self, layout: ContextLayout, class: ToyClass) -> ToyContext {
        let id = self.next_context;
        self.next_context += 1;
        self.events.push(format!("new ctx={id}"));
        ToyContext {
            id,
            layout: Some(layout),
            class: Some(class),
        }
    }

    fn swap_context(&mut self, context: ToyContext) -> ToyContext {
        self.events.push(format!("swap ctx={}", context.id));
        std::mem::replace(&mut self.active, context)
    }

    fn free_context(&mut self, context: ToyContext) {
        assert_ne!(context.id, self.active.id, "freed the active context");
        self.events.push(format!("free ctx={}", context.id));
    }
}

/// In-memory VFS that only carries a label.
pub struct MemVfs(pub &'static str);

impl Vfs for MemVfs {
    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.0)
    }

    fn is_file(&self, _path: &str) -> bool {
        false
    }

    fn size(&self, _path: &str) -> Option<u64> {
        None
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        Err(io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

/// Assemble a toy bytecode image around `program`.
pub fn assemble(version: &BinaryVersion, program: &str) -> Vec<u8> {
    let total = (22 + program.len()) as u32;
    let mut image = Vec::with_capacity(total as usize);
    image.extend_from_slice(b"RITE");
    image.extend_from_slice(version);
    image.extend_from_slice(&[0, 0]);
    image.extend_from_slice(&total.to_be_bytes());
    image.extend_from_slice(b"TOY0");
    image.extend_from_slice(b"0000");
    image.extend_from_slice(program.as_bytes());
    image
}

/// Loader over `runtime` staging native images under `tmp_root`.
pub fn loader_in(runtime: ToyRuntime, tmp_root: &Path) -> Loader<ToyRuntime> {
    Loader::with_options(
        runtime,
        LoaderOptions {
            tmp_root: Some(tmp_root.to_path_buf()),
            ..Default::default()
        },
    )
}

/// Compile C source into a shared object and return its bytes.
///
/// Returns `None` when no C compiler is available.
pub fn build_native(workdir: &Path, c_source: &str) -> Option<Vec<u8>> {
    let src = workdir.join("module.c");
    let out = workdir.join("module.out");
    std::fs::write(&src, c_source).ok()?;

    let status = Command::new("cc")
        .args(["-shared", "-fPIC", "-o"])
        .arg(&out)
        .arg(&src)
        .status()
        .ok()?;
    if !status.success() {
        return None;
    }
    std::fs::read(&out).ok()
}

/// C declarations shared by every test module; mirrors `HookState`.
pub const HOOK_STATE_C: &str = "
struct hook_state { unsigned init_calls; unsigned final_calls; unsigned raise; unsigned trace; };
";

/// Whether the staging root holds no leftovers.
pub fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
