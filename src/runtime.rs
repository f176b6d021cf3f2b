//! JVM runtime module responsible for loading classes and running their
//! static methods.
use std::io::{self, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::descriptor::BaseTypeKind;
use crate::error::{Error, Fault, Result};
use crate::frame::FrameArena;
use crate::heap::{ArrayObject, Heap, ObjectRef};
use crate::intern::{StringId, StringPool};
use crate::jvm::{read_class_file, JVMParser};
use crate::program::RuntimeClass;

/// Tunables of a `Runtime`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Frame arena slots reserved up front.
    pub arena_capacity: usize,
    /// Deepest allowed nesting of invocations.
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            arena_capacity: 4096,
            max_call_depth: 512,
        }
    }
}

/// `Runtime` owns every loaded class along with the state their code runs
/// against: the interned strings, the heap of arrays and the frame arena.
pub struct Runtime {
    pub(crate) classes: Vec<RuntimeClass>,
    pub(crate) strings: StringPool,
    pub(crate) heap: Heap,
    pub(crate) arena: FrameArena,
    pub(crate) config: RuntimeConfig,
    pub(crate) output: Box<dyn Write>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            classes: Vec::new(),
            strings: StringPool::new(),
            heap: Heap::new(),
            arena: FrameArena::with_capacity(config.arena_capacity),
            config,
            output: Box::new(io::stdout()),
        }
    }

    /// Send console output of the running program to `writer`.
    #[must_use]
    pub fn with_output(mut self, writer: impl Write + 'static) -> Self {
        self.output = Box::new(writer);
        self
    }

    /// Load a class file from disk. See [`Runtime::load_bytes`].
    pub fn load(&mut self, path: &Path) -> Result<StringId> {
        let bytes = read_class_file(path).map_err(|err| {
            warn!(path = %path.display(), %err, "abandoning class load");
            Error::Io(err)
        })?;
        self.load_bytes(&bytes)
    }

    /// Decode and register a class, then run its static initializer. On any
    /// failure nothing stays registered.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<StringId> {
        // Decode against a copy so a failed load leaves no interned text.
        let mut strings = self.strings.clone();
        let decoded = JVMParser::parse(bytes, &mut strings)
            .and_then(|file| RuntimeClass::new(file, &mut strings));
        let class = match decoded {
            Ok(class) => class,
            Err(err) => {
                warn!(%err, "abandoning class load");
                return Err(err.into());
            }
        };
        self.strings = strings;

        let name = class.name();
        info!(
            class = self.strings.get(name),
            major_version = class.file().major_version,
            minor_version = class.file().minor_version,
            constants = class.file().constant_pool().len(),
            "loaded class"
        );
        self.classes.push(class);
        let index = self.classes.len() - 1;

        if let Some(clinit) = self.lookup_method(index, "<clinit>", "()V") {
            info!(class = self.strings.get(name), "running static initializer");
            let result = self.run_method(index, clinit, &[], true);
            if let Err(source) = result {
                warn!(class = self.strings.get(name), "static initializer failed");
                self.classes.pop();
                return Err(Error::Initialization {
                    class: self.strings.get(name).to_owned(),
                    source: Box::new(source),
                });
            }
        }
        Ok(name)
    }

    fn lookup_method(&self, class: usize, name: &str, descriptor: &str) -> Option<usize> {
        let name = self.strings.lookup(name)?;
        let descriptor = self.strings.lookup(descriptor)?;
        self.classes[class].find_method(name, descriptor)
    }

    fn find_class(&self, name: &str) -> Option<usize> {
        let name = self.strings.lookup(name)?;
        self.classes.iter().position(|class| class.name() == name)
    }

    fn resolve(&self, class: &str, method: &str, descriptor: &str) -> Result<(usize, usize)> {
        self.find_class(class)
            .and_then(|index| Some((index, self.lookup_method(index, method, descriptor)?)))
            .ok_or_else(|| Error::MethodNotFound {
                class: class.to_owned(),
                method: method.to_owned(),
                descriptor: descriptor.to_owned(),
            })
    }

    /// Run a public static method. Each argument slot is passed as zero, so
    /// reference arguments are null.
    pub fn invoke(&mut self, class: &str, method: &str, descriptor: &str) -> Result<Option<i32>> {
        let (class, method) = self.resolve(class, method, descriptor)?;
        let slots = self.classes[class].method(method).signature().arg_slots();
        self.run_method(class, method, &vec![0; slots], false)
    }

    /// Run a public static method with explicit argument slots and return
    /// the value it returns, if any.
    pub fn invoke_with_args(
        &mut self,
        class: &str,
        method: &str,
        descriptor: &str,
        args: &[i32],
    ) -> Result<Option<i32>> {
        let (class, method) = self.resolve(class, method, descriptor)?;
        if self.classes[class].method(method).signature().arg_slots() != args.len() {
            return Err(Error::IllegalInvocation {
                method: self.method_name(class, method),
                reason: "argument count does not match the descriptor",
            });
        }
        self.run_method(class, method, args, false)
    }

    pub(crate) fn method_name(&self, class: usize, method: usize) -> String {
        let class = &self.classes[class];
        let name = class
            .file()
            .utf8(class.method(method).name_index())
            .map_or("<unnamed>", |id| self.strings.get(id));
        format!("{}.{}", self.strings.get(class.name()), name)
    }

    /// Validate and run a method as the outermost frame. `privileged` calls
    /// may run non-public methods.
    fn run_method(
        &mut self,
        class: usize,
        method: usize,
        args: &[i32],
        privileged: bool,
    ) -> Result<Option<i32>> {
        let info = self.classes[class].method(method);
        let flags = info.access_flags();
        let reason = if !flags.is_public() && !privileged {
            Some("method is not public")
        } else if !flags.is_static() {
            Some("method is not static")
        } else if flags.is_abstract() {
            Some("method is abstract")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(Error::IllegalInvocation {
                method: self.method_name(class, method),
                reason,
            });
        }
        if info.code().is_none() {
            return Err(Error::MissingCode {
                method: self.method_name(class, method),
            });
        }

        let result = self.execute_entry(class, method, args);
        // No frame outlives its outermost invocation.
        self.arena.reset();
        result.map_err(Error::from)
    }

    pub fn intern_string(&mut self, text: &str) -> StringId {
        self.strings.intern(text)
    }

    pub fn get_interned_string(&self, id: StringId) -> &str {
        self.strings.get(id)
    }

    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    /// Allocate a zeroed primitive array on the heap.
    pub fn new_primitive_array(
        &mut self,
        element: BaseTypeKind,
        count: i32,
    ) -> std::result::Result<ObjectRef, Fault> {
        self.heap.allocate(element, count)
    }

    pub fn array(&self, handle: ObjectRef) -> Option<&ArrayObject> {
        self.heap.get(handle).ok()
    }

    /// Current value of a static field of a loaded class.
    pub fn static_field(&self, class: &str, name: &str) -> Option<i32> {
        let class = &self.classes[self.find_class(class)?];
        let name = self.strings.lookup(name)?;
        class.static_by_name(name).map(|field| field.value)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}
