//! Run-time view of a loaded class: the decoded class file plus the static
//! field values the interpreter reads and writes.
use std::rc::Rc;

use crate::descriptor::{decode_type, BaseTypeKind, Type};
use crate::error::{DecodeError, StackTraceElement};
use crate::intern::{StringId, StringPool};
use crate::jvm::{CPInfo, JVMClassFile, MethodInfo};

/// One entry of a class's static field table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticField {
    pub name: StringId,
    pub t: Type,
    pub value: i32,
}

/// A class registered with the runtime.
#[derive(Debug, Clone)]
pub struct RuntimeClass {
    // Shared so the interpreter can walk a method's code while it mutates
    // the class's static fields.
    file: Rc<JVMClassFile>,
    statics: Vec<StaticField>,
}

impl RuntimeClass {
    /// Build the static field table. Every field starts at zero except
    /// `static final` int and float fields with a ConstantValue attribute.
    pub fn new(file: JVMClassFile, strings: &mut StringPool) -> Result<Self, DecodeError> {
        let mut statics = Vec::with_capacity(file.fields().len());
        for field in file.fields() {
            let name = utf8(&file, field.name_index())?;
            let descriptor = utf8(&file, field.descriptor_index())?;
            let descriptor = strings.get(descriptor).to_owned();
            let t = decode_type(&descriptor, strings)?;

            let flags = field.access_flags();
            let initial = match field.constant_value_index() {
                Some(index) if flags.is_static() && flags.is_final() => {
                    constant_value(&file, index, &t)?
                }
                _ => 0,
            };
            statics.push(StaticField {
                name,
                t,
                value: initial,
            });
        }
        Ok(Self {
            file: Rc::new(file),
            statics,
        })
    }

    pub fn file(&self) -> &Rc<JVMClassFile> {
        &self.file
    }

    pub fn name(&self) -> StringId {
        self.file.this_class_name()
    }

    /// Find a method by name and descriptor, returning its position in the
    /// class file's method list.
    pub fn find_method(&self, name: StringId, descriptor: StringId) -> Option<usize> {
        self.file.methods().iter().position(|method| {
            self.file.utf8(method.name_index()) == Some(name)
                && self.file.utf8(method.descriptor_index()) == Some(descriptor)
        })
    }

    pub fn method(&self, index: usize) -> &MethodInfo {
        &self.file.methods()[index]
    }

    /// Find a static field by name and by type shape.
    pub fn find_static(&self, name: StringId, t: &Type) -> Option<usize> {
        self.statics
            .iter()
            .position(|field| field.name == name && field.t.same_shape(t))
    }

    pub fn static_by_name(&self, name: StringId) -> Option<&StaticField> {
        self.statics.iter().find(|field| field.name == name)
    }

    pub fn get_static(&self, index: usize) -> i32 {
        self.statics[index].value
    }

    pub fn set_static(&mut self, index: usize, value: i32) {
        self.statics[index].value = value;
    }

    /// Describe the frame of `method` stopped at `pc` for a stack trace.
    pub fn trace_element(
        &self,
        method: usize,
        pc: usize,
        locals: &[i32],
        strings: &StringPool,
    ) -> StackTraceElement {
        let info = self.method(method);
        let text = |id: Option<StringId>| id.map(|id| strings.get(id).to_owned());
        let code = info.code();

        let mut live = Vec::new();
        if let Some(table) = code.and_then(|code| code.local_variable_table()) {
            for entry in table.iter().filter(|entry| entry.covers(pc)) {
                let value = locals.get(entry.index as usize);
                if let (Some(name), Some(value)) = (text(self.file.utf8(entry.name_index)), value) {
                    live.push((entry.index, name, *value));
                }
            }
        }
        live.sort_by_key(|(slot, _, _)| *slot);

        StackTraceElement {
            class_name: strings.get(self.name()).to_owned(),
            method_name: text(self.file.utf8(info.name_index())).unwrap_or_default(),
            source_file: text(self.file.source_file()),
            line: code.and_then(|code| code.line_number(pc)),
            locals: live.into_iter().map(|(_, name, value)| (name, value)).collect(),
        }
    }
}

fn utf8(file: &JVMClassFile, index: u16) -> Result<StringId, DecodeError> {
    file.utf8(index).ok_or(DecodeError::BadConstant {
        index,
        expected: "Utf8",
    })
}

/// Initial value of a constant field: the bits of an Integer or Float
/// constant. Other constant kinds start at zero.
fn constant_value(file: &JVMClassFile, index: u16, t: &Type) -> Result<i32, DecodeError> {
    let scalar = !t.is_array() && t.t != BaseTypeKind::Class;
    match file.constant(index) {
        Some(CPInfo::ConstantInteger { bytes } | CPInfo::ConstantFloat { bytes }) if scalar => {
            Ok(*bytes as i32)
        }
        Some(_) => Ok(0),
        None => Err(DecodeError::BadConstant {
            index,
            expected: "constant value",
        }),
    }
}
