//! Test helpers: fixture paths and a byte-level class file assembler for
//! hand-written bytecode.
use std::cell::RefCell;
use std::collections::HashMap;
use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use byteorder::{BigEndian, WriteBytesExt};

use crate::jvm::MAGIC;

/// Path of a compiled fixture under `support/`.
pub fn support_path(name: &str) -> PathBuf {
    let env_var = env::var("CARGO_MANIFEST_DIR").unwrap();
    Path::new(&env_var).join("support").join(name)
}

/// Console output captured from a runtime.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Body of a method's Code attribute.
#[derive(Debug, Clone, Default)]
pub struct Code {
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
    // (start_pc, end_pc, handler_pc, catch class name or None for any)
    handlers: Vec<(u16, u16, u16, Option<String>)>,
    lines: Vec<(u16, u16)>,
    // (start_pc, length, name, descriptor, slot)
    locals: Vec<(u16, u16, String, String, u16)>,
}

impl Code {
    pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        Self {
            max_stack,
            max_locals,
            code,
            ..Self::default()
        }
    }

    pub fn handler(mut self, start: u16, end: u16, handler: u16, catch: Option<&str>) -> Self {
        self.handlers
            .push((start, end, handler, catch.map(str::to_owned)));
        self
    }

    pub fn line(mut self, start_pc: u16, line: u16) -> Self {
        self.lines.push((start_pc, line));
        self
    }

    pub fn local(
        mut self,
        start_pc: u16,
        length: u16,
        name: &str,
        descriptor: &str,
        slot: u16,
    ) -> Self {
        self.locals
            .push((start_pc, length, name.to_owned(), descriptor.to_owned(), slot));
        self
    }
}

/// Assembles a class file one constant and member at a time.
pub struct ClassFileBuilder {
    constants: Vec<Vec<u8>>,
    next_index: u16,
    utf8: HashMap<String, u16>,
    this_class: u16,
    super_class: u16,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}

impl ClassFileBuilder {
    pub fn new(name: &str) -> Self {
        let mut builder = Self {
            constants: Vec::new(),
            next_index: 1,
            utf8: HashMap::new(),
            this_class: 0,
            super_class: 0,
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        builder.this_class = builder.class(name);
        builder.super_class = builder.class("java/lang/Object");
        builder
    }

    fn push_constant(&mut self, bytes: Vec<u8>, slots: u16) -> u16 {
        let index = self.next_index;
        self.constants.push(bytes);
        self.next_index += slots;
        index
    }

    /// Append an arbitrary encoded constant taking one slot.
    pub fn raw_constant(&mut self, bytes: Vec<u8>) -> u16 {
        self.push_constant(bytes, 1)
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        if let Some(index) = self.utf8.get(text) {
            return *index;
        }
        let mut bytes = vec![1];
        bytes.write_u16::<BigEndian>(text.len() as u16).unwrap();
        bytes.extend_from_slice(text.as_bytes());
        let index = self.push_constant(bytes, 1);
        self.utf8.insert(text.to_owned(), index);
        index
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        let mut bytes = vec![7];
        bytes.write_u16::<BigEndian>(name_index).unwrap();
        self.push_constant(bytes, 1)
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let mut bytes = vec![3];
        bytes.write_i32::<BigEndian>(value).unwrap();
        self.push_constant(bytes, 1)
    }

    pub fn float(&mut self, value: f32) -> u16 {
        let mut bytes = vec![4];
        bytes.write_f32::<BigEndian>(value).unwrap();
        self.push_constant(bytes, 1)
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let mut bytes = vec![5];
        bytes.write_i64::<BigEndian>(value).unwrap();
        self.push_constant(bytes, 2)
    }

    pub fn string(&mut self, text: &str) -> u16 {
        let string_index = self.utf8(text);
        let mut bytes = vec![8];
        bytes.write_u16::<BigEndian>(string_index).unwrap();
        self.push_constant(bytes, 1)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut bytes = vec![12];
        bytes.write_u16::<BigEndian>(name_index).unwrap();
        bytes.write_u16::<BigEndian>(descriptor_index).unwrap();
        self.push_constant(bytes, 1)
    }

    fn member_ref(&mut self, tag: u8, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let nat = self.name_and_type(name, descriptor);
        let mut bytes = vec![tag];
        bytes.write_u16::<BigEndian>(class_index).unwrap();
        bytes.write_u16::<BigEndian>(nat).unwrap();
        self.push_constant(bytes, 1)
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(9, class, name, descriptor)
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(10, class, name, descriptor)
    }

    fn member(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<Vec<u8>>,
    ) -> Vec<u8> {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut bytes = Vec::new();
        bytes.write_u16::<BigEndian>(flags).unwrap();
        bytes.write_u16::<BigEndian>(name_index).unwrap();
        bytes.write_u16::<BigEndian>(descriptor_index).unwrap();
        bytes.write_u16::<BigEndian>(attributes.len() as u16).unwrap();
        for attribute in attributes {
            bytes.extend(attribute);
        }
        bytes
    }

    fn attribute(&mut self, name: &str, payload: Vec<u8>) -> Vec<u8> {
        let name_index = self.utf8(name);
        encode_attribute(name_index, payload)
    }

    pub fn field(&mut self, flags: u16, name: &str, descriptor: &str) -> &mut Self {
        let field = self.member(flags, name, descriptor, Vec::new());
        self.fields.push(field);
        self
    }

    /// A field with a ConstantValue attribute pointing at `constant`.
    pub fn constant_field(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        constant: u16,
    ) -> &mut Self {
        let mut payload = Vec::new();
        payload.write_u16::<BigEndian>(constant).unwrap();
        let attribute = self.attribute("ConstantValue", payload);
        let field = self.member(flags, name, descriptor, vec![attribute]);
        self.fields.push(field);
        self
    }

    pub fn method(&mut self, flags: u16, name: &str, descriptor: &str, code: Code) -> &mut Self {
        let attribute = self.code_attribute(code);
        let method = self.member(flags, name, descriptor, vec![attribute]);
        self.methods.push(method);
        self
    }

    /// A method without a Code attribute, such as a native declaration.
    pub fn bodiless_method(&mut self, flags: u16, name: &str, descriptor: &str) -> &mut Self {
        let method = self.member(flags, name, descriptor, Vec::new());
        self.methods.push(method);
        self
    }

    pub fn source_file(&mut self, name: &str) -> &mut Self {
        let sourcefile_index = self.utf8(name);
        let mut payload = Vec::new();
        payload.write_u16::<BigEndian>(sourcefile_index).unwrap();
        let attribute = self.attribute("SourceFile", payload);
        self.attributes.push(attribute);
        self
    }

    /// Append a class attribute with an arbitrary payload.
    pub fn raw_attribute(&mut self, name_index: u16, payload: Vec<u8>) -> &mut Self {
        self.attributes.push(encode_attribute(name_index, payload));
        self
    }

    fn code_attribute(&mut self, code: Code) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.write_u16::<BigEndian>(code.max_stack).unwrap();
        payload.write_u16::<BigEndian>(code.max_locals).unwrap();
        payload.write_u32::<BigEndian>(code.code.len() as u32).unwrap();
        payload.extend_from_slice(&code.code);

        payload.write_u16::<BigEndian>(code.handlers.len() as u16).unwrap();
        for (start, end, handler, catch) in &code.handlers {
            let catch_type = match catch {
                Some(name) => self.class(name),
                None => 0,
            };
            payload.write_u16::<BigEndian>(*start).unwrap();
            payload.write_u16::<BigEndian>(*end).unwrap();
            payload.write_u16::<BigEndian>(*handler).unwrap();
            payload.write_u16::<BigEndian>(catch_type).unwrap();
        }

        let mut nested = Vec::new();
        if !code.lines.is_empty() {
            let mut table = Vec::new();
            table.write_u16::<BigEndian>(code.lines.len() as u16).unwrap();
            for (start_pc, line) in &code.lines {
                table.write_u16::<BigEndian>(*start_pc).unwrap();
                table.write_u16::<BigEndian>(*line).unwrap();
            }
            nested.push(self.attribute("LineNumberTable", table));
        }
        if !code.locals.is_empty() {
            let mut table = Vec::new();
            table.write_u16::<BigEndian>(code.locals.len() as u16).unwrap();
            for (start_pc, length, name, descriptor, slot) in &code.locals {
                let name_index = self.utf8(name);
                let descriptor_index = self.utf8(descriptor);
                table.write_u16::<BigEndian>(*start_pc).unwrap();
                table.write_u16::<BigEndian>(*length).unwrap();
                table.write_u16::<BigEndian>(name_index).unwrap();
                table.write_u16::<BigEndian>(descriptor_index).unwrap();
                table.write_u16::<BigEndian>(*slot).unwrap();
            }
            nested.push(self.attribute("LocalVariableTable", table));
        }
        payload.write_u16::<BigEndian>(nested.len() as u16).unwrap();
        for attribute in nested {
            payload.extend(attribute);
        }
        self.attribute("Code", payload)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.write_u32::<BigEndian>(MAGIC).unwrap();
        bytes.write_u16::<BigEndian>(0).unwrap();
        bytes.write_u16::<BigEndian>(52).unwrap();
        bytes.write_u16::<BigEndian>(self.next_index).unwrap();
        for constant in &self.constants {
            bytes.extend_from_slice(constant);
        }
        bytes.write_u16::<BigEndian>(0x0020).unwrap();
        bytes.write_u16::<BigEndian>(self.this_class).unwrap();
        bytes.write_u16::<BigEndian>(self.super_class).unwrap();
        bytes.write_u16::<BigEndian>(0).unwrap();
        for members in [&self.fields, &self.methods, &self.attributes] {
            bytes.write_u16::<BigEndian>(members.len() as u16).unwrap();
            for member in members {
                bytes.extend_from_slice(member);
            }
        }
        bytes
    }
}

fn encode_attribute(name_index: u16, payload: Vec<u8>) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.write_u16::<BigEndian>(name_index).unwrap();
    bytes.write_u32::<BigEndian>(payload.len() as u32).unwrap();
    bytes.extend(payload);
    bytes
}
