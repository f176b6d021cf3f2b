//! Lightweight implementation of a parser and decoder for JVM bytecode
//! class files.
use std::fs;
use std::io::{self, Cursor};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use tracing::debug;

use crate::descriptor::{decode_signature, Signature};
use crate::error::DecodeError;
use crate::intern::{StringId, StringPool};

type Result<T> = std::result::Result<T, DecodeError>;

/// Magic number every class file starts with.
pub const MAGIC: u32 = 0xCAFE_BABE;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_ABSTRACT: u16 = 0x0400;

/// Access flags bitmask of a class, field or method.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct AccessFlags(pub u16);

impl AccessFlags {
    pub const fn has(self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    pub const fn is_public(self) -> bool {
        self.has(ACC_PUBLIC)
    }

    pub const fn is_static(self) -> bool {
        self.has(ACC_STATIC)
    }

    pub const fn is_final(self) -> bool {
        self.has(ACC_FINAL)
    }

    pub const fn is_native(self) -> bool {
        self.has(ACC_NATIVE)
    }

    pub const fn is_abstract(self) -> bool {
        self.has(ACC_ABSTRACT)
    }
}

/// Constant pool entries, one variant per tag of the class-file format.
/// Numeric constants keep their raw big-endian bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CPInfo {
    /// Index 0 and the slot following a Long or Double.
    Unusable,
    ConstantUtf8 { length: u16, string: StringId },
    ConstantInteger { bytes: u32 },
    ConstantFloat { bytes: u32 },
    ConstantLong { bytes: u64 },
    ConstantDouble { bytes: u64 },
    ConstantClass { name_index: u16 },
    ConstantString { string_index: u16 },
    ConstantFieldRef { class_index: u16, name_and_type_index: u16 },
    ConstantMethodRef { class_index: u16, name_and_type_index: u16 },
    ConstantInterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    ConstantNameAndType { name_index: u16, descriptor_index: u16 },
    ConstantMethodHandle { reference_kind: u8, reference_index: u16 },
    ConstantMethodType { descriptor_index: u16 },
    ConstantInvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
}

impl CPInfo {
    const UTF8: u8 = 1;
    const INTEGER: u8 = 3;
    const FLOAT: u8 = 4;
    const LONG: u8 = 5;
    const DOUBLE: u8 = 6;
    const CLASS: u8 = 7;
    const STRING: u8 = 8;
    const FIELD_REF: u8 = 9;
    const METHOD_REF: u8 = 10;
    const INTERFACE_METHOD_REF: u8 = 11;
    const NAME_AND_TYPE: u8 = 12;
    const METHOD_HANDLE: u8 = 15;
    const METHOD_TYPE: u8 = 16;
    const INVOKE_DYNAMIC: u8 = 18;

    /// Long and Double entries occupy two pool indices.
    const fn is_wide(&self) -> bool {
        matches!(self, Self::ConstantLong { .. } | Self::ConstantDouble { .. })
    }
}

/// One row of a Code attribute's exception table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Class constant naming the caught type, 0 catches everything.
    pub catch_type: u16,
}

impl ExceptionEntry {
    pub fn covers(&self, pc: usize) -> bool {
        (self.start_pc as usize) <= pc && pc < self.end_pc as usize
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineNumberEntry {
    pub start_pc: u16,
    pub line_number: u16,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LocalVariableEntry {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    /// Local variable slot.
    pub index: u16,
}

impl LocalVariableEntry {
    pub fn covers(&self, pc: usize) -> bool {
        let start = self.start_pc as usize;
        start <= pc && pc < start + self.length as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionEntry>,
    pub attributes: Vec<AttributeInfo>,
}

impl CodeAttribute {
    pub fn line_number_table(&self) -> Option<&[LineNumberEntry]> {
        self.attributes.iter().find_map(|attr| match attr {
            AttributeInfo::LineNumberTable(table) => Some(table.as_slice()),
            _ => None,
        })
    }

    pub fn local_variable_table(&self) -> Option<&[LocalVariableEntry]> {
        self.attributes.iter().find_map(|attr| match attr {
            AttributeInfo::LocalVariableTable(table) => Some(table.as_slice()),
            _ => None,
        })
    }

    /// Source line of the instruction at `pc`: the entry with the greatest
    /// start pc not past `pc`.
    pub fn line_number(&self, pc: usize) -> Option<u16> {
        self.line_number_table()?
            .iter()
            .filter(|entry| entry.start_pc as usize <= pc)
            .max_by_key(|entry| entry.start_pc)
            .map(|entry| entry.line_number)
    }
}

/// Attributes recognized by the decoder. Anything else is kept as an opaque
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeInfo {
    Code(CodeAttribute),
    LineNumberTable(Vec<LineNumberEntry>),
    LocalVariableTable(Vec<LocalVariableEntry>),
    SourceFile { sourcefile_index: u16 },
    ConstantValue { constant_value_index: u16 },
    Exceptions { exception_index_table: Vec<u16> },
    Unknown { name_index: u16, info: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    access_flags: AccessFlags,
    name_index: u16,
    descriptor_index: u16,
    attributes: Vec<AttributeInfo>,
}

impl FieldInfo {
    pub const fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    pub const fn name_index(&self) -> u16 {
        self.name_index
    }

    pub const fn descriptor_index(&self) -> u16 {
        self.descriptor_index
    }

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    pub fn constant_value_index(&self) -> Option<u16> {
        self.attributes.iter().find_map(|attr| match attr {
            AttributeInfo::ConstantValue {
                constant_value_index,
            } => Some(*constant_value_index),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    access_flags: AccessFlags,
    name_index: u16,
    descriptor_index: u16,
    attributes: Vec<AttributeInfo>,
    // Parsed once from the descriptor at load time.
    signature: Signature,
}

impl MethodInfo {
    pub const fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    pub const fn name_index(&self) -> u16 {
        self.name_index
    }

    pub const fn descriptor_index(&self) -> u16 {
        self.descriptor_index
    }

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn code(&self) -> Option<&CodeAttribute> {
        self.attributes.iter().find_map(|attr| match attr {
            AttributeInfo::Code(code) => Some(code),
            _ => None,
        })
    }
}

/// A reference to a field or method resolved through the constant pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub class_name: StringId,
    pub name: StringId,
    pub descriptor: StringId,
}

/// Decoded class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JVMClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    constant_pool: Vec<CPInfo>,
    access_flags: AccessFlags,
    this_class: u16,
    // Name behind `this_class`.
    name: StringId,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodInfo>,
    attributes: Vec<AttributeInfo>,
}

impl JVMClassFile {
    pub fn constant_pool(&self) -> &[CPInfo] {
        &self.constant_pool
    }

    pub const fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    pub const fn this_class(&self) -> u16 {
        self.this_class
    }

    pub const fn super_class(&self) -> u16 {
        self.super_class
    }

    pub fn interfaces(&self) -> &[u16] {
        &self.interfaces
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    pub fn constant(&self, index: u16) -> Option<&CPInfo> {
        match self.constant_pool.get(index as usize) {
            Some(CPInfo::Unusable) | None => None,
            entry => entry,
        }
    }

    pub fn utf8(&self, index: u16) -> Option<StringId> {
        utf8_at(&self.constant_pool, index).ok()
    }

    pub fn class_name(&self, index: u16) -> Option<StringId> {
        match self.constant(index)? {
            CPInfo::ConstantClass { name_index } => self.utf8(*name_index),
            _ => None,
        }
    }

    pub const fn this_class_name(&self) -> StringId {
        self.name
    }

    pub fn name_and_type(&self, index: u16) -> Option<(StringId, StringId)> {
        match self.constant(index)? {
            CPInfo::ConstantNameAndType {
                name_index,
                descriptor_index,
            } => Some((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => None,
        }
    }

    /// Resolve a Fieldref, Methodref or InterfaceMethodref entry.
    pub fn member_ref(&self, index: u16) -> Option<MemberRef> {
        let (class_index, name_and_type_index) = match self.constant(index)? {
            CPInfo::ConstantFieldRef {
                class_index,
                name_and_type_index,
            }
            | CPInfo::ConstantMethodRef {
                class_index,
                name_and_type_index,
            }
            | CPInfo::ConstantInterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index),
            _ => return None,
        };
        let class_name = self.class_name(class_index)?;
        let (name, descriptor) = self.name_and_type(name_and_type_index)?;
        Some(MemberRef {
            class_name,
            name,
            descriptor,
        })
    }

    /// Index of the SourceFile name in the constant pool, if present.
    pub fn source_file(&self) -> Option<StringId> {
        self.attributes.iter().find_map(|attr| match attr {
            AttributeInfo::SourceFile { sourcefile_index } => self.utf8(*sourcefile_index),
            _ => None,
        })
    }
}

fn utf8_at(pool: &[CPInfo], index: u16) -> Result<StringId> {
    match pool.get(index as usize) {
        Some(CPInfo::ConstantUtf8 { string, .. }) => Ok(*string),
        _ => Err(DecodeError::BadConstant {
            index,
            expected: "Utf8",
        }),
    }
}

/// Decode the class file's modified UTF-8 into a string.
fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Some(s.to_owned());
    }
    // Encoded NULs and surrogate pairs are not valid UTF-8, decode them as
    // UTF-16 code units instead.
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = u16::from(bytes[i]);
        let continuation = |offset: usize| -> Option<u16> {
            let b = *bytes.get(i + offset)?;
            (b & 0xc0 == 0x80).then_some(u16::from(b & 0x3f))
        };
        let (unit, len) = match bytes[i] {
            0x00..=0x7f => (b0, 1),
            0xc0..=0xdf => (((b0 & 0x1f) << 6) | continuation(1)?, 2),
            0xe0..=0xef => (
                ((b0 & 0x0f) << 12) | (continuation(1)? << 6) | continuation(2)?,
                3,
            ),
            _ => return None,
        };
        units.push(unit);
        i += len;
    }
    String::from_utf16(&units).ok()
}

/// Read exactly `len` bytes, failing if the input ends first.
fn read_bytes<'a>(cursor: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8]> {
    let data: &'a [u8] = *cursor.get_ref();
    let start = cursor.position() as usize;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or(DecodeError::Truncated)?;
    cursor.set_position(end as u64);
    Ok(&data[start..end])
}

fn read_u16_list(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u16>> {
    let count = cursor.read_u16::<BigEndian>()?;
    (0..count)
        .map(|_| Ok(cursor.read_u16::<BigEndian>()?))
        .collect()
}

/// Recognized attribute names.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum AttributeKind {
    Code,
    LineNumberTable,
    LocalVariableTable,
    SourceFile,
    ConstantValue,
    Exceptions,
    Unknown,
}

impl AttributeKind {
    fn from_name(name: &str) -> Self {
        match name {
            "Code" => Self::Code,
            "LineNumberTable" => Self::LineNumberTable,
            "LocalVariableTable" => Self::LocalVariableTable,
            "SourceFile" => Self::SourceFile,
            "ConstantValue" => Self::ConstantValue,
            "Exceptions" => Self::Exceptions,
            _ => Self::Unknown,
        }
    }
}

/// `JVMParser` decodes class files from their big-endian binary form.
pub struct JVMParser<'a> {
    cursor: Cursor<&'a [u8]>,
    strings: &'a mut StringPool,
    constant_pool: Vec<CPInfo>,
}

impl<'a> JVMParser<'a> {
    /// Parse a complete class file. Text from Utf8 constants is interned in
    /// `strings`.
    pub fn parse(bytes: &'a [u8], strings: &'a mut StringPool) -> Result<JVMClassFile> {
        let mut parser = JVMParser {
            cursor: Cursor::new(bytes),
            strings,
            constant_pool: Vec::new(),
        };
        let class_file = parser.parse_class_file()?;
        let trailing = bytes.len() - parser.cursor.position() as usize;
        if trailing != 0 {
            return Err(DecodeError::TrailingBytes(trailing));
        }
        Ok(class_file)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.cursor.read_u8()?)
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(self.cursor.read_u16::<BigEndian>()?)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(self.cursor.read_u32::<BigEndian>()?)
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(self.cursor.read_u64::<BigEndian>()?)
    }

    fn parse_class_file(&mut self) -> Result<JVMClassFile> {
        let magic = self.u32()?;
        if magic != MAGIC {
            return Err(DecodeError::BadMagic(magic));
        }
        let minor_version = self.u16()?;
        let major_version = self.u16()?;

        let constant_pool_count = self.u16()?;
        self.parse_constant_pool(constant_pool_count)?;

        let access_flags = AccessFlags(self.u16()?);
        let this_class = self.u16()?;
        let name = self.expect_class(this_class)?;
        let super_class = self.u16()?;
        if super_class != 0 {
            self.expect_class(super_class)?;
        }
        let interfaces = read_u16_list(&mut self.cursor)?;

        let fields_count = self.u16()?;
        let mut fields = Vec::with_capacity(fields_count as usize);
        for _ in 0..fields_count {
            fields.push(self.parse_field()?);
        }

        let methods_count = self.u16()?;
        let mut methods = Vec::with_capacity(methods_count as usize);
        for _ in 0..methods_count {
            methods.push(self.parse_method()?);
        }

        let attributes = self.parse_attributes()?;

        debug!(
            major_version,
            minor_version,
            constant_pool_count,
            fields = fields.len(),
            methods = methods.len(),
            "decoded class file"
        );

        Ok(JVMClassFile {
            minor_version,
            major_version,
            constant_pool: std::mem::take(&mut self.constant_pool),
            access_flags,
            this_class,
            name,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    fn parse_constant_pool(&mut self, count: u16) -> Result<()> {
        self.constant_pool = Vec::with_capacity(count as usize);
        self.constant_pool.push(CPInfo::Unusable);
        while self.constant_pool.len() < count as usize {
            let index = self.constant_pool.len() as u16;
            let entry = self.parse_constant(index)?;
            let wide = entry.is_wide();
            self.constant_pool.push(entry);
            if wide {
                self.constant_pool.push(CPInfo::Unusable);
            }
        }
        Ok(())
    }

    fn parse_constant(&mut self, index: u16) -> Result<CPInfo> {
        let tag = self.u8()?;
        let entry = match tag {
            CPInfo::UTF8 => {
                let length = self.u16()?;
                let bytes = read_bytes(&mut self.cursor, length as usize)?;
                let text =
                    decode_modified_utf8(bytes).ok_or(DecodeError::InvalidUtf8 { index })?;
                CPInfo::ConstantUtf8 {
                    length,
                    string: self.strings.intern(&text),
                }
            }
            CPInfo::INTEGER => CPInfo::ConstantInteger { bytes: self.u32()? },
            CPInfo::FLOAT => CPInfo::ConstantFloat { bytes: self.u32()? },
            CPInfo::LONG => CPInfo::ConstantLong { bytes: self.u64()? },
            CPInfo::DOUBLE => CPInfo::ConstantDouble { bytes: self.u64()? },
            CPInfo::CLASS => CPInfo::ConstantClass {
                name_index: self.u16()?,
            },
            CPInfo::STRING => CPInfo::ConstantString {
                string_index: self.u16()?,
            },
            CPInfo::METHOD_TYPE => CPInfo::ConstantMethodType {
                descriptor_index: self.u16()?,
            },
            CPInfo::FIELD_REF => CPInfo::ConstantFieldRef {
                class_index: self.u16()?,
                name_and_type_index: self.u16()?,
            },
            CPInfo::METHOD_REF => CPInfo::ConstantMethodRef {
                class_index: self.u16()?,
                name_and_type_index: self.u16()?,
            },
            CPInfo::INTERFACE_METHOD_REF => CPInfo::ConstantInterfaceMethodRef {
                class_index: self.u16()?,
                name_and_type_index: self.u16()?,
            },
            CPInfo::NAME_AND_TYPE => CPInfo::ConstantNameAndType {
                name_index: self.u16()?,
                descriptor_index: self.u16()?,
            },
            CPInfo::INVOKE_DYNAMIC => CPInfo::ConstantInvokeDynamic {
                bootstrap_method_attr_index: self.u16()?,
                name_and_type_index: self.u16()?,
            },
            CPInfo::METHOD_HANDLE => CPInfo::ConstantMethodHandle {
                reference_kind: self.u8()?,
                reference_index: self.u16()?,
            },
            _ => return Err(DecodeError::UnknownTag { tag, index }),
        };
        Ok(entry)
    }

    fn expect_class(&self, index: u16) -> Result<StringId> {
        match self.constant_pool.get(index as usize) {
            Some(CPInfo::ConstantClass { name_index }) => utf8_at(&self.constant_pool, *name_index),
            _ => Err(DecodeError::BadConstant {
                index,
                expected: "Class",
            }),
        }
    }

    fn parse_field(&mut self) -> Result<FieldInfo> {
        let access_flags = AccessFlags(self.u16()?);
        let name_index = self.u16()?;
        let descriptor_index = self.u16()?;
        utf8_at(&self.constant_pool, name_index)?;
        utf8_at(&self.constant_pool, descriptor_index)?;
        let attributes = self.parse_attributes()?;
        Ok(FieldInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    fn parse_method(&mut self) -> Result<MethodInfo> {
        let access_flags = AccessFlags(self.u16()?);
        let name_index = self.u16()?;
        let descriptor_index = self.u16()?;
        utf8_at(&self.constant_pool, name_index)?;
        let descriptor = utf8_at(&self.constant_pool, descriptor_index)?;
        let attributes = self.parse_attributes()?;

        let descriptor = self.strings.get(descriptor).to_owned();
        let signature = decode_signature(&descriptor, self.strings)?;
        Ok(MethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
            signature,
        })
    }

    fn parse_attributes(&mut self) -> Result<Vec<AttributeInfo>> {
        let count = self.u16()?;
        let mut cursor = std::mem::take(&mut self.cursor);
        let result = (0..count)
            .map(|_| self.parse_attribute(&mut cursor))
            .collect();
        self.cursor = cursor;
        result
    }

    /// Decode one attribute from `cursor`. The payload is cut to exactly its
    /// declared length before its contents are read.
    fn parse_attribute(&mut self, cursor: &mut Cursor<&'a [u8]>) -> Result<AttributeInfo> {
        let name_index = cursor.read_u16::<BigEndian>()?;
        let length = cursor.read_u32::<BigEndian>()?;
        let payload = read_bytes(cursor, length as usize)?;
        let name = utf8_at(&self.constant_pool, name_index)?;
        let kind = AttributeKind::from_name(self.strings.get(name));

        let mut body = Cursor::new(payload);
        let attribute = match kind {
            AttributeKind::Code => AttributeInfo::Code(self.parse_code(&mut body)?),
            AttributeKind::LineNumberTable => {
                let count = body.read_u16::<BigEndian>()?;
                let mut table = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    table.push(LineNumberEntry {
                        start_pc: body.read_u16::<BigEndian>()?,
                        line_number: body.read_u16::<BigEndian>()?,
                    });
                }
                AttributeInfo::LineNumberTable(table)
            }
            AttributeKind::LocalVariableTable => {
                let count = body.read_u16::<BigEndian>()?;
                let mut table = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    table.push(LocalVariableEntry {
                        start_pc: body.read_u16::<BigEndian>()?,
                        length: body.read_u16::<BigEndian>()?,
                        name_index: body.read_u16::<BigEndian>()?,
                        descriptor_index: body.read_u16::<BigEndian>()?,
                        index: body.read_u16::<BigEndian>()?,
                    });
                }
                AttributeInfo::LocalVariableTable(table)
            }
            AttributeKind::SourceFile => AttributeInfo::SourceFile {
                sourcefile_index: body.read_u16::<BigEndian>()?,
            },
            AttributeKind::ConstantValue => AttributeInfo::ConstantValue {
                constant_value_index: body.read_u16::<BigEndian>()?,
            },
            AttributeKind::Exceptions => AttributeInfo::Exceptions {
                exception_index_table: read_u16_list(&mut body)?,
            },
            AttributeKind::Unknown => {
                body.set_position(length as u64);
                AttributeInfo::Unknown {
                    name_index,
                    info: payload.to_vec(),
                }
            }
        };

        if body.position() != length as u64 {
            return Err(DecodeError::AttributeLength {
                name: self.strings.get(name).to_owned(),
                declared: length,
                consumed: body.position(),
            });
        }
        Ok(attribute)
    }

    fn parse_code(&mut self, body: &mut Cursor<&'a [u8]>) -> Result<CodeAttribute> {
        let max_stack = body.read_u16::<BigEndian>()?;
        let max_locals = body.read_u16::<BigEndian>()?;
        let code_length = body.read_u32::<BigEndian>()?;
        let code = read_bytes(body, code_length as usize)?.to_vec();

        let exception_table_length = body.read_u16::<BigEndian>()?;
        let mut exception_table = Vec::with_capacity(exception_table_length as usize);
        for _ in 0..exception_table_length {
            exception_table.push(ExceptionEntry {
                start_pc: body.read_u16::<BigEndian>()?,
                end_pc: body.read_u16::<BigEndian>()?,
                handler_pc: body.read_u16::<BigEndian>()?,
                catch_type: body.read_u16::<BigEndian>()?,
            });
        }

        let attributes_count = body.read_u16::<BigEndian>()?;
        let mut attributes = Vec::with_capacity(attributes_count as usize);
        for _ in 0..attributes_count {
            attributes.push(self.parse_attribute(body)?);
        }

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }
}

/// Reads a class file from disk.
pub fn read_class_file(path: &Path) -> io::Result<Vec<u8>> {
    fs::read(path)
}
