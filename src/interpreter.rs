//! Interpreter for JVM bytecode.
//!
//! Each invocation runs in its own call to `execute`, nested calls recurse.
//! A fault raised by an instruction, or propagated out of a callee, is first
//! offered to the executing method's exception table at the faulting pc. If
//! no entry catches it, the frame adds itself to the stack trace and hands
//! the fault to its caller.
use std::io::Write;
use std::rc::Rc;

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, trace};

use crate::bytecode::OPCode;
use crate::descriptor::decode_type;
use crate::error::{Fault, Uncaught};
use crate::heap::{array_type_from_code, ObjectRef};
use crate::jvm::{CPInfo, CodeAttribute, JVMClassFile, MemberRef};
use crate::runtime::Runtime;

type Result<T> = std::result::Result<T, Uncaught>;

/// The console printing routine implemented by the runtime itself.
const INTRINSIC_CLASS: &str = "Main";
const INTRINSIC_METHOD: &str = "output";
const INTRINSIC_DESCRIPTOR: &str = "(I)V";

/// Value pushed for the exception object when a handler is entered.
const CAUGHT_EXCEPTION: i32 = ObjectRef::NULL.to_slot();

enum Flow {
    Next,
    Return,
}

/// Parent of each exception class the interpreter can raise.
fn superclass(name: &str) -> Option<&'static str> {
    let parent = match name {
        "java/lang/ArithmeticException"
        | "java/lang/NegativeArraySizeException"
        | "java/lang/NullPointerException"
        | "java/lang/IndexOutOfBoundsException" => "java/lang/RuntimeException",
        "java/lang/ArrayIndexOutOfBoundsException" => "java/lang/IndexOutOfBoundsException",
        "java/lang/RuntimeException" => "java/lang/Exception",
        "java/lang/Exception" | "java/lang/Error" => "java/lang/Throwable",
        "java/lang/NoSuchFieldError" | "java/lang/NoSuchMethodError" => {
            "java/lang/IncompatibleClassChangeError"
        }
        "java/lang/IncompatibleClassChangeError" => "java/lang/LinkageError",
        "java/lang/StackOverflowError" => "java/lang/VirtualMachineError",
        "java/lang/LinkageError" | "java/lang/VirtualMachineError" => "java/lang/Error",
        _ => return None,
    };
    Some(parent)
}

/// Whether a handler for `catch` catches `thrown`.
fn catches(catch: &str, thrown: &'static str) -> bool {
    let mut class = Some(thrown);
    while let Some(name) = class {
        if name == catch {
            return true;
        }
        class = superclass(name);
    }
    false
}

fn compare(op: OPCode, a: i32, b: i32) -> bool {
    match op {
        OPCode::IfEq | OPCode::IfICmpEq => a == b,
        OPCode::IfNe | OPCode::IfICmpNe => a != b,
        OPCode::IfLt | OPCode::IfICmpLt => a < b,
        OPCode::IfGe | OPCode::IfICmpGe => a >= b,
        OPCode::IfGt | OPCode::IfICmpGt => a > b,
        OPCode::IfLe | OPCode::IfICmpLe => a <= b,
        _ => false,
    }
}

/// Absolute target of a branch at `pc` with a signed 16-bit `offset`.
fn branch_target(pc: usize, offset: i16, code_length: usize) -> std::result::Result<usize, Fault> {
    let target = pc as isize + isize::from(offset);
    if target < 0 || target as usize >= code_length {
        return Err(Fault::malformed(format!(
            "branch at pc {pc} jumps outside the code to {target}"
        )));
    }
    Ok(target as usize)
}

/// Value pushed by `ldc`: an Integer or the bits of a Float.
fn load_constant(file: &JVMClassFile, index: u16) -> std::result::Result<i32, Fault> {
    match file.constant(index) {
        Some(CPInfo::ConstantInteger { bytes } | CPInfo::ConstantFloat { bytes }) => {
            Ok(*bytes as i32)
        }
        Some(other) => Err(Fault::unsupported(format!("ldc of {other:?}"))),
        None => Err(Fault::malformed(format!("ldc of unusable constant {index}"))),
    }
}

impl Runtime {
    /// Run `method` of `class` in a new outermost frame whose first locals
    /// are `args`, returning what it returns.
    pub(crate) fn execute_entry(
        &mut self,
        class: usize,
        method: usize,
        args: &[i32],
    ) -> Result<Option<i32>> {
        let file = Rc::clone(self.classes[class].file());
        let info = &file.methods()[method];
        let code = info
            .code()
            .ok_or_else(|| Fault::malformed("method has no Code attribute"))?;
        self.arena.enter_with_args(
            args,
            usize::from(code.max_locals),
            usize::from(code.max_stack),
        )?;
        self.execute(class, method)?;
        Ok(self.arena.leave(info.signature().returns_value())?)
    }

    /// Run the current frame until it returns. The frame stays on the arena
    /// either way, closing it is up to the caller.
    fn execute(&mut self, class: usize, method: usize) -> Result<()> {
        let file = Rc::clone(self.classes[class].file());
        let info = &file.methods()[method];
        let code = info
            .code()
            .ok_or_else(|| Fault::malformed("method has no Code attribute"))?;
        let returns_value = info.signature().returns_value();
        debug!(method = %self.method_name(class, method), depth = self.arena.depth(), "enter");

        let mut pc = 0;
        loop {
            let at = pc;
            match self.step(class, &file, code, returns_value, &mut pc) {
                Ok(Flow::Next) => {}
                Ok(Flow::Return) => {
                    debug!(method = %self.method_name(class, method), "exit");
                    return Ok(());
                }
                Err(mut uncaught) => match self.find_handler(&file, code, at, &uncaught.fault) {
                    Some(handler) => {
                        debug!(
                            method = %self.method_name(class, method),
                            fault = %uncaught.fault,
                            pc = at,
                            handler,
                            "caught exception"
                        );
                        self.arena.clear_operands()?;
                        self.arena.push(CAUGHT_EXCEPTION)?;
                        pc = handler;
                    }
                    None => {
                        let element = self.classes[class].trace_element(
                            method,
                            at,
                            self.arena.locals(),
                            &self.strings,
                        );
                        uncaught.trace.push(element);
                        return Err(uncaught);
                    }
                },
            }
        }
    }

    /// First exception table entry covering `pc` that catches `fault`.
    fn find_handler(
        &self,
        file: &JVMClassFile,
        code: &CodeAttribute,
        pc: usize,
        fault: &Fault,
    ) -> Option<usize> {
        let thrown = fault.exception?;
        code.exception_table
            .iter()
            .find(|entry| {
                entry.covers(pc)
                    && (entry.catch_type == 0
                        || file
                            .class_name(entry.catch_type)
                            .is_some_and(|name| catches(self.strings.get(name), thrown)))
            })
            .map(|entry| usize::from(entry.handler_pc))
    }

    /// Execute the instruction at `pc` and advance `pc` past it.
    /// `returns_value` tells which return instruction the method may use.
    fn step(
        &mut self,
        class: usize,
        file: &JVMClassFile,
        code: &CodeAttribute,
        returns_value: bool,
        pc: &mut usize,
    ) -> Result<Flow> {
        let bytes = &code.code;
        let at = *pc;
        let op = OPCode::from(
            *bytes
                .get(at)
                .ok_or_else(|| Fault::malformed("execution ran past the end of the code"))?,
        );
        let operands = bytes
            .get(at + 1..at + 1 + op.operand_bytes())
            .ok_or_else(|| Fault::malformed(format!("{op} at pc {at} is cut short")))?;
        *pc = at + 1 + operands.len();
        trace!(pc = at, opcode = %op, depth = self.arena.stack_depth(), "step");

        match op {
            OPCode::NOP => {}
            OPCode::IconstM1 => self.arena.push(-1)?,
            OPCode::Iconst0 => self.arena.push(0)?,
            OPCode::Iconst1 => self.arena.push(1)?,
            OPCode::Iconst2 => self.arena.push(2)?,
            OPCode::Iconst3 => self.arena.push(3)?,
            OPCode::Iconst4 => self.arena.push(4)?,
            OPCode::Iconst5 => self.arena.push(5)?,
            OPCode::BiPush => self.arena.push(i32::from(operands[0] as i8))?,
            OPCode::SiPush => self.arena.push(i32::from(BigEndian::read_i16(operands)))?,
            OPCode::Ldc => {
                let value = load_constant(file, u16::from(operands[0]))?;
                self.arena.push(value)?;
            }
            OPCode::LdcW => {
                let value = load_constant(file, BigEndian::read_u16(operands))?;
                self.arena.push(value)?;
            }
            OPCode::ILoad | OPCode::ALoad => self.load_local(usize::from(operands[0]))?,
            OPCode::ILoad0 | OPCode::ALoad0 => self.load_local(0)?,
            OPCode::ILoad1 | OPCode::ALoad1 => self.load_local(1)?,
            OPCode::ILoad2 | OPCode::ALoad2 => self.load_local(2)?,
            OPCode::ILoad3 | OPCode::ALoad3 => self.load_local(3)?,
            OPCode::IStore | OPCode::AStore => self.store_local(usize::from(operands[0]))?,
            OPCode::IStore0 | OPCode::AStore0 => self.store_local(0)?,
            OPCode::IStore1 | OPCode::AStore1 => self.store_local(1)?,
            OPCode::IStore2 | OPCode::AStore2 => self.store_local(2)?,
            OPCode::IStore3 | OPCode::AStore3 => self.store_local(3)?,
            OPCode::IALoad => {
                let index = self.arena.pop()?;
                let array = ObjectRef::from_slot(self.arena.pop()?);
                let value = self.heap.get(array)?.load_int(index)?;
                self.arena.push(value)?;
            }
            OPCode::IAStore => {
                let value = self.arena.pop()?;
                let index = self.arena.pop()?;
                let array = ObjectRef::from_slot(self.arena.pop()?);
                self.heap.get_mut(array)?.store_int(index, value)?;
            }
            OPCode::Pop => {
                self.arena.pop()?;
            }
            OPCode::Dup => {
                let value = self.arena.peek()?;
                self.arena.push(value)?;
            }
            OPCode::IAdd => self.binary(|a, b| Ok(a.wrapping_add(b)))?,
            OPCode::ISub => self.binary(|a, b| Ok(a.wrapping_sub(b)))?,
            OPCode::IMul => self.binary(|a, b| Ok(a.wrapping_mul(b)))?,
            OPCode::IDiv => self.binary(|a, b| match b {
                0 => Err(Fault::division_by_zero()),
                _ => Ok(a.wrapping_div(b)),
            })?,
            OPCode::IRem => self.binary(|a, b| match b {
                0 => Err(Fault::division_by_zero()),
                _ => Ok(a.wrapping_rem(b)),
            })?,
            OPCode::INeg => {
                let value = self.arena.pop()?;
                self.arena.push(value.wrapping_neg())?;
            }
            OPCode::IInc => {
                let index = usize::from(operands[0]);
                let delta = i32::from(operands[1] as i8);
                let value = self.arena.load(index)?;
                self.arena.store(index, value.wrapping_add(delta))?;
            }
            OPCode::IfEq
            | OPCode::IfNe
            | OPCode::IfLt
            | OPCode::IfGe
            | OPCode::IfGt
            | OPCode::IfLe => {
                let value = self.arena.pop()?;
                if compare(op, value, 0) {
                    *pc = branch_target(at, BigEndian::read_i16(operands), bytes.len())?;
                }
            }
            OPCode::IfICmpEq
            | OPCode::IfICmpNe
            | OPCode::IfICmpLt
            | OPCode::IfICmpGe
            | OPCode::IfICmpGt
            | OPCode::IfICmpLe => {
                let b = self.arena.pop()?;
                let a = self.arena.pop()?;
                if compare(op, a, b) {
                    *pc = branch_target(at, BigEndian::read_i16(operands), bytes.len())?;
                }
            }
            OPCode::Goto => {
                *pc = branch_target(at, BigEndian::read_i16(operands), bytes.len())?;
            }
            OPCode::IReturn => {
                if !returns_value {
                    let message = format!("ireturn at pc {at} in a void method");
                    return Err(Fault::malformed(message).into());
                }
                let value = self.arena.pop()?;
                self.arena.set_result(value)?;
                return Ok(Flow::Return);
            }
            OPCode::Return => {
                if returns_value {
                    let message = format!("return at pc {at} in a method that returns a value");
                    return Err(Fault::malformed(message).into());
                }
                return Ok(Flow::Return);
            }
            OPCode::GetStatic => {
                let field = self.resolve_static(class, file, BigEndian::read_u16(operands))?;
                let value = self.classes[class].get_static(field);
                self.arena.push(value)?;
            }
            OPCode::PutStatic => {
                let field = self.resolve_static(class, file, BigEndian::read_u16(operands))?;
                let value = self.arena.pop()?;
                self.classes[class].set_static(field, value);
            }
            OPCode::InvokeStatic => {
                self.invoke_static(class, file, BigEndian::read_u16(operands))?;
            }
            OPCode::NewArray => {
                let element = array_type_from_code(operands[0]).ok_or_else(|| {
                    Fault::malformed(format!("newarray of unknown type {}", operands[0]))
                })?;
                let count = self.arena.pop()?;
                let array = self.heap.allocate(element, count)?;
                self.arena.push(array.to_slot())?;
            }
            OPCode::ArrayLength => {
                let array = ObjectRef::from_slot(self.arena.pop()?);
                let length = self.heap.get(array)?.len();
                self.arena.push(length as i32)?;
            }
            OPCode::Unknown(_) => {
                return Err(Fault::unsupported(format!("{op} at pc {at}")).into());
            }
        }
        Ok(Flow::Next)
    }

    fn load_local(&mut self, index: usize) -> std::result::Result<(), Fault> {
        let value = self.arena.load(index)?;
        self.arena.push(value)
    }

    fn store_local(&mut self, index: usize) -> std::result::Result<(), Fault> {
        let value = self.arena.pop()?;
        self.arena.store(index, value)
    }

    fn binary(
        &mut self,
        f: impl FnOnce(i32, i32) -> std::result::Result<i32, Fault>,
    ) -> std::result::Result<(), Fault> {
        let b = self.arena.pop()?;
        let a = self.arena.pop()?;
        self.arena.push(f(a, b)?)
    }

    fn member_ref(file: &JVMClassFile, index: u16) -> std::result::Result<MemberRef, Fault> {
        file.member_ref(index)
            .ok_or_else(|| Fault::malformed(format!("constant {index} is not a member reference")))
    }

    /// Resolve a field reference to a slot in the static field table of the
    /// executing class.
    fn resolve_static(
        &mut self,
        class: usize,
        file: &JVMClassFile,
        index: u16,
    ) -> std::result::Result<usize, Fault> {
        let member = Self::member_ref(file, index)?;
        if member.class_name != file.this_class_name() {
            return Err(Fault::unsupported(format!(
                "field {}.{} belongs to another class",
                self.strings.get(member.class_name),
                self.strings.get(member.name)
            )));
        }
        let descriptor = self.strings.get(member.descriptor).to_owned();
        let t = decode_type(&descriptor, &mut self.strings)
            .map_err(|err| Fault::malformed(format!("field descriptor {descriptor}: {err}")))?;
        if t.size() != 1 {
            return Err(Fault::unsupported(format!(
                "static field of type {descriptor}"
            )));
        }
        self.classes[class]
            .find_static(member.name, &t)
            .ok_or_else(|| Fault::no_such_field(self.strings.get(member.name)))
    }

    fn is_intrinsic(&self, member: &MemberRef) -> bool {
        self.strings.get(member.class_name) == INTRINSIC_CLASS
            && self.strings.get(member.name) == INTRINSIC_METHOD
            && self.strings.get(member.descriptor) == INTRINSIC_DESCRIPTOR
    }

    fn invoke_static(&mut self, class: usize, file: &JVMClassFile, index: u16) -> Result<()> {
        let member = Self::member_ref(file, index)?;
        if self.is_intrinsic(&member) {
            let value = self.arena.pop()?;
            writeln!(self.output, "Main.output(int) : {value}")
                .map_err(|err| Fault::unsupported(format!("console output failed: {err}")))?;
            return Ok(());
        }

        let name = || {
            format!(
                "{}.{}{}",
                self.strings.get(member.class_name),
                self.strings.get(member.name),
                self.strings.get(member.descriptor)
            )
        };
        if member.class_name != file.this_class_name() {
            return Err(Fault::unsupported(format!("call to {} in another class", name())).into());
        }
        let callee = self.classes[class]
            .find_method(member.name, member.descriptor)
            .ok_or_else(|| Fault::no_such_method(&name()))?;
        let info = &file.methods()[callee];
        if !info.access_flags().is_static() {
            let message = format!("invokestatic of instance method {}", name());
            return Err(Fault::unsupported(message).into());
        }
        let code = info
            .code()
            .ok_or_else(|| Fault::unsupported(format!("{} has no bytecode", name())))?;
        if self.arena.depth() >= self.config.max_call_depth {
            return Err(Fault::stack_overflow(self.config.max_call_depth).into());
        }

        let signature = info.signature();
        self.arena.enter_call(
            signature.arg_slots(),
            usize::from(code.max_locals),
            usize::from(code.max_stack),
        )?;
        match self.execute(class, callee) {
            Ok(()) => {
                self.arena.leave(signature.returns_value())?;
                Ok(())
            }
            Err(uncaught) => {
                self.arena.leave(false)?;
                Err(uncaught)
            }
        }
    }
}
