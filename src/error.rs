//! Error types shared by the decoder, the descriptor parser and the
//! interpreter.
use std::fmt;
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures while decoding the binary class-file format.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a class file (magic 0x{0:08x})")]
    BadMagic(u32),
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownTag { tag: u8, index: u16 },
    #[error("unexpected end of class file")]
    Truncated,
    #[error("attribute `{name}` declares {declared} bytes but its payload is {consumed} bytes")]
    AttributeLength {
        name: String,
        declared: u32,
        consumed: u64,
    },
    #[error("{0} trailing bytes after the last attribute")]
    TrailingBytes(usize),
    #[error("constant pool index {index} is not a {expected} entry")]
    BadConstant { index: u16, expected: &'static str },
    #[error("constant pool entry {index} is not valid modified UTF-8")]
    InvalidUtf8 { index: u16 },
    #[error("bad method descriptor: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(err)
        }
    }
}

/// Grammar violations in field and method descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("empty descriptor")]
    Empty,
    #[error("descriptor ends inside a type")]
    UnexpectedEnd,
    #[error("unknown type tag `{0}`")]
    UnknownTag(char),
    #[error("`{0}` is not of the form (arguments)return")]
    MissingParenthesis(String),
    #[error("unexpected trailing characters `{0}`")]
    TrailingCharacters(String),
}

/// Categories of run-time faults raised by the interpreter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FaultKind {
    ArithmeticFault,
    IndexOutOfRange,
    MemberNotFound,
    UnsupportedOperation,
    MalformedClass,
    NullReference,
    StackOverflow,
}

/// A run-time fault. Faults that carry an exception class can be caught by
/// the exception tables of the methods on the call chain, the others always
/// unwind to the caller of the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", heading(.kind, .exception))]
pub struct Fault {
    pub kind: FaultKind,
    pub exception: Option<&'static str>,
    pub message: String,
}

impl Fault {
    fn throwable(kind: FaultKind, exception: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            exception: Some(exception),
            message: message.into(),
        }
    }

    pub fn division_by_zero() -> Self {
        Self::throwable(
            FaultKind::ArithmeticFault,
            "java/lang/ArithmeticException",
            "/ by zero",
        )
    }

    pub fn index_out_of_range(index: i32, length: usize) -> Self {
        Self::throwable(
            FaultKind::IndexOutOfRange,
            "java/lang/ArrayIndexOutOfBoundsException",
            format!("Index {index} out of bounds for length {length}"),
        )
    }

    pub fn negative_array_size(count: i32) -> Self {
        Self::throwable(
            FaultKind::IndexOutOfRange,
            "java/lang/NegativeArraySizeException",
            count.to_string(),
        )
    }

    pub fn no_such_field(name: &str) -> Self {
        Self::throwable(
            FaultKind::MemberNotFound,
            "java/lang/NoSuchFieldError",
            name,
        )
    }

    pub fn no_such_method(name: &str) -> Self {
        Self::throwable(
            FaultKind::MemberNotFound,
            "java/lang/NoSuchMethodError",
            name,
        )
    }

    pub fn null_reference() -> Self {
        Self::throwable(
            FaultKind::NullReference,
            "java/lang/NullPointerException",
            "array reference is null",
        )
    }

    pub fn stack_overflow(depth: usize) -> Self {
        Self::throwable(
            FaultKind::StackOverflow,
            "java/lang/StackOverflowError",
            format!("call depth exceeded {depth}"),
        )
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::UnsupportedOperation,
            exception: None,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::MalformedClass,
            exception: None,
            message: message.into(),
        }
    }

    /// Whether bytecode exception handlers may catch this fault.
    pub const fn is_catchable(&self) -> bool {
        self.exception.is_some()
    }
}

/// Java class name of a throwable fault, the fault kind otherwise.
fn heading(kind: &FaultKind, exception: &Option<&'static str>) -> String {
    match exception {
        Some(class) => class.replace('/', "."),
        None => format!("{kind:?}"),
    }
}

/// One frame of the diagnostic printed for an uncaught fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackTraceElement {
    pub class_name: String,
    pub method_name: String,
    pub source_file: Option<String>,
    pub line: Option<u16>,
    /// Local variables live at the frame's pc, as (name, slot value).
    pub locals: Vec<(String, i32)>,
}

impl fmt::Display for StackTraceElement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "at {}.{}({}",
            self.class_name.replace('/', "."),
            self.method_name,
            self.source_file.as_deref().unwrap_or("Unknown Source")
        )?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
        }
        write!(f, ")")
    }
}

/// A fault that no handler on the call chain caught, along with the call
/// chain it unwound through (innermost frame first).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{fault}{}", render_trace(.trace))]
pub struct Uncaught {
    pub fault: Fault,
    pub trace: Vec<StackTraceElement>,
}

impl Uncaught {
    pub fn new(fault: Fault) -> Self {
        Self {
            fault,
            trace: Vec::new(),
        }
    }
}

/// One `at` line per frame, each followed by its live locals.
fn render_trace(trace: &[StackTraceElement]) -> String {
    let mut text = String::new();
    for element in trace {
        text.push_str(&format!("\n\t{element}"));
        for (name, value) in &element.locals {
            text.push_str(&format!("\n\t\t{name} = {value}"));
        }
    }
    text
}

impl From<Fault> for Uncaught {
    fn from(fault: Fault) -> Self {
        Self::new(fault)
    }
}

/// Errors surfaced by the runtime's public entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read class file: {0}")]
    Io(#[from] io::Error),
    #[error("malformed class file: {0}")]
    Decode(#[from] DecodeError),
    #[error("method not found: {class}.{method}{descriptor}")]
    MethodNotFound {
        class: String,
        method: String,
        descriptor: String,
    },
    #[error("cannot invoke {method}: {reason}")]
    IllegalInvocation { method: String, reason: &'static str },
    #[error("cannot invoke {method}: no Code attribute")]
    MissingCode { method: String },
    #[error("{0}")]
    Uncaught(Box<Uncaught>),
    #[error("static initializer of {class} failed")]
    Initialization {
        class: String,
        #[source]
        source: Box<Error>,
    },
}

impl From<Uncaught> for Error {
    fn from(uncaught: Uncaught) -> Self {
        Self::Uncaught(Box::new(uncaught))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_display_uses_java_class_names() {
        assert_eq!(
            Fault::division_by_zero().to_string(),
            "java.lang.ArithmeticException: / by zero"
        );
        assert_eq!(
            Fault::index_out_of_range(4, 4).to_string(),
            "java.lang.ArrayIndexOutOfBoundsException: Index 4 out of bounds for length 4"
        );
        assert_eq!(
            Fault::unsupported("opcode 0xba").to_string(),
            "UnsupportedOperation: opcode 0xba"
        );
    }

    #[test]
    fn only_exception_faults_are_catchable() {
        assert!(Fault::division_by_zero().is_catchable());
        assert!(Fault::negative_array_size(-1).is_catchable());
        assert!(!Fault::malformed("operand stack overflow").is_catchable());
    }

    #[test]
    fn uncaught_renders_trace_and_locals() {
        let uncaught = Uncaught {
            fault: Fault::division_by_zero(),
            trace: vec![
                StackTraceElement {
                    class_name: "Faults".into(),
                    method_name: "divide".into(),
                    source_file: Some("Faults.java".into()),
                    line: Some(5),
                    locals: vec![("a".into(), 7), ("b".into(), 0)],
                },
                StackTraceElement {
                    class_name: "pkg/Caller".into(),
                    method_name: "run".into(),
                    source_file: None,
                    line: None,
                    locals: vec![],
                },
            ],
        };
        assert_eq!(
            uncaught.to_string(),
            "java.lang.ArithmeticException: / by zero\n\
             \tat Faults.divide(Faults.java:5)\n\
             \t\ta = 7\n\
             \t\tb = 0\n\
             \tat pkg.Caller.run(Unknown Source)"
        );
    }

    #[test]
    fn unexpected_eof_is_truncation() {
        let err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(DecodeError::from(err), DecodeError::Truncated));
    }
}
