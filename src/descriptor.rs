//! Parser for field and method descriptors such as `[I` or
//! `(ILjava/lang/String;)V`.
use std::sync::OnceLock;

use regex::Regex;

use crate::error::DescriptorError;
use crate::intern::{StringId, StringPool};

type Result<T> = std::result::Result<T, DescriptorError>;

/// Primitive types supported by the JVM, plus class references.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BaseTypeKind {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Class,
}

impl BaseTypeKind {
    fn from_tag(tag: char) -> Option<Self> {
        let t = match tag {
            'V' => Self::Void,
            'Z' => Self::Boolean,
            'B' => Self::Byte,
            'C' => Self::Char,
            'S' => Self::Short,
            'I' => Self::Int,
            'J' => Self::Long,
            'F' => Self::Float,
            'D' => Self::Double,
            'L' => Self::Class,
            _ => return None,
        };
        Some(t)
    }

    /// Width in bytes of one array element of this type.
    pub const fn width(self) -> usize {
        match self {
            Self::Void => 0,
            Self::Boolean | Self::Byte => 1,
            Self::Char | Self::Short => 2,
            Self::Int | Self::Float | Self::Class => 4,
            Self::Long | Self::Double => 8,
        }
    }
}

/// A decoded field type. Class types carry the interned class name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    /// Array dimensions, 0 for scalars.
    pub dimensions: u32,
    pub t: BaseTypeKind,
    pub class_name: Option<StringId>,
}

impl Type {
    pub const fn scalar(t: BaseTypeKind) -> Self {
        Self {
            dimensions: 0,
            t,
            class_name: None,
        }
    }

    pub const fn is_array(&self) -> bool {
        self.dimensions > 0
    }

    pub fn is_void(&self) -> bool {
        self.dimensions == 0 && self.t == BaseTypeKind::Void
    }

    /// Type identity used for static field lookup: same dimensions and same
    /// base tag. Class names are not compared.
    pub fn same_shape(&self, other: &Type) -> bool {
        self.dimensions == other.dimensions && self.t == other.t
    }

    /// Returns the size in stack slots of a value of this type.
    pub fn size(&self) -> usize {
        if self.is_array() {
            return 1;
        }
        match self.t {
            BaseTypeKind::Void => 0,
            BaseTypeKind::Long | BaseTypeKind::Double => 2,
            _ => 1,
        }
    }
}

/// Argument and return types of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub args: Vec<Type>,
    pub ret: Type,
}

impl Signature {
    /// Number of declared arguments, which is also the number of operand
    /// slots a static call consumes.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Stack slots taken by the arguments; longs and doubles take two.
    pub fn arg_slots(&self) -> usize {
        self.args.iter().map(Type::size).sum()
    }

    pub fn returns_value(&self) -> bool {
        !self.ret.is_void()
    }
}

/// Parse a single type off the front of `input`, returning it and the
/// unparsed remainder.
fn parse_type<'a>(input: &'a str, pool: &mut StringPool) -> Result<(Type, &'a str)> {
    let rest = input.trim_start_matches('[');
    let dimensions = (input.len() - rest.len()) as u32;

    let tag = rest.chars().next().ok_or(DescriptorError::UnexpectedEnd)?;
    let t = BaseTypeKind::from_tag(tag).ok_or(DescriptorError::UnknownTag(tag))?;
    let rest = &rest[tag.len_utf8()..];

    if t != BaseTypeKind::Class {
        return Ok((
            Type {
                dimensions,
                t,
                class_name: None,
            },
            rest,
        ));
    }

    // A class name without its terminating `;` runs to the end of input.
    let (name, rest) = match rest.find(';') {
        Some(end) => (&rest[..end], &rest[end + 1..]),
        None => (rest, ""),
    };
    let class_name = Some(pool.intern(name));
    Ok((
        Type {
            dimensions,
            t,
            class_name,
        },
        rest,
    ))
}

/// Decode a field descriptor. The whole string must be one type.
pub fn decode_type(descriptor: &str, pool: &mut StringPool) -> Result<Type> {
    if descriptor.is_empty() {
        return Err(DescriptorError::Empty);
    }
    let (t, rest) = parse_type(descriptor, pool)?;
    if !rest.is_empty() {
        return Err(DescriptorError::TrailingCharacters(rest.to_owned()));
    }
    Ok(t)
}

fn method_descriptor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\(([^)]*)\)(.*)$").expect("method descriptor regex is valid")
    })
}

/// Decode a method descriptor into its argument and return types.
pub fn decode_signature(descriptor: &str, pool: &mut StringPool) -> Result<Signature> {
    let caps = method_descriptor_regex()
        .captures(descriptor)
        .ok_or_else(|| DescriptorError::MissingParenthesis(descriptor.to_owned()))?;
    let arg_string = caps.get(1).map_or("", |m| m.as_str());
    let return_type_string = caps.get(2).map_or("", |m| m.as_str());

    let mut args = Vec::new();
    let mut remaining = arg_string;
    while !remaining.is_empty() {
        let (t, rest) = parse_type(remaining, pool)?;
        args.push(t);
        remaining = rest;
    }

    if return_type_string.is_empty() {
        return Err(DescriptorError::UnexpectedEnd);
    }
    let ret = decode_type(return_type_string, pool)?;
    Ok(Signature { args, ret })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_scalar_array_and_class_types() {
        let mut pool = StringPool::new();

        let int = decode_type("I", &mut pool).unwrap();
        assert_eq!(int, Type::scalar(BaseTypeKind::Int));

        let array = decode_type("[I", &mut pool).unwrap();
        assert_eq!(array.t, BaseTypeKind::Int);
        assert_eq!(array.dimensions, 1);
        assert!(array.is_array());

        let string = decode_type("Ljava/lang/String;", &mut pool).unwrap();
        assert_eq!(string.t, BaseTypeKind::Class);
        assert_eq!(string.dimensions, 0);
        assert_eq!(pool.get(string.class_name.unwrap()), "java/lang/String");

        let matrix = decode_type("[[Ljava/lang/Object;", &mut pool).unwrap();
        assert_eq!(matrix.dimensions, 2);
        assert_eq!(pool.get(matrix.class_name.unwrap()), "java/lang/Object");
    }

    #[test]
    fn unterminated_class_name_takes_the_rest() {
        let mut pool = StringPool::new();
        let t = decode_type("Ljava/lang/String", &mut pool).unwrap();
        assert_eq!(pool.get(t.class_name.unwrap()), "java/lang/String");
    }

    #[test]
    fn decodes_signatures() {
        let mut pool = StringPool::new();

        let sig = decode_signature("(I)V", &mut pool).unwrap();
        assert_eq!(sig.args, vec![Type::scalar(BaseTypeKind::Int)]);
        assert!(sig.ret.is_void());
        assert!(!sig.returns_value());

        let sig = decode_signature("()V", &mut pool).unwrap();
        assert_eq!(sig.arg_count(), 0);
        assert!(sig.ret.is_void());

        let sig = decode_signature("([Ljava/lang/String;JI)[I", &mut pool).unwrap();
        assert_eq!(sig.arg_count(), 3);
        assert_eq!(sig.args[0].dimensions, 1);
        assert_eq!(pool.get(sig.args[0].class_name.unwrap()), "java/lang/String");
        assert_eq!(sig.args[1], Type::scalar(BaseTypeKind::Long));
        assert_eq!(sig.args[1].size(), 2);
        assert_eq!(sig.arg_slots(), 4);
        assert_eq!(sig.ret.dimensions, 1);
        assert_eq!(sig.ret.t, BaseTypeKind::Int);
    }

    #[test]
    fn rejects_malformed_descriptors() {
        let mut pool = StringPool::new();
        assert_eq!(decode_type("", &mut pool), Err(DescriptorError::Empty));
        assert_eq!(decode_type("[", &mut pool), Err(DescriptorError::UnexpectedEnd));
        assert_eq!(decode_type("Q", &mut pool), Err(DescriptorError::UnknownTag('Q')));
        assert_eq!(
            decode_type("II", &mut pool),
            Err(DescriptorError::TrailingCharacters("I".into()))
        );
        assert!(matches!(
            decode_signature("I)V", &mut pool),
            Err(DescriptorError::MissingParenthesis(_))
        ));
        assert!(matches!(
            decode_signature("(I", &mut pool),
            Err(DescriptorError::MissingParenthesis(_))
        ));
        assert_eq!(decode_signature("(I)", &mut pool), Err(DescriptorError::UnexpectedEnd));
        assert_eq!(
            decode_signature("(X)V", &mut pool),
            Err(DescriptorError::UnknownTag('X'))
        );
    }

    #[test]
    fn shape_ignores_class_names() {
        let mut pool = StringPool::new();
        let a = decode_type("[Ljava/lang/String;", &mut pool).unwrap();
        let b = decode_type("[Ljava/lang/Object;", &mut pool).unwrap();
        let c = decode_type("Ljava/lang/Object;", &mut pool).unwrap();
        assert!(a.same_shape(&b));
        assert!(!b.same_shape(&c));
    }

    fn field_descriptor() -> impl Strategy<Value = (String, u32, char)> {
        (
            0u32..4,
            prop::sample::select(vec!['Z', 'B', 'C', 'S', 'I', 'J', 'F', 'D', 'L']),
        )
            .prop_map(|(dims, tag)| {
                let mut s = "[".repeat(dims as usize);
                s.push(tag);
                if tag == 'L' {
                    s.push_str("pkg/Name;");
                }
                (s, dims, tag)
            })
    }

    proptest! {
        #[test]
        fn signatures_keep_argument_order(args in prop::collection::vec(field_descriptor(), 0..6)) {
            let mut pool = StringPool::new();
            let descriptor = format!(
                "({})V",
                args.iter().map(|(s, _, _)| s.as_str()).collect::<String>()
            );
            let sig = decode_signature(&descriptor, &mut pool).unwrap();
            prop_assert_eq!(sig.arg_count(), args.len());
            for (t, (_, dims, tag)) in sig.args.iter().zip(&args) {
                prop_assert_eq!(t.dimensions, *dims);
                prop_assert_eq!(Some(t.t), BaseTypeKind::from_tag(*tag));
            }
        }
    }
}
