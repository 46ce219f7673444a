//! JNI-style field/method descriptor grammar, shared by `ConstantValue`
//! widening, field/method records, and `Signature`-attribute parsing.

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{alpha1, alphanumeric1};
use nom::combinator::{all_consuming, eof, recognize};
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, preceded, tuple};
use nom::IResult;
use std::fmt::{Display, Formatter};

/// A parsed JVM type descriptor (field descriptor, or a method descriptor
/// when it has an `args`/`ret_type` shape).
#[derive(Debug, PartialEq, Clone)]
pub enum Descriptor {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
    /// Internal-form class name, e.g. `java/lang/String`.
    Class(String),
    Array(Box<Descriptor>),
    Method {
        args: Box<[Descriptor]>,
        ret_type: Box<Descriptor>,
    },
}

impl Descriptor {
    /// Parses a JNI type descriptor.
    pub fn parse(input: &str) -> Result<Self, String> {
        let (rest, parsed) =
            parse_descriptor(input).map_err(|e| format!("invalid descriptor {input:?}: {e}"))?;
        eof(rest).map_err(|_: nom::Err<nom::error::Error<&str>>| {
            format!("trailing bytes after descriptor {input:?}")
        })?;
        Ok(parsed)
    }

    /// Collects every class name this descriptor references (its own class
    /// reference, or recursively for arrays/methods), in internal form.
    pub fn referenced_class_names(&self, out: &mut Vec<String>) {
        match self {
            Descriptor::Class(name) => out.push(name.clone()),
            Descriptor::Array(inner) => inner.referenced_class_names(out),
            Descriptor::Method { args, ret_type } => {
                for a in args.iter() {
                    a.referenced_class_names(out);
                }
                ret_type.referenced_class_names(out);
            }
            _ => {}
        }
    }
}

impl Display for Descriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Descriptor::Boolean => write!(f, "boolean"),
            Descriptor::Byte => write!(f, "byte"),
            Descriptor::Char => write!(f, "char"),
            Descriptor::Short => write!(f, "short"),
            Descriptor::Int => write!(f, "int"),
            Descriptor::Long => write!(f, "long"),
            Descriptor::Float => write!(f, "float"),
            Descriptor::Double => write!(f, "double"),
            Descriptor::Void => write!(f, "void"),
            Descriptor::Class(name) => write!(f, "{}", name.replace('/', ".")),
            Descriptor::Array(inner) => write!(f, "{inner}[]"),
            Descriptor::Method { args, ret_type } => write!(
                f,
                "{} ({})",
                ret_type,
                args.iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

fn parse_descriptor(input: &str) -> IResult<&str, Descriptor> {
    use nom::combinator::map;
    alt((
        map(tag("Z"), |_| Descriptor::Boolean),
        map(tag("B"), |_| Descriptor::Byte),
        map(tag("C"), |_| Descriptor::Char),
        map(tag("S"), |_| Descriptor::Short),
        map(tag("I"), |_| Descriptor::Int),
        map(tag("J"), |_| Descriptor::Long),
        map(tag("F"), |_| Descriptor::Float),
        map(tag("D"), |_| Descriptor::Double),
        map(tag("V"), |_| Descriptor::Void),
        map(delimited(tag("L"), parse_internal_class_name, tag(";")), |name: &str| {
            Descriptor::Class(name.to_string())
        }),
        map(preceded(tag("["), parse_descriptor), |inner| {
            Descriptor::Array(Box::new(inner))
        }),
        map(
            tuple((
                delimited(tag("("), many0(parse_descriptor), tag(")")),
                parse_descriptor,
            )),
            |(args, ret_type)| Descriptor::Method {
                args: args.into_boxed_slice(),
                ret_type: Box::new(ret_type),
            },
        ),
    ))(input)
}

fn parse_java_identifier(input: &str) -> IResult<&str, &str> {
    recognize(preceded(
        alt((alpha1, tag("$"), tag("_"))),
        many0(alt((alphanumeric1, tag("$"), tag("_")))),
    ))(input)
}

fn parse_internal_class_name(input: &str) -> IResult<&str, &str> {
    recognize(separated_list1(tag("/"), parse_java_identifier))(input)
}

/// Checks that a string is a well-formed internal-form class/package path.
pub fn is_internal_name(s: impl AsRef<str>) -> bool {
    all_consuming(parse_internal_class_name)(s.as_ref()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primitive() {
        assert_eq!(Descriptor::parse("I").unwrap(), Descriptor::Int);
    }

    #[test]
    fn parses_class_descriptor() {
        assert_eq!(
            Descriptor::parse("Ljava/lang/String;").unwrap(),
            Descriptor::Class("java/lang/String".to_string())
        );
    }

    #[test]
    fn parses_array_of_class() {
        let d = Descriptor::parse("[Ljava/lang/String;").unwrap();
        assert_eq!(
            d,
            Descriptor::Array(Box::new(Descriptor::Class("java/lang/String".to_string())))
        );
        assert_eq!(d.to_string(), "java.lang.String[]");
    }

    #[test]
    fn parses_method_descriptor() {
        let d = Descriptor::parse("([Ljava/lang/String;)V").unwrap();
        match &d {
            Descriptor::Method { args, ret_type } => {
                assert_eq!(args.len(), 1);
                assert_eq!(**ret_type, Descriptor::Void);
            }
            _ => panic!("expected method descriptor"),
        }
        assert_eq!(d.to_string(), "void (java.lang.String[])");
    }

    #[test]
    fn referenced_class_names_collects_recursively() {
        let d = Descriptor::parse("(Ljava/util/List;[Ljava/lang/String;)Ljava/lang/Object;")
            .unwrap();
        let mut names = Vec::new();
        d.referenced_class_names(&mut names);
        assert_eq!(
            names,
            vec![
                "java/util/List".to_string(),
                "java/lang/String".to_string(),
                "java/lang/Object".to_string(),
            ]
        );
    }

    #[test]
    fn internal_name_validation() {
        assert!(is_internal_name("java/lang/Object"));
        assert!(is_internal_name("java/lang/Object$Inner"));
        assert!(!is_internal_name("1Bad"));
        assert!(!is_internal_name("java//Bad"));
    }
}
