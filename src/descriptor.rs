//! Conversion between descriptor strings and [`Type`] values, in both directions.
//!
//! Descriptors follow JVMS §4.3: one primitive letter, `L<name>;` for class types, `[` prefixes
//! for array dimensions, and `(<args>)<ret>` for methods with `V` allowed only in the return
//! position.

use crate::error::ClassError;
use crate::types::Type;

struct DescriptorReader<'a> {
    descriptor: &'a str,
    bytes: &'a [u8],
    position: usize,
}

impl<'a> DescriptorReader<'a> {
    fn new(descriptor: &'a str) -> Self {
        DescriptorReader {
            descriptor,
            bytes: descriptor.as_bytes(),
            position: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.position).copied()
    }

    fn next(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.position += 1;
        Some(byte)
    }

    fn fail(&self, reason: &'static str) -> ClassError {
        ClassError::MalformedDescriptor {
            descriptor: self.descriptor.to_owned(),
            reason,
        }
    }

    /// Reads a single field type. `void_ok` is only set for the return position of a method
    /// descriptor.
    fn read_type(&mut self, void_ok: bool) -> Result<Type, ClassError> {
        let mut dimension = 0u8;
        while self.peek() == Some(b'[') {
            self.next();
            dimension = dimension
                .checked_add(1)
                .ok_or_else(|| self.fail("array dimension overflow"))?;
        }

        let element = match self.next() {
            Some(b'B') => Type::Byte,
            Some(b'C') => Type::Char,
            Some(b'D') => Type::Double,
            Some(b'F') => Type::Float,
            Some(b'I') => Type::Int,
            Some(b'J') => Type::Long,
            Some(b'S') => Type::Short,
            Some(b'Z') => Type::Boolean,
            Some(b'V') if void_ok && dimension == 0 => Type::Void,
            Some(b'V') => return Err(self.fail("void is only valid as a return type")),
            Some(b'L') => {
                let start = self.position;
                loop {
                    match self.next() {
                        Some(b';') => break,
                        Some(_) => {}
                        None => return Err(self.fail("unterminated class type")),
                    }
                }
                let name = &self.descriptor[start..self.position - 1];
                if name.is_empty() {
                    return Err(self.fail("empty class name"));
                }
                Type::class(name)
            }
            Some(_) => return Err(self.fail("unknown type prefix")),
            None => return Err(self.fail("unexpected end of descriptor")),
        };

        if dimension > 0 {
            Ok(Type::array(element, dimension))
        } else {
            Ok(element)
        }
    }

    fn finish(&self, force_read: bool) -> Result<(), ClassError> {
        if !force_read && self.position != self.bytes.len() {
            return Err(self.fail("trailing characters after descriptor"));
        }
        Ok(())
    }
}

/// Parses a field descriptor such as `[Ljava/lang/String;`.
///
/// With `dont_throw` set this never fails: anything unrecoverable becomes the placeholder
/// [`Type::Top`]. With `force_read` set, trailing characters after a complete parse are ignored.
pub fn parse_field_descriptor(
    descriptor: &str,
    force_read: bool,
    dont_throw: bool,
) -> Result<Type, ClassError> {
    let mut reader = DescriptorReader::new(descriptor);
    let result = reader
        .read_type(false)
        .and_then(|type_| reader.finish(force_read).map(|_| type_));

    match result {
        Ok(type_) => Ok(type_),
        Err(_) if dont_throw => {
            warn!("recovering malformed field descriptor {:?}", descriptor);
            Ok(Type::Top)
        }
        Err(error) => Err(error),
    }
}

/// Parses a method descriptor such as `(I[J)Ljava/lang/Object;` into its argument types and
/// return type.
///
/// With `dont_throw` set this never fails and always yields the `(arguments, return)` pair,
/// substituting [`Type::Top`] for whatever could not be recovered.
pub fn parse_method_descriptor(
    descriptor: &str,
    force_read: bool,
    dont_throw: bool,
) -> Result<(Vec<Type>, Type), ClassError> {
    let mut reader = DescriptorReader::new(descriptor);

    let result = (|| {
        if reader.next() != Some(b'(') {
            return Err(reader.fail("method descriptor must start with '('"));
        }

        let mut arguments = Vec::new();
        loop {
            match reader.peek() {
                Some(b')') => {
                    reader.next();
                    break;
                }
                Some(_) => arguments.push(reader.read_type(false)?),
                None => return Err(reader.fail("unterminated argument list")),
            }
        }

        let return_type = reader.read_type(true)?;
        reader.finish(force_read)?;
        Ok((arguments, return_type))
    })();

    match result {
        Ok(parsed) => Ok(parsed),
        Err(_) if dont_throw => {
            warn!("recovering malformed method descriptor {:?}", descriptor);
            // Salvage whatever argument prefix parses; the return type falls back to top.
            let mut arguments = Vec::new();
            let mut reader = DescriptorReader::new(descriptor);
            if reader.next() == Some(b'(') {
                while !matches!(reader.peek(), Some(b')') | None) {
                    match reader.read_type(false) {
                        Ok(type_) => arguments.push(type_),
                        Err(_) => break,
                    }
                }
            }
            Ok((arguments, Type::Top))
        }
        Err(error) => Err(error),
    }
}

/// Prints a field type back to descriptor form. Inverse of [`parse_field_descriptor`] for every
/// type a descriptor can denote.
pub fn to_descriptor(type_: &Type) -> String {
    let mut out = String::new();
    write_descriptor(type_, &mut out);
    out
}

/// Prints a method descriptor from argument and return types.
pub fn to_method_descriptor(arguments: &[Type], return_type: &Type) -> String {
    let mut out = String::from("(");
    for argument in arguments {
        write_descriptor(argument, &mut out);
    }
    out.push(')');
    write_descriptor(return_type, &mut out);
    out
}

fn write_descriptor(type_: &Type, out: &mut String) {
    match type_ {
        Type::Byte => out.push('B'),
        Type::Char => out.push('C'),
        Type::Double => out.push('D'),
        Type::Float => out.push('F'),
        Type::Int => out.push('I'),
        Type::Long => out.push('J'),
        Type::Short => out.push('S'),
        Type::Boolean => out.push('Z'),
        Type::Void => out.push('V'),
        Type::Class(name) => {
            out.push('L');
            out.push_str(name);
            out.push(';');
        }
        Type::Array { element, dimension } => {
            for _ in 0..*dimension {
                out.push('[');
            }
            write_descriptor(element, out);
        }
        // Verification-only markers have no descriptor form; `top` doubles as the opaque
        // placeholder produced by dont_throw recovery.
        Type::Top
        | Type::Null
        | Type::UninitializedThis
        | Type::Uninitialized(_)
        | Type::ReturnAddress(_) => out.push_str("Ljava/lang/Object;"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_round_trip() {
        for descriptor in &[
            "I",
            "J",
            "Z",
            "Ljava/lang/String;",
            "[I",
            "[[Ljava/util/List;",
            "[[[D",
        ] {
            let parsed = parse_field_descriptor(descriptor, false, false).unwrap();
            assert_eq!(&to_descriptor(&parsed), descriptor);
        }
    }

    #[test]
    fn method_round_trip() {
        for descriptor in &[
            "()V",
            "(I)I",
            "(IJLjava/lang/Object;)[B",
            "([[Ljava/lang/String;)Ljava/lang/Class;",
        ] {
            let (arguments, return_type) =
                parse_method_descriptor(descriptor, false, false).unwrap();
            assert_eq!(&to_method_descriptor(&arguments, &return_type), descriptor);
        }
    }

    #[test]
    fn void_only_in_return_position() {
        assert!(parse_field_descriptor("V", false, false).is_err());
        assert!(parse_method_descriptor("(V)V", false, false).is_err());
        assert!(parse_method_descriptor("()V", false, false).is_ok());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_field_descriptor("Q", false, false).is_err());
        assert!(parse_field_descriptor("Ljava/lang/String", false, false).is_err());
        assert!(parse_field_descriptor("II", false, false).is_err());
        assert!(parse_method_descriptor("(I", false, false).is_err());
        assert!(parse_method_descriptor("I)V", false, false).is_err());
    }

    #[test]
    fn force_read_ignores_trailing() {
        assert_eq!(
            parse_field_descriptor("Itrailing", true, false).unwrap(),
            Type::Int
        );
        assert!(parse_field_descriptor("Itrailing", false, false).is_err());
    }

    #[test]
    fn dont_throw_always_recovers() {
        assert_eq!(
            parse_field_descriptor("garbage", false, true).unwrap(),
            Type::Top
        );

        let (arguments, return_type) = parse_method_descriptor("(IQ)V", false, true).unwrap();
        assert_eq!(arguments, vec![Type::Int]);
        assert_eq!(return_type, Type::Top);

        let (arguments, return_type) = parse_method_descriptor("not a descriptor", false, true).unwrap();
        assert!(arguments.is_empty());
        assert_eq!(return_type, Type::Top);
    }
}
