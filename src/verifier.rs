//! The type checker policies, the verification error model, and the verifier entry points that
//! tie parsing, graph construction, tracing and stack map emission together.

use std::fmt::{self, Display, Formatter};

use crate::analysis::{trace, EdgeKind, Frame, Graph};
use crate::class::attribute::{CodeAttribute, StackMapFrame, StackMapTable};
use crate::class::constant::ConstantPool;
use crate::class::{ClassFile, MethodInfo};
use crate::error::ClassError;
use crate::types::Type;

/// Where a traced value or a verification error came from. Deliberately small and copyable so
/// every stack entry can carry one for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// A method parameter (or `this`) placed in the initial frame.
    Parameter(u16),
    /// An instruction, identified by its bytecode offset.
    Instruction { offset: u32, mnemonic: &'static str },
    /// A merge of multiple flows at the start of the given block.
    Merge { block: u32 },
    /// The exception pushed on entry to a handler block.
    CaughtException { block: u32 },
    /// The return address pushed for a subroutine called from the given block.
    JsrPush { block: u32 },
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Source::Parameter(index) => write!(f, "parameter {}", index),
            Source::Instruction { offset, mnemonic } => write!(f, "{} @ {}", mnemonic, offset),
            Source::Merge { block } => write!(f, "merge at block {}", block),
            Source::CaughtException { block } => write!(f, "handler entry of block {}", block),
            Source::JsrPush { block } => write!(f, "jsr return to block {}", block),
        }
    }
}

/// The kind of a recoverable verification error. Fatal structural problems are [`ClassError`]s
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A value had a type the instruction cannot accept.
    InvalidType,
    /// Stack underflow/overflow or a category violation on the operand stack.
    InvalidStack,
    /// A local variable index out of range or holding the wrong category.
    InvalidLocal,
    /// An instruction that is inconsistent with itself, e.g. a multianewarray dimension
    /// exceeding its type.
    InvalidInstruction,
}

/// An error that has occurred during the bytecode analysis, typically due to invalid bytecode.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub source: Option<Source>,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, source: impl Into<Option<Source>>, message: impl Into<String>) -> Self {
        Error {
            kind,
            source: source.into(),
            message: message.into(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "error at {}: {}", source, self.message),
            None => write!(f, "error: {}", self.message),
        }
    }
}

/// The exception to return when verification fails.
#[derive(Debug)]
pub struct VerifyError {
    pub errors: Vec<Error>,
}

impl VerifyError {
    pub fn new(errors: Vec<Error>) -> Self {
        VerifyError { errors }
    }

    /// Folds a fatal decode/structure error in after whatever was collected before it.
    pub fn with_fatal(mut errors: Vec<Error>, fatal: ClassError) -> Self {
        errors.push(Error::new(ErrorKind::InvalidInstruction, None, fatal.to_string()));
        VerifyError { errors }
    }
}

impl Display for VerifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} verification error(s):", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for VerifyError {}

/// The merging and assignability policy used by the trace engine. `None` accepts everything and
/// is useful when tracing is wanted without verification; `Permissive` checks shapes and
/// categories but trusts any class-to-class assignment (no hierarchy oracle is consulted);
/// `Strict` additionally constrains array assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeChecker {
    Strict,
    Permissive,
    None,
}

impl TypeChecker {
    /// Checks if `actual` is assignable to `expected` (AKA the types can be merged).
    pub fn check_merge(&self, expected: &Type, actual: &Type) -> bool {
        match self {
            TypeChecker::None => true,
            TypeChecker::Permissive => Self::assignable(expected, actual, false),
            TypeChecker::Strict => Self::assignable(expected, actual, true),
        }
    }

    fn assignable(expected: &Type, actual: &Type, strict: bool) -> bool {
        if expected == actual {
            return true;
        }

        match (expected, actual) {
            // top accepts anything; reading it back is what fails.
            (Type::Top, _) => true,
            (_, Type::Null) => expected.is_reference(),
            (Type::Class(name), _) if name == "java/lang/Object" => actual.is_reference(),
            (Type::Class(_), Type::Class(_)) => true,
            (Type::Class(name), Type::Array { .. }) => {
                // Arrays implement only these three class types.
                !strict
                    || name == "java/lang/Cloneable"
                    || name == "java/io/Serializable"
            }
            (Type::Array { element, dimension }, Type::Array { element: actual_element, dimension: actual_dimension }) => {
                if strict {
                    match (dimension, actual_dimension) {
                        (d, a) if d == a => match (&**element, &**actual_element) {
                            (Type::Class(_), other) => other.is_reference() || matches!(other, Type::Class(_)),
                            (expected, actual) => expected == actual,
                        },
                        // A deeper array is assignable to a shallower array of references.
                        (d, a) if a > d => matches!(&**element, Type::Class(_)),
                        _ => false,
                    }
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    /// Checks that the provided type is a reference type.
    pub fn check_reference(&self, actual: &Type) -> bool {
        match self {
            TypeChecker::None => true,
            _ => actual.is_reference() || matches!(actual, Type::ReturnAddress(_)),
        }
    }

    /// Checks that the provided type is assignable to an array type.
    pub fn check_array(&self, actual: &Type) -> bool {
        match self {
            TypeChecker::None => true,
            _ => actual.is_array(),
        }
    }

    /// Checks that the provided type is a class or interface type.
    pub fn check_class(&self, actual: &Type) -> bool {
        match self {
            TypeChecker::None => true,
            _ => actual.is_class_or_interface() || actual.is_array(),
        }
    }

    /// Checks that a given type is of a certain category (internal size).
    pub fn check_category(&self, actual: &Type, category: u8) -> bool {
        match self {
            TypeChecker::None => true,
            _ => actual.category() == category || *actual == Type::Top,
        }
    }

    /// Merges the two provided types into their least upper bound.
    pub fn merge(&self, expected: &Type, actual: &Type) -> Type {
        if let TypeChecker::None = self {
            // Assume that the actual type is always correct.
            return actual.clone();
        }

        if expected == actual {
            return expected.clone();
        }

        match (expected, actual) {
            (Type::Null, other) if other.is_reference() => other.clone(),
            (other, Type::Null) if other.is_reference() => other.clone(),
            (Type::ReturnAddress(left), Type::ReturnAddress(right)) => {
                // Preserve the full set of possible return sites.
                let mut labels = left.clone();
                for label in right {
                    if !labels.contains(label) {
                        labels.push(*label);
                    }
                }
                labels.sort_unstable();
                Type::ReturnAddress(labels)
            }
            (
                Type::Array { element, dimension },
                Type::Array {
                    element: actual_element,
                    dimension: actual_dimension,
                },
            ) => {
                if dimension == actual_dimension {
                    match self.merge(element, actual_element) {
                        // Primitive element mismatch; the only common supertype is Object.
                        Type::Top => crate::types::OBJECT.clone(),
                        merged => Type::array(merged, *dimension),
                    }
                } else {
                    crate::types::OBJECT.clone()
                }
            }
            (left, right) if left.is_reference() && right.is_reference() => {
                // Without a class hierarchy the closest common supertype of two distinct
                // references is java/lang/Object; uninitialized values never merge.
                match (left, right) {
                    (Type::Uninitialized(_), _)
                    | (_, Type::Uninitialized(_))
                    | (Type::UninitializedThis, _)
                    | (_, Type::UninitializedThis) => Type::Top,
                    _ => crate::types::OBJECT.clone(),
                }
            }
            _ => Type::Top,
        }
    }
}

/// Folds a frame's locals down to verification units: a category 2 value is one unit covering
/// two slots, and trailing `top` units are dropped since absent locals are implicitly unusable.
fn compress_locals(frame: &Frame) -> Vec<Type> {
    let mut units = Vec::with_capacity(frame.locals.len());
    let mut slot = 0;
    while slot < frame.locals.len() {
        let ty = frame.locals[slot].ty.to_verification_type();
        slot += ty.category() as usize;
        units.push(ty);
    }

    while units.last() == Some(&Type::Top) {
        units.pop();
    }
    units
}

fn compress_stack(frame: &Frame) -> Vec<Type> {
    frame
        .stack
        .iter()
        .map(|entry| entry.ty.to_verification_type())
        .collect()
}

/// Builds the delta-compressed table from absolute `(offset, frame)` pairs, choosing the
/// narrowest shape for each frame relative to the one before it. The first frame's delta is its
/// offset; every following frame encodes `offset - previous - 1`.
pub fn build_stack_map(initial: &Frame, frames: &[(u32, &Frame)]) -> StackMapTable {
    let mut table = StackMapTable::default();
    let mut previous_locals = compress_locals(initial);
    let mut previous_offset: Option<u32> = None;

    for (offset, frame) in frames {
        let offset_delta = match previous_offset {
            None => *offset,
            Some(previous) => offset - previous - 1,
        } as u16;

        let locals = compress_locals(frame);
        let stack = compress_stack(frame);

        let frame = if stack.is_empty() && locals == previous_locals {
            if offset_delta <= 63 {
                StackMapFrame::Same { offset_delta }
            } else {
                StackMapFrame::SameExtended { offset_delta }
            }
        } else if stack.len() == 1 && locals == previous_locals {
            if offset_delta <= 63 {
                StackMapFrame::SameLocals1StackItem {
                    offset_delta,
                    stack_item: stack[0].clone(),
                }
            } else {
                StackMapFrame::SameLocals1StackItemExtended {
                    offset_delta,
                    stack_item: stack[0].clone(),
                }
            }
        } else if stack.is_empty()
            && locals.len() < previous_locals.len()
            && previous_locals.len() - locals.len() <= 3
            && previous_locals[..locals.len()] == locals[..]
        {
            StackMapFrame::Chop {
                offset_delta,
                chopped: (previous_locals.len() - locals.len()) as u8,
            }
        } else if stack.is_empty()
            && locals.len() > previous_locals.len()
            && locals.len() - previous_locals.len() <= 3
            && locals[..previous_locals.len()] == previous_locals[..]
        {
            StackMapFrame::Append {
                offset_delta,
                locals: locals[previous_locals.len()..].to_vec(),
            }
        } else {
            StackMapFrame::Full {
                offset_delta,
                locals: locals.clone(),
                stack,
            }
        };

        table.frames.push(frame);
        previous_locals = locals;
        previous_offset = Some(*offset);
    }

    table
}

/// The initial frame of a method: `this` (or `uninitializedThis` in `<init>`) followed by the
/// declared parameters.
pub fn initial_frame(
    class_name: &str,
    method: &MethodInfo,
    pool: &ConstantPool,
    code: &CodeAttribute,
    errors: &mut Vec<Error>,
) -> Result<Frame, ClassError> {
    let (arguments, _) = method.descriptor(pool)?;

    let this_type = if method.is_static() {
        None
    } else if method.name(pool)? == "<init>" && class_name != "java/lang/Object" {
        Some(Type::UninitializedThis)
    } else {
        Some(Type::class(class_name))
    };

    Ok(Frame::initial(
        code.max_locals,
        code.max_stack,
        this_type,
        &arguments,
        errors,
    ))
}

/// Whether a block needs a stack map entry: it is the target of an explicit transfer (jump,
/// switch, subroutine return, exception) or has multiple incoming flows.
fn needs_map_entry(graph: &Graph, label: crate::analysis::Label) -> bool {
    let mut incoming_flow = 0usize;
    for edge in graph.in_edges(label) {
        match edge.kind {
            EdgeKind::Fallthrough => incoming_flow += 1,
            EdgeKind::JsrFallthrough(_) => {}
            _ => return true,
        }
    }
    incoming_flow >= 2
}

/// Verifies one method and, on success, regenerates its `StackMapTable` and observed stack
/// bounds in place. Methods without code verify trivially.
pub fn verify_method(
    class: &mut ClassFile,
    method_index: usize,
    checker: TypeChecker,
) -> Result<(), VerifyError> {
    let class_name = match class.name() {
        Ok(name) => name.to_owned(),
        Err(fatal) => return Err(VerifyError::with_fatal(Vec::new(), fatal)),
    };

    let method = &class.methods[method_index];
    if method.is_abstract_or_native() {
        return Ok(());
    }

    let mut code = match method.code(&class.constant_pool) {
        Ok(Some(code)) => code,
        Ok(None) => return Ok(()),
        Err(fatal) => return Err(VerifyError::with_fatal(Vec::new(), fatal)),
    };

    debug!(
        "verifying {}.{}",
        class_name,
        method.name(&class.constant_pool).unwrap_or("<unreadable>")
    );

    let mut errors = Vec::new();
    let initial = match initial_frame(&class_name, method, &class.constant_pool, &code, &mut errors)
    {
        Ok(frame) => frame,
        Err(fatal) => return Err(VerifyError::with_fatal(errors, fatal)),
    };

    let mut graph = match Graph::build(&code) {
        Ok(graph) => graph,
        Err(fatal) => return Err(VerifyError::with_fatal(errors, fatal)),
    };

    let this_type = Type::class(class_name);
    let result = match trace(&mut graph, initial, Some(&this_type), &checker) {
        Ok(result) => result,
        Err(mut failure) => {
            errors.append(&mut failure.errors);
            return Err(VerifyError::new(errors));
        }
    };

    errors.extend(result.errors);
    if !errors.is_empty() {
        return Err(VerifyError::new(errors));
    }

    // The map cannot express return addresses, and pre-Java-6 files do not carry one at all.
    let uses_subroutines = graph
        .edges()
        .iter()
        .any(|edge| matches!(edge.kind, EdgeKind::JsrJump(_) | EdgeKind::Ret { .. }));
    let wants_map = class.version >= crate::class::ClassVersion::STACK_MAP_TABLE && !uses_subroutines;

    // Dry-run the encoder to learn where every instruction lands; `add` is idempotent so the
    // later real encode sees identical pool indices.
    let (_, mapping) =
        match crate::instruction::write_code(&mut class.constant_pool, &code.code, code.code_length)
        {
            Ok(encoded) => encoded,
            Err(fatal) => return Err(VerifyError::with_fatal(Vec::new(), fatal)),
        };

    let mut map_points: Vec<(u32, &Frame)> = Vec::new();
    if wants_map {
        for block in graph.blocks() {
            if block.instructions.is_empty() {
                continue;
            }
            if !needs_map_entry(&graph, block.label) {
                continue;
            }
            let frame = match result.merged.get(&block.label) {
                Some(frame) => frame,
                // Dead blocks have no frame and need no entry.
                None => continue,
            };
            let offset = block.start_offset().expect("real blocks have offsets");
            let offset = *mapping.get(&offset).unwrap_or(&offset);
            map_points.push((offset, frame));
        }
        map_points.sort_by_key(|(offset, _)| *offset);
    }

    let initial_for_map = result
        .merged
        .get(&graph.entry())
        .cloned()
        .unwrap_or_else(|| Frame::new(code.max_locals, code.max_stack));

    let mut table = build_stack_map(&initial_for_map, &map_points);
    crate::class::attribute::remap_stack_map(&mut table, &mapping);

    code.max_stack = result.max_stack;
    code.max_locals = code.max_locals.max(result.max_locals);

    let outcome = code
        .set_stack_map_table(&mut class.constant_pool, table)
        .and_then(|_| {
            let pool = &mut class.constant_pool;
            class.methods[method_index].set_code(pool, &code)
        });

    match outcome {
        Ok(()) => Ok(()),
        Err(fatal) => Err(VerifyError::with_fatal(Vec::new(), fatal)),
    }
}

/// Verifies every concrete method of a class, accumulating errors across methods.
pub fn verify_class(class: &mut ClassFile, checker: TypeChecker) -> Result<(), VerifyError> {
    let mut errors = Vec::new();

    for index in 0..class.methods.len() {
        if let Err(failure) = verify_method(class, index, checker) {
            errors.extend(failure.errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(VerifyError::new(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OBJECT;

    #[test]
    fn error_display_formats() {
        let error = Error::new(
            ErrorKind::InvalidType,
            Source::Instruction {
                offset: 2,
                mnemonic: "iadd",
            },
            "expected type int, got java/lang/Object",
        );
        assert_eq!(
            error.to_string(),
            "error at iadd @ 2: expected type int, got java/lang/Object"
        );

        let sourceless = Error::new(ErrorKind::InvalidStack, None, "stack underflow");
        assert_eq!(sourceless.to_string(), "error: stack underflow");
    }

    #[test]
    fn verify_error_display() {
        let error = VerifyError::new(vec![
            Error::new(ErrorKind::InvalidStack, None, "one"),
            Error::new(ErrorKind::InvalidLocal, None, "two"),
        ]);
        let rendered = error.to_string();
        assert!(rendered.starts_with("2 verification error(s):"));
        assert_eq!(rendered.lines().count(), 3);
    }

    #[test]
    fn none_checker_accepts_everything() {
        let checker = TypeChecker::None;
        assert!(checker.check_merge(&Type::Int, &OBJECT));
        assert!(checker.check_category(&Type::Int, 2));
        assert_eq!(checker.merge(&Type::Int, &Type::Float), Type::Float);
    }

    #[test]
    fn strict_assignability() {
        let checker = TypeChecker::Strict;
        assert!(checker.check_merge(&OBJECT, &Type::Null));
        assert!(checker.check_merge(&OBJECT, &Type::array(Type::Int, 1)));
        assert!(checker.check_merge(&Type::class("java/io/Serializable"), &Type::array(Type::Int, 1)));
        assert!(!checker.check_merge(&Type::class("java/lang/String"), &Type::array(Type::Int, 1)));
        assert!(!checker.check_merge(&Type::Int, &OBJECT));
        assert!(!checker.check_merge(&Type::Long, &Type::Int));
    }

    #[test]
    fn merge_is_commutative_and_idempotent() {
        let checker = TypeChecker::Strict;
        let samples = [
            Type::Int,
            Type::Long,
            Type::Null,
            OBJECT.clone(),
            Type::class("java/lang/String"),
            Type::array(Type::Int, 1),
            Type::array(Type::class("java/lang/String"), 1),
            Type::Top,
            Type::Uninitialized(4),
        ];

        for left in &samples {
            assert_eq!(checker.merge(left, left), *left);
            for right in &samples {
                assert_eq!(checker.merge(left, right), checker.merge(right, left));
            }
        }
    }

    #[test]
    fn merge_of_distinct_classes_is_object() {
        let checker = TypeChecker::Strict;
        assert_eq!(
            checker.merge(&Type::class("java/lang/String"), &Type::class("java/lang/Integer")),
            *OBJECT
        );
        assert_eq!(checker.merge(&Type::Int, &Type::Float), Type::Top);
        assert_eq!(checker.merge(&Type::Null, &OBJECT), *OBJECT);
        assert_eq!(checker.merge(&Type::Uninitialized(3), &OBJECT), Type::Top);
    }

    #[test]
    fn return_address_merge_unions_labels() {
        let checker = TypeChecker::Strict;
        let merged = checker.merge(&Type::return_address(4), &Type::return_address(2));
        assert_eq!(merged, Type::ReturnAddress(vec![2, 4]));
    }

    use crate::class::{AccessFlags, ClassVersion};
    use crate::instruction::Instruction::{self, *};

    fn class_with_method(
        descriptor: &str,
        flags: AccessFlags,
        max_stack: u16,
        max_locals: u16,
        code: Vec<(u32, Instruction)>,
        code_length: u32,
    ) -> ClassFile {
        let mut pool = ConstantPool::new();
        let this_class = pool.add_class("Example");
        let super_class = pool.add_class("java/lang/Object");
        let name_index = pool.add_utf8("target");
        let descriptor_index = pool.add_utf8(descriptor);

        let attribute = CodeAttribute {
            max_stack,
            max_locals,
            code,
            code_length,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        };

        let mut method = MethodInfo {
            access_flags: flags,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        };
        method.set_code(&mut pool, &attribute).unwrap();

        ClassFile {
            version: ClassVersion::new(52, 0),
            constant_pool: pool,
            access_flags: AccessFlags::PUBLIC | AccessFlags::SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: vec![method],
            attributes: Vec::new(),
        }
    }

    #[test]
    fn single_block_method_gets_no_map() {
        let mut class = class_with_method(
            "()I",
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            1,
            1,
            vec![(0, iconst_1), (1, ireturn)],
            2,
        );

        verify_method(&mut class, 0, TypeChecker::Strict).unwrap();

        let code = class.methods[0].code(&class.constant_pool).unwrap().unwrap();
        assert!(code.stack_map_table(&class.constant_pool).unwrap().is_none());
        assert_eq!(code.max_stack, 1);
    }

    #[test]
    fn branch_join_emits_same_frame() {
        // aload_0; ifnull 6; iconst_0; ireturn; 6: iconst_1; ireturn
        let mut class = class_with_method(
            "(Ljava/lang/Object;)I",
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            1,
            1,
            vec![
                (0, aload(0)),
                (1, ifnull(5)),
                (4, iconst_0),
                (5, ireturn),
                (6, iconst_1),
                (7, ireturn),
            ],
            8,
        );

        verify_method(&mut class, 0, TypeChecker::Strict).unwrap();

        let code = class.methods[0].code(&class.constant_pool).unwrap().unwrap();
        let table = code.stack_map_table(&class.constant_pool).unwrap().unwrap();
        assert_eq!(
            table.frames,
            vec![StackMapFrame::Same { offset_delta: 6 }]
        );
        assert_eq!(table.offsets(), vec![6]);
    }

    #[test]
    fn bad_types_produce_a_verify_error() {
        let mut class = class_with_method(
            "(Ljava/lang/Object;)I",
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            2,
            1,
            vec![(0, iconst_1), (1, aload(0)), (2, iadd), (3, ireturn)],
            4,
        );

        let failure = verify_method(&mut class, 0, TypeChecker::Strict).unwrap_err();
        assert_eq!(failure.errors.len(), 1);
        let rendered = failure.to_string();
        assert!(rendered.starts_with("1 verification error(s):"));
        assert!(rendered.contains("error at iadd @ 2"));
    }

    #[test]
    fn uninitialized_value_reaches_the_map() {
        // 0: new Example2; 3: aload_0; 4: ifnull 8; 7: nop; 8: dup; 9: invokespecial <init>;
        // 12: pop; 13: return
        let init = crate::instruction::MemberRef {
            class: Type::class("Example2"),
            name: "<init>".to_owned(),
            descriptor: "()V".to_owned(),
        };
        let mut class = class_with_method(
            "(Ljava/lang/Object;)V",
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            2,
            1,
            vec![
                (0, new(Type::class("Example2"))),
                (3, aload(0)),
                (4, ifnull(4)),
                (7, nop),
                (8, dup),
                (9, invokespecial(init)),
                (12, pop),
                (13, r#return),
            ],
            14,
        );

        verify_method(&mut class, 0, TypeChecker::Strict).unwrap();

        let code = class.methods[0].code(&class.constant_pool).unwrap().unwrap();
        let table = code.stack_map_table(&class.constant_pool).unwrap().unwrap();
        assert_eq!(
            table.frames,
            vec![StackMapFrame::SameLocals1StackItem {
                offset_delta: 8,
                stack_item: Type::Uninitialized(0),
            }]
        );
    }

    #[test]
    fn verify_class_walks_all_methods() {
        let mut class = class_with_method(
            "()I",
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            1,
            1,
            vec![(0, iconst_1), (1, ireturn)],
            2,
        );
        verify_class(&mut class, TypeChecker::Strict).unwrap();
    }

    #[test]
    fn build_stack_map_chooses_narrow_shapes() {
        let mut errors = Vec::new();
        let initial = Frame::initial(2, 2, None, &[Type::Int], &mut errors);

        // Same locals, empty stack at 10; appended long at 40; full change at 120.
        let same = initial.clone();

        let mut appended = initial.clone();
        appended.store(
            1,
            crate::analysis::Entry::new(Type::Float, Source::Parameter(1)),
            Source::Parameter(1),
            &mut errors,
        );

        let mut full = Frame::new(4, 4);
        full.push(
            crate::analysis::Entry::new(Type::Int, Source::Parameter(0)),
            Source::Parameter(0),
            &mut errors,
        );
        full.push(
            crate::analysis::Entry::new(Type::Int, Source::Parameter(0)),
            Source::Parameter(0),
            &mut errors,
        );

        let table = build_stack_map(
            &initial,
            &[(10, &same), (40, &appended), (120, &full)],
        );

        assert_eq!(table.frames.len(), 3);
        assert_eq!(table.frames[0], StackMapFrame::Same { offset_delta: 10 });
        assert_eq!(
            table.frames[1],
            StackMapFrame::Append {
                offset_delta: 29,
                locals: vec![Type::Float],
            }
        );
        assert!(matches!(table.frames[2], StackMapFrame::Full { .. }));
        assert_eq!(table.offsets(), vec![10, 40, 120]);
    }
}
