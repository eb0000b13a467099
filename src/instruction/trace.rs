//! Per-opcode trace contracts: how each instruction transforms an abstract [`Frame`].
//!
//! Contracts pop typed inputs, check them against the checker's policy, and push outputs with
//! provenance. A failed check is recorded and tracing continues with the instruction's declared
//! output, so one bad value surfaces every downstream error in a single pass.

use crate::analysis::frame::{Entry, Frame};
use crate::instruction::{Instruction, MemberRef};
use crate::types::{Type, OBJECT, THROWABLE};
use crate::verifier::{Error, ErrorKind, Source, TypeChecker};

impl Instruction {
    /// Applies this instruction's effect to `frame`. `this_class` is the class owning the method
    /// being traced; it decides what `uninitializedThis` initializes to.
    pub fn trace(
        &self,
        source: Source,
        frame: &mut Frame,
        this_class: Option<&Type>,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) {
        use Instruction::*;

        match self {
            nop | goto(_) | goto_w(_) | jsr(_) | jsr_w(_) | ret(_) | r#return => {}

            aconst_null => frame.push(Entry::new(Type::Null, source), source, errors),
            iconst_m1 | iconst_0 | iconst_1 | iconst_2 | iconst_3 | iconst_4 | iconst_5
            | bipush(_) | sipush(_) => frame.push(Entry::new(Type::Int, source), source, errors),
            lconst_0 | lconst_1 => frame.push(Entry::new(Type::Long, source), source, errors),
            fconst_0 | fconst_1 | fconst_2 => {
                frame.push(Entry::new(Type::Float, source), source, errors)
            }
            dconst_0 | dconst_1 => frame.push(Entry::new(Type::Double, source), source, errors),

            ldc(constant) | ldc_w(constant) => {
                if constant.category() != 1 {
                    errors.push(Error::new(
                        ErrorKind::InvalidInstruction,
                        source,
                        "ldc cannot load a category 2 constant",
                    ));
                }
                frame.push(Entry::new(constant.loaded_type(), source), source, errors);
            }
            ldc2_w(constant) => {
                if constant.category() != 2 {
                    errors.push(Error::new(
                        ErrorKind::InvalidInstruction,
                        source,
                        "ldc2_w must load a category 2 constant",
                    ));
                }
                frame.push(Entry::new(constant.loaded_type(), source), source, errors);
            }

            iload(index) => Self::trace_load(frame, *index, Type::Int, source, checker, errors),
            lload(index) => Self::trace_load(frame, *index, Type::Long, source, checker, errors),
            fload(index) => Self::trace_load(frame, *index, Type::Float, source, checker, errors),
            dload(index) => Self::trace_load(frame, *index, Type::Double, source, checker, errors),
            aload(index) => {
                let entry = frame.load_reference(*index, source, checker, errors);
                frame.push(entry, source, errors);
            }

            iaload => Self::trace_array_load(frame, Some(Type::Int), source, checker, errors),
            laload => Self::trace_array_load(frame, Some(Type::Long), source, checker, errors),
            faload => Self::trace_array_load(frame, Some(Type::Float), source, checker, errors),
            daload => Self::trace_array_load(frame, Some(Type::Double), source, checker, errors),
            aaload => Self::trace_array_load(frame, None, source, checker, errors),
            baload => Self::trace_array_load(frame, Some(Type::Byte), source, checker, errors),
            caload => Self::trace_array_load(frame, Some(Type::Char), source, checker, errors),
            saload => Self::trace_array_load(frame, Some(Type::Short), source, checker, errors),

            istore(index) => Self::trace_store(frame, *index, Type::Int, source, checker, errors),
            lstore(index) => Self::trace_store(frame, *index, Type::Long, source, checker, errors),
            fstore(index) => Self::trace_store(frame, *index, Type::Float, source, checker, errors),
            dstore(index) => {
                Self::trace_store(frame, *index, Type::Double, source, checker, errors)
            }
            astore(index) => {
                // astore also accepts return addresses, which is how subroutines save them.
                let entry = frame.pop_reference(source, checker, errors);
                frame.store(*index, entry, source, errors);
            }

            iastore => Self::trace_array_store(frame, Some(Type::Int), source, checker, errors),
            lastore => Self::trace_array_store(frame, Some(Type::Long), source, checker, errors),
            fastore => Self::trace_array_store(frame, Some(Type::Float), source, checker, errors),
            dastore => Self::trace_array_store(frame, Some(Type::Double), source, checker, errors),
            aastore => Self::trace_array_store(frame, None, source, checker, errors),
            bastore => Self::trace_array_store(frame, Some(Type::Byte), source, checker, errors),
            castore => Self::trace_array_store(frame, Some(Type::Char), source, checker, errors),
            sastore => Self::trace_array_store(frame, Some(Type::Short), source, checker, errors),

            pop => {
                frame.pop_category(1, source, checker, errors);
            }
            pop2 => {
                let top = frame.pop(source, errors);
                if top.ty.category() == 1 {
                    frame.pop_category(1, source, checker, errors);
                }
            }
            dup => Self::trace_dup(frame, 1, 0, source, errors),
            dup_x1 => Self::trace_dup(frame, 1, 1, source, errors),
            dup_x2 => Self::trace_dup(frame, 1, 2, source, errors),
            dup2 => Self::trace_dup(frame, 2, 0, source, errors),
            dup2_x1 => Self::trace_dup(frame, 2, 1, source, errors),
            dup2_x2 => Self::trace_dup(frame, 2, 2, source, errors),
            swap => {
                let first = frame.pop_category(1, source, checker, errors);
                let second = frame.pop_category(1, source, checker, errors);
                frame.push(first, source, errors);
                frame.push(second, source, errors);
            }

            iadd | isub | imul | idiv | irem | iand | ior | ixor => {
                Self::trace_binary(frame, Type::Int, source, checker, errors)
            }
            ladd | lsub | lmul | ldiv | lrem | land | lor | lxor => {
                Self::trace_binary(frame, Type::Long, source, checker, errors)
            }
            fadd | fsub | fmul | fdiv | frem => {
                Self::trace_binary(frame, Type::Float, source, checker, errors)
            }
            dadd | dsub | dmul | ddiv | drem => {
                Self::trace_binary(frame, Type::Double, source, checker, errors)
            }
            ishl | ishr | iushr => Self::trace_shift(frame, Type::Int, source, checker, errors),
            lshl | lshr | lushr => Self::trace_shift(frame, Type::Long, source, checker, errors),
            ineg => Self::trace_unary(frame, Type::Int, Type::Int, source, checker, errors),
            lneg => Self::trace_unary(frame, Type::Long, Type::Long, source, checker, errors),
            fneg => Self::trace_unary(frame, Type::Float, Type::Float, source, checker, errors),
            dneg => Self::trace_unary(frame, Type::Double, Type::Double, source, checker, errors),
            iinc { index, .. } => {
                let entry = frame.load(*index, &Type::Int, source, checker, errors);
                let mut parents = vec![entry.source];
                parents.extend(entry.parents);
                frame.store(
                    *index,
                    Entry::with_parents(Type::Int, source, parents),
                    source,
                    errors,
                );
            }

            i2l => Self::trace_unary(frame, Type::Int, Type::Long, source, checker, errors),
            i2f => Self::trace_unary(frame, Type::Int, Type::Float, source, checker, errors),
            i2d => Self::trace_unary(frame, Type::Int, Type::Double, source, checker, errors),
            l2i => Self::trace_unary(frame, Type::Long, Type::Int, source, checker, errors),
            l2f => Self::trace_unary(frame, Type::Long, Type::Float, source, checker, errors),
            l2d => Self::trace_unary(frame, Type::Long, Type::Double, source, checker, errors),
            f2i => Self::trace_unary(frame, Type::Float, Type::Int, source, checker, errors),
            f2l => Self::trace_unary(frame, Type::Float, Type::Long, source, checker, errors),
            f2d => Self::trace_unary(frame, Type::Float, Type::Double, source, checker, errors),
            d2i => Self::trace_unary(frame, Type::Double, Type::Int, source, checker, errors),
            d2l => Self::trace_unary(frame, Type::Double, Type::Long, source, checker, errors),
            d2f => Self::trace_unary(frame, Type::Double, Type::Float, source, checker, errors),
            i2b | i2c | i2s => {
                Self::trace_unary(frame, Type::Int, Type::Int, source, checker, errors)
            }

            lcmp => {
                Self::trace_compare(frame, Type::Long, source, checker, errors);
            }
            fcmpl | fcmpg => {
                Self::trace_compare(frame, Type::Float, source, checker, errors);
            }
            dcmpl | dcmpg => {
                Self::trace_compare(frame, Type::Double, source, checker, errors);
            }

            ifeq(_) | ifne(_) | iflt(_) | ifge(_) | ifgt(_) | ifle(_) => {
                frame.pop_expect(&Type::Int, source, checker, errors);
            }
            if_icmpeq(_) | if_icmpne(_) | if_icmplt(_) | if_icmpge(_) | if_icmpgt(_)
            | if_icmple(_) => {
                frame.pop_expect(&Type::Int, source, checker, errors);
                frame.pop_expect(&Type::Int, source, checker, errors);
            }
            if_acmpeq(_) | if_acmpne(_) => {
                frame.pop_reference(source, checker, errors);
                frame.pop_reference(source, checker, errors);
            }
            ifnull(_) | ifnonnull(_) => {
                frame.pop_reference(source, checker, errors);
            }

            tableswitch { .. } | lookupswitch { .. } => {
                frame.pop_expect(&Type::Int, source, checker, errors);
            }

            ireturn => {
                frame.pop_expect(&Type::Int, source, checker, errors);
            }
            lreturn => {
                frame.pop_expect(&Type::Long, source, checker, errors);
            }
            freturn => {
                frame.pop_expect(&Type::Float, source, checker, errors);
            }
            dreturn => {
                frame.pop_expect(&Type::Double, source, checker, errors);
            }
            areturn => {
                frame.pop_reference(source, checker, errors);
            }

            getstatic(member) => {
                let field_type = Self::member_field_type(member, source, errors);
                frame.push(Entry::new(field_type, source), source, errors);
            }
            putstatic(member) => {
                let field_type = Self::member_field_type(member, source, errors);
                frame.pop_expect(&field_type, source, checker, errors);
            }
            getfield(member) => {
                let field_type = Self::member_field_type(member, source, errors);
                let receiver = Self::pop_receiver(frame, member, source, checker, errors);
                frame.push(
                    Entry::with_parents(field_type, source, vec![receiver.source]),
                    source,
                    errors,
                );
            }
            putfield(member) => {
                let field_type = Self::member_field_type(member, source, errors);
                frame.pop_expect(&field_type, source, checker, errors);
                Self::pop_receiver(frame, member, source, checker, errors);
            }

            invokevirtual(member) | invokeinterface { method: member, .. } => {
                Self::trace_invoke(frame, member, true, false, this_class, source, checker, errors);
            }
            invokespecial(member) => {
                let init = member.name == "<init>";
                Self::trace_invoke(frame, member, true, init, this_class, source, checker, errors);
            }
            invokestatic(member) => {
                Self::trace_invoke(frame, member, false, false, this_class, source, checker, errors);
            }
            invokedynamic { descriptor, .. } => {
                let (arguments, returns) =
                    match crate::descriptor::parse_method_descriptor(descriptor, false, false) {
                        Ok(parsed) => parsed,
                        Err(error) => {
                            errors.push(Error::new(
                                ErrorKind::InvalidInstruction,
                                source,
                                error.to_string(),
                            ));
                            (Vec::new(), Type::Top)
                        }
                    };

                let mut parents = Vec::new();
                for argument in arguments.iter().rev() {
                    let entry = frame.pop_expect(
                        &argument.to_verification_type(),
                        source,
                        checker,
                        errors,
                    );
                    parents.push(entry.source);
                }

                if returns != Type::Void {
                    parents.reverse();
                    frame.push(
                        Entry::with_parents(returns.to_verification_type(), source, parents),
                        source,
                        errors,
                    );
                }
            }

            new(type_) => {
                if !checker.check_class(type_) {
                    errors.push(Error::new(
                        ErrorKind::InvalidType,
                        source,
                        format!("expected class or interface type, got {}", type_),
                    ));
                }
                let offset = match source {
                    Source::Instruction { offset, .. } => offset as u16,
                    _ => 0,
                };
                frame.push(Entry::new(Type::Uninitialized(offset), source), source, errors);
            }
            newarray(element) => {
                let count = frame.pop_expect(&Type::Int, source, checker, errors);
                frame.push(
                    Entry::with_parents(
                        Type::array(element.clone(), 1),
                        source,
                        vec![count.source],
                    ),
                    source,
                    errors,
                );
            }
            anewarray(array_type) => {
                let count = frame.pop_expect(&Type::Int, source, checker, errors);
                frame.push(
                    Entry::with_parents(array_type.clone(), source, vec![count.source]),
                    source,
                    errors,
                );
            }
            multianewarray {
                array_type,
                dimension,
            } => {
                let declared = match array_type {
                    Type::Array { dimension, .. } => *dimension,
                    _ => 0,
                };
                if *dimension == 0 || *dimension > declared {
                    errors.push(Error::new(
                        ErrorKind::InvalidInstruction,
                        source,
                        format!(
                            "instruction dimension exceeds array dimension, {} > {}",
                            dimension, declared
                        ),
                    ));
                }

                let mut parents = Vec::new();
                for _ in 0..*dimension {
                    let count = frame.pop_expect(&Type::Int, source, checker, errors);
                    parents.push(count.source);
                }
                frame.push(
                    Entry::with_parents(array_type.clone(), source, parents),
                    source,
                    errors,
                );
            }
            arraylength => {
                let array = frame.pop(source, errors);
                if !checker.check_array(&array.ty) {
                    errors.push(Error::new(
                        ErrorKind::InvalidType,
                        source,
                        format!("expected an array type, got {} (via {})", array.ty, array.source),
                    ));
                }
                frame.push(
                    Entry::with_parents(Type::Int, source, vec![array.source]),
                    source,
                    errors,
                );
            }
            athrow => {
                frame.pop_expect(&THROWABLE, source, checker, errors);
            }
            checkcast(type_) => {
                let value = frame.pop_reference(source, checker, errors);
                frame.push(
                    Entry::with_parents(type_.clone(), source, vec![value.source]),
                    source,
                    errors,
                );
            }
            instanceof(_) => {
                let value = frame.pop_reference(source, checker, errors);
                frame.push(
                    Entry::with_parents(Type::Int, source, vec![value.source]),
                    source,
                    errors,
                );
            }
            monitorenter | monitorexit => {
                frame.pop_reference(source, checker, errors);
            }
        }
    }

    fn trace_load(
        frame: &mut Frame,
        index: u16,
        expected: Type,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) {
        let entry = frame.load(index, &expected, source, checker, errors);
        // Keep the checked type so one bad local does not poison everything downstream.
        let ty = if checker.check_merge(&expected, &entry.ty) {
            entry.ty.clone()
        } else {
            expected
        };
        frame.push(
            Entry::with_parents(ty, entry.source, entry.parents),
            source,
            errors,
        );
    }

    fn trace_store(
        frame: &mut Frame,
        index: u16,
        expected: Type,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) {
        let entry = frame.pop_expect(&expected, source, checker, errors);
        frame.store(index, Entry::with_parents(expected, source, vec![entry.source]), source, errors);
    }

    fn trace_array_load(
        frame: &mut Frame,
        element: Option<Type>,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) {
        let index = frame.pop_expect(&Type::Int, source, checker, errors);
        let array = frame.pop(source, errors);

        let pushed = match &element {
            // Typed loads know their element; baload doubles for boolean arrays.
            Some(element) => {
                let expected = Type::array(element.clone(), 1);
                let boolean_form = Type::array(Type::Boolean, 1);
                let acceptable = checker.check_merge(&expected, &array.ty)
                    || (*element == Type::Byte && checker.check_merge(&boolean_form, &array.ty));
                if !acceptable {
                    errors.push(Error::new(
                        ErrorKind::InvalidType,
                        source,
                        format!(
                            "expected type {}, got {} (via {})",
                            expected, array.ty, array.source
                        ),
                    ));
                }
                element.to_verification_type()
            }
            None => {
                if !checker.check_array(&array.ty) {
                    errors.push(Error::new(
                        ErrorKind::InvalidType,
                        source,
                        format!(
                            "expected an array type, got {} (via {})",
                            array.ty, array.source
                        ),
                    ));
                }
                match array.ty.array_element() {
                    Some(element) => element.to_verification_type(),
                    None if array.ty == Type::Null => Type::Null,
                    None => OBJECT.clone(),
                }
            }
        };

        frame.push(
            Entry::with_parents(pushed, source, vec![array.source, index.source]),
            source,
            errors,
        );
    }

    fn trace_array_store(
        frame: &mut Frame,
        element: Option<Type>,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) {
        match &element {
            Some(element) => {
                frame.pop_expect(&element.to_verification_type(), source, checker, errors);
            }
            None => {
                frame.pop_reference(source, checker, errors);
            }
        }
        frame.pop_expect(&Type::Int, source, checker, errors);

        let array = frame.pop(source, errors);
        match &element {
            Some(element) => {
                let expected = Type::array(element.clone(), 1);
                let boolean_form = Type::array(Type::Boolean, 1);
                let acceptable = checker.check_merge(&expected, &array.ty)
                    || (*element == Type::Byte && checker.check_merge(&boolean_form, &array.ty));
                if !acceptable {
                    errors.push(Error::new(
                        ErrorKind::InvalidType,
                        source,
                        format!(
                            "expected type {}, got {} (via {})",
                            expected, array.ty, array.source
                        ),
                    ));
                }
            }
            None => {
                if !checker.check_array(&array.ty) {
                    errors.push(Error::new(
                        ErrorKind::InvalidType,
                        source,
                        format!(
                            "expected an array type, got {} (via {})",
                            array.ty, array.source
                        ),
                    ));
                }
            }
        }
    }

    /// Pops slots in the shape every dup form shares: `take` slots get duplicated underneath
    /// `skip` slots.
    fn trace_dup(frame: &mut Frame, take: u8, skip: u8, source: Source, errors: &mut Vec<Error>) {
        let pop_slots = |frame: &mut Frame, want: u8, errors: &mut Vec<Error>| -> Vec<Entry> {
            let mut taken = Vec::new();
            let mut slots = 0u8;
            while slots < want {
                let entry = frame.pop(source, errors);
                slots += entry.ty.category();
                taken.push(entry);
            }
            if slots != want {
                errors.push(Error::new(
                    ErrorKind::InvalidStack,
                    source,
                    "category 2 value split by a stack instruction",
                ));
            }
            taken
        };

        let duplicated = pop_slots(frame, take, errors);
        let skipped = pop_slots(frame, skip, errors);

        for entry in duplicated.iter().rev() {
            frame.push(entry.clone(), source, errors);
        }
        for entry in skipped.into_iter().rev() {
            frame.push(entry, source, errors);
        }
        for entry in duplicated.into_iter().rev() {
            frame.push(entry, source, errors);
        }
    }

    fn trace_binary(
        frame: &mut Frame,
        operand: Type,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) {
        let right = frame.pop_expect(&operand, source, checker, errors);
        let left = frame.pop_expect(&operand, source, checker, errors);
        frame.push(
            Entry::with_parents(operand, source, vec![left.source, right.source]),
            source,
            errors,
        );
    }

    fn trace_shift(
        frame: &mut Frame,
        operand: Type,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) {
        let amount = frame.pop_expect(&Type::Int, source, checker, errors);
        let value = frame.pop_expect(&operand, source, checker, errors);
        frame.push(
            Entry::with_parents(operand, source, vec![value.source, amount.source]),
            source,
            errors,
        );
    }

    fn trace_unary(
        frame: &mut Frame,
        from: Type,
        to: Type,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) {
        let value = frame.pop_expect(&from, source, checker, errors);
        frame.push(
            Entry::with_parents(to, source, vec![value.source]),
            source,
            errors,
        );
    }

    fn trace_compare(
        frame: &mut Frame,
        operand: Type,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) {
        let right = frame.pop_expect(&operand, source, checker, errors);
        let left = frame.pop_expect(&operand, source, checker, errors);
        frame.push(
            Entry::with_parents(Type::Int, source, vec![left.source, right.source]),
            source,
            errors,
        );
    }

    fn member_field_type(member: &MemberRef, source: Source, errors: &mut Vec<Error>) -> Type {
        match member.field_type() {
            Ok(type_) => type_.to_verification_type(),
            Err(error) => {
                errors.push(Error::new(
                    ErrorKind::InvalidInstruction,
                    source,
                    error.to_string(),
                ));
                Type::Top
            }
        }
    }

    fn pop_receiver(
        frame: &mut Frame,
        member: &MemberRef,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) -> Entry {
        let receiver = frame.pop(source, errors);
        // Field access on uninitializedThis is how constructors set up their own fields.
        let acceptable = receiver.ty == Type::UninitializedThis
            || checker.check_merge(&member.class, &receiver.ty);
        if !acceptable {
            errors.push(Error::new(
                ErrorKind::InvalidType,
                source,
                format!(
                    "expected type {}, got {} (via {})",
                    member.class, receiver.ty, receiver.source
                ),
            ));
        }
        receiver
    }

    #[allow(clippy::too_many_arguments)]
    fn trace_invoke(
        frame: &mut Frame,
        member: &MemberRef,
        instance: bool,
        init: bool,
        this_class: Option<&Type>,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) {
        let (arguments, returns) = match member.method_type() {
            Ok(parsed) => parsed,
            Err(error) => {
                errors.push(Error::new(
                    ErrorKind::InvalidInstruction,
                    source,
                    error.to_string(),
                ));
                (Vec::new(), Type::Top)
            }
        };

        let mut parents = Vec::new();
        for argument in arguments.iter().rev() {
            let entry = frame.pop_expect(&argument.to_verification_type(), source, checker, errors);
            parents.push(entry.source);
        }

        if instance {
            let receiver = frame.pop(source, errors);
            parents.push(receiver.source);

            if init {
                // Every live copy of the uninitialized value becomes the constructed type.
                match &receiver.ty {
                    Type::Uninitialized(_) => {
                        frame.replace_uninitialized(&receiver.ty, &member.class);
                    }
                    Type::UninitializedThis => {
                        let initialized = this_class.cloned().unwrap_or_else(|| member.class.clone());
                        frame.replace_uninitialized(&Type::UninitializedThis, &initialized);
                    }
                    other => {
                        errors.push(Error::new(
                            ErrorKind::InvalidType,
                            source,
                            format!(
                                "expected an uninitialized type, got {} (via {})",
                                other, receiver.source
                            ),
                        ));
                    }
                }
            } else if !checker.check_merge(&member.class, &receiver.ty) {
                errors.push(Error::new(
                    ErrorKind::InvalidType,
                    source,
                    format!(
                        "expected type {}, got {} (via {})",
                        member.class, receiver.ty, receiver.source
                    ),
                ));
            }
        }

        if returns != Type::Void {
            parents.reverse();
            frame.push(
                Entry::with_parents(returns.to_verification_type(), source, parents),
                source,
                errors,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction::*;

    fn source(offset: u32, mnemonic: &'static str) -> Source {
        Source::Instruction { offset, mnemonic }
    }

    fn run(
        instructions: &[(u32, Instruction)],
        frame: &mut Frame,
        errors: &mut Vec<Error>,
        checker: &TypeChecker,
    ) {
        for (offset, insn) in instructions {
            insn.trace(source(*offset, insn.mnemonic()), frame, None, checker, errors);
        }
    }

    #[test]
    fn constant_then_return_leaves_clean_frame() {
        let mut frame = Frame::new(1, 1);
        let mut errors = Vec::new();
        run(
            &[(0, iconst_1), (1, ireturn)],
            &mut frame,
            &mut errors,
            &TypeChecker::Strict,
        );
        assert!(errors.is_empty());
        assert!(frame.stack.is_empty());
    }

    #[test]
    fn iadd_on_reference_records_one_error_and_continues() {
        let mut frame = Frame::new(1, 2);
        let mut errors = Vec::new();
        frame.store(
            0,
            Entry::new(crate::types::OBJECT.clone(), source(0, "aload")),
            source(0, "aload"),
            &mut errors,
        );

        run(
            &[(0, iconst_1), (1, aload(0)), (2, iadd)],
            &mut frame,
            &mut errors,
            &TypeChecker::Strict,
        );

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::InvalidType);
        assert!(errors[0].to_string().contains("expected type int"));
        // Downstream sees the declared output type.
        assert_eq!(frame.stack.last().unwrap().ty, Type::Int);
    }

    #[test]
    fn new_dup_init_rewrites_all_copies() {
        let mut frame = Frame::new(2, 2);
        let mut errors = Vec::new();
        let member = MemberRef {
            class: Type::class("java/lang/Object"),
            name: "<init>".to_owned(),
            descriptor: "()V".to_owned(),
        };

        new(Type::class("java/lang/Object")).trace(
            source(0, "new"),
            &mut frame,
            None,
            &TypeChecker::Strict,
            &mut errors,
        );
        dup.trace(source(3, "dup"), &mut frame, None, &TypeChecker::Strict, &mut errors);

        assert_eq!(frame.stack[0].ty, Type::Uninitialized(0));
        assert_eq!(frame.stack[1].ty, Type::Uninitialized(0));

        invokespecial(member).trace(
            source(4, "invokespecial"),
            &mut frame,
            None,
            &TypeChecker::Strict,
            &mut errors,
        );

        assert!(errors.is_empty());
        assert_eq!(frame.stack.len(), 1);
        assert_eq!(frame.stack[0].ty, Type::class("java/lang/Object"));
    }

    #[test]
    fn uninitialized_this_initializes_to_current_class() {
        let mut frame = Frame::new(1, 1);
        let mut errors = Vec::new();
        frame.store(
            0,
            Entry::new(Type::UninitializedThis, Source::Parameter(0)),
            Source::Parameter(0),
            &mut errors,
        );

        aload(0).trace(
            source(0, "aload"),
            &mut frame,
            None,
            &TypeChecker::Strict,
            &mut errors,
        );

        let this_class = Type::class("Example");
        let super_init = MemberRef {
            class: Type::class("java/lang/Object"),
            name: "<init>".to_owned(),
            descriptor: "()V".to_owned(),
        };
        invokespecial(super_init).trace(
            source(1, "invokespecial"),
            &mut frame,
            Some(&this_class),
            &TypeChecker::Strict,
            &mut errors,
        );

        assert!(errors.is_empty());
        assert_eq!(frame.locals[0].ty, this_class);
    }

    #[test]
    fn dup_x1_and_dup2_respect_categories() {
        let mut frame = Frame::new(0, 6);
        let mut errors = Vec::new();
        let checker = TypeChecker::Strict;

        frame.push(Entry::new(Type::Int, source(0, "iconst_0")), source(0, "iconst_0"), &mut errors);
        frame.push(Entry::new(Type::Float, source(1, "fconst_0")), source(1, "fconst_0"), &mut errors);

        dup_x1.trace(source(2, "dup_x1"), &mut frame, None, &checker, &mut errors);
        let types: Vec<&Type> = frame.stack.iter().map(|entry| &entry.ty).collect();
        assert_eq!(types, vec![&Type::Float, &Type::Int, &Type::Float]);

        // dup2 of a long duplicates the single category 2 entry.
        let mut frame = Frame::new(0, 4);
        frame.push(Entry::new(Type::Long, source(0, "lconst_0")), source(0, "lconst_0"), &mut errors);
        dup2.trace(source(1, "dup2"), &mut frame, None, &checker, &mut errors);
        assert_eq!(frame.stack.len(), 2);
        assert!(errors.is_empty());
    }

    #[test]
    fn multianewarray_dimension_check() {
        let mut frame = Frame::new(0, 4);
        let mut errors = Vec::new();

        frame.push(Entry::new(Type::Int, source(0, "iconst_1")), source(0, "iconst_1"), &mut errors);
        frame.push(Entry::new(Type::Int, source(1, "iconst_1")), source(1, "iconst_1"), &mut errors);
        frame.push(Entry::new(Type::Int, source(2, "iconst_1")), source(2, "iconst_1"), &mut errors);

        multianewarray {
            array_type: Type::array(Type::Int, 2),
            dimension: 3,
        }
        .trace(source(3, "multianewarray"), &mut frame, None, &TypeChecker::Strict, &mut errors);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::InvalidInstruction);
        assert!(errors[0].message.contains("3 > 2"));
    }

    #[test]
    fn getfield_accepts_uninitialized_this_receiver() {
        let mut frame = Frame::new(0, 2);
        let mut errors = Vec::new();

        frame.push(
            Entry::new(Type::UninitializedThis, Source::Parameter(0)),
            Source::Parameter(0),
            &mut errors,
        );

        let member = MemberRef {
            class: Type::class("Example"),
            name: "field".to_owned(),
            descriptor: "I".to_owned(),
        };
        getfield(member).trace(
            source(0, "getfield"),
            &mut frame,
            None,
            &TypeChecker::Strict,
            &mut errors,
        );

        assert!(errors.is_empty());
        assert_eq!(frame.stack[0].ty, Type::Int);
    }

    #[test]
    fn invoke_pops_arguments_in_order() {
        let mut frame = Frame::new(0, 4);
        let mut errors = Vec::new();

        frame.push(
            Entry::new(Type::class("java/io/PrintStream"), source(0, "getstatic")),
            source(0, "getstatic"),
            &mut errors,
        );
        frame.push(
            Entry::new(crate::types::STRING.clone(), source(1, "ldc")),
            source(1, "ldc"),
            &mut errors,
        );

        let member = MemberRef {
            class: Type::class("java/io/PrintStream"),
            name: "println".to_owned(),
            descriptor: "(Ljava/lang/String;)V".to_owned(),
        };
        invokevirtual(member).trace(
            source(2, "invokevirtual"),
            &mut frame,
            None,
            &TypeChecker::Strict,
            &mut errors,
        );

        assert!(errors.is_empty());
        assert!(frame.stack.is_empty());
    }
}
