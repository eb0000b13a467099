//! The abstract operand stack and local variable state propagated by the trace engine.

use crate::types::Type;
use crate::verifier::{Error, ErrorKind, Source, TypeChecker};

/// A value on the stack or in a local, together with where it came from. `parents` are the
/// operand sources the value was computed from, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub ty: Type,
    pub source: Source,
    pub parents: Vec<Source>,
}

impl Entry {
    pub fn new(ty: Type, source: Source) -> Self {
        Entry {
            ty,
            source,
            parents: Vec::new(),
        }
    }

    pub fn with_parents(ty: Type, source: Source, parents: Vec<Source>) -> Self {
        Entry { ty, source, parents }
    }
}

/// A point-in-time abstract state. Stack entries hold one value each (a category 2 value counts
/// as two slots towards the height); locals are per-slot, with the reserved upper slot of a
/// category 2 value holding `top`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub locals: Vec<Entry>,
    pub stack: Vec<Entry>,
    pub max_locals: u16,
    pub max_stack: u16,
}

impl Frame {
    pub fn new(max_locals: u16, max_stack: u16) -> Self {
        Frame {
            locals: Vec::new(),
            stack: Vec::new(),
            max_locals,
            max_stack,
        }
    }

    /// Builds the frame a method starts in: `this` (or `uninitializedThis` inside `<init>`)
    /// followed by the declared parameters, empty stack.
    pub fn initial(
        max_locals: u16,
        max_stack: u16,
        this_type: Option<Type>,
        arguments: &[Type],
        errors: &mut Vec<Error>,
    ) -> Self {
        let mut frame = Frame::new(max_locals, max_stack);
        let mut slot = 0u16;

        if let Some(this) = this_type {
            frame.set_local(slot, Entry::new(this, Source::Parameter(0)));
            slot += 1;
        }

        for argument in arguments {
            let ty = argument.to_verification_type();
            let category = ty.category();
            frame.set_local(slot, Entry::new(ty, Source::Parameter(slot)));
            slot += category as u16;
        }

        if slot > max_locals {
            errors.push(Error::new(
                ErrorKind::InvalidLocal,
                None,
                format!(
                    "method parameters need {} local slots, max_locals is {}",
                    slot, max_locals
                ),
            ));
        }

        frame
    }

    fn set_local(&mut self, index: u16, entry: Entry) {
        let category = entry.ty.category();
        let needed = index as usize + category as usize;
        if self.locals.len() < needed {
            let filler = Entry::new(Type::Top, entry.source);
            self.locals.resize(needed, filler);
        }

        if category == 2 {
            self.locals[index as usize + 1] = Entry::new(Type::Top, entry.source);
        }
        self.locals[index as usize] = entry;
    }

    /// The operand stack height in slots.
    pub fn stack_size(&self) -> u16 {
        self.stack.iter().map(|entry| entry.ty.category() as u16).sum()
    }

    pub fn push(&mut self, entry: Entry, source: Source, errors: &mut Vec<Error>) {
        if self.stack_size() + entry.ty.category() as u16 > self.max_stack {
            errors.push(Error::new(
                ErrorKind::InvalidStack,
                source,
                format!("stack overflow, max_stack is {}", self.max_stack),
            ));
        }
        self.stack.push(entry);
    }

    /// Pops a single value of any type. Underflow is recorded and a `top` placeholder returned so
    /// tracing can continue.
    pub fn pop(&mut self, source: Source, errors: &mut Vec<Error>) -> Entry {
        match self.stack.pop() {
            Some(entry) => entry,
            None => {
                errors.push(Error::new(
                    ErrorKind::InvalidStack,
                    source,
                    "stack underflow",
                ));
                Entry::new(Type::Top, source)
            }
        }
    }

    /// Pops a value that must have the given category.
    pub fn pop_category(
        &mut self,
        category: u8,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) -> Entry {
        let entry = self.pop(source, errors);
        if !checker.check_category(&entry.ty, category) {
            errors.push(Error::new(
                ErrorKind::InvalidStack,
                source,
                format!(
                    "expected a category {} value, got {} (via {})",
                    category, entry.ty, entry.source
                ),
            ));
        }
        entry
    }

    /// Pops a value checked against an expected type; a mismatch is recorded but the popped
    /// entry is still returned so later errors are found too.
    pub fn pop_expect(
        &mut self,
        expected: &Type,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) -> Entry {
        let entry = self.pop(source, errors);
        if !checker.check_merge(expected, &entry.ty) {
            errors.push(Error::new(
                ErrorKind::InvalidType,
                source,
                format!(
                    "expected type {}, got {} (via {})",
                    expected, entry.ty, entry.source
                ),
            ));
        }
        entry
    }

    /// Pops a value that must be a reference (or a return address for `astore`).
    pub fn pop_reference(
        &mut self,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) -> Entry {
        let entry = self.pop(source, errors);
        if !checker.check_reference(&entry.ty) {
            errors.push(Error::new(
                ErrorKind::InvalidType,
                source,
                format!("expected a reference type, got {} (via {})", entry.ty, entry.source),
            ));
        }
        entry
    }

    /// Reads a local, checking bounds and that the slot is not the upper half of a category 2
    /// value.
    pub fn load(
        &mut self,
        index: u16,
        expected: &Type,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) -> Entry {
        if index >= self.max_locals {
            errors.push(Error::new(
                ErrorKind::InvalidLocal,
                source,
                format!("local index {} out of range, max_locals is {}", index, self.max_locals),
            ));
            return Entry::new(Type::Top, source);
        }

        let entry = match self.locals.get(index as usize) {
            Some(entry) => entry.clone(),
            None => Entry::new(Type::Top, source),
        };

        if !checker.check_merge(expected, &entry.ty) {
            errors.push(Error::new(
                ErrorKind::InvalidType,
                source,
                format!(
                    "expected type {} in local {}, got {} (via {})",
                    expected, index, entry.ty, entry.source
                ),
            ));
        }

        entry
    }

    /// Reads a local holding a reference or return address (for `aload`/`ret`).
    pub fn load_reference(
        &mut self,
        index: u16,
        source: Source,
        checker: &TypeChecker,
        errors: &mut Vec<Error>,
    ) -> Entry {
        if index >= self.max_locals {
            errors.push(Error::new(
                ErrorKind::InvalidLocal,
                source,
                format!("local index {} out of range, max_locals is {}", index, self.max_locals),
            ));
            return Entry::new(Type::Top, source);
        }

        let entry = match self.locals.get(index as usize) {
            Some(entry) => entry.clone(),
            None => Entry::new(Type::Top, source),
        };

        if !checker.check_reference(&entry.ty) {
            errors.push(Error::new(
                ErrorKind::InvalidType,
                source,
                format!(
                    "expected a reference type in local {}, got {} (via {})",
                    index, entry.ty, entry.source
                ),
            ));
        }

        entry
    }

    /// Writes a local. Storing over the low half of an existing category 2 pair invalidates the
    /// pair; storing a category 2 value claims the following slot as well.
    pub fn store(&mut self, index: u16, entry: Entry, source: Source, errors: &mut Vec<Error>) {
        let category = entry.ty.category();
        if index as usize + category as usize > self.max_locals as usize {
            errors.push(Error::new(
                ErrorKind::InvalidLocal,
                source,
                format!("local index {} out of range, max_locals is {}", index, self.max_locals),
            ));
            return;
        }

        // Overwriting the second slot of a live long/double kills the whole pair.
        if index > 0 {
            if let Some(previous) = self.locals.get_mut(index as usize - 1) {
                if previous.ty.category() == 2 {
                    previous.ty = Type::Top;
                }
            }
        }

        self.set_local(index, entry);
    }

    /// Substitutes every live occurrence of an uninitialized type with the initialized class
    /// type, across both locals and stack. Run on the post-frame of the `<init>` call.
    pub fn replace_uninitialized(&mut self, from: &Type, to: &Type) {
        for entry in self.locals.iter_mut().chain(self.stack.iter_mut()) {
            if entry.ty == *from {
                entry.ty = to.clone();
            }
        }
    }

    /// Finds the local slot holding a return address, for resolving `ret` edges.
    pub fn return_address_at(&self, index: u16) -> Option<&[u32]> {
        match self.locals.get(index as usize) {
            Some(Entry {
                ty: Type::ReturnAddress(labels),
                ..
            }) => Some(labels),
            _ => None,
        }
    }

    /// Clears a consumed return address so it cannot be reused after the subroutine returns.
    pub fn clear_return_address(&mut self, index: u16) {
        if let Some(entry) = self.locals.get_mut(index as usize) {
            if matches!(entry.ty, Type::ReturnAddress(_)) {
                entry.ty = Type::Top;
            }
        }
    }

    /// Merges an incoming frame into this one point-wise and reports whether anything changed.
    /// Stack shapes must agree; a mismatch is recorded and the incoming flow ignored.
    pub fn merge(
        &mut self,
        incoming: &Frame,
        checker: &TypeChecker,
        block: u32,
        errors: &mut Vec<Error>,
    ) -> bool {
        if self.stack.len() != incoming.stack.len() || self.stack_size() != incoming.stack_size() {
            errors.push(Error::new(
                ErrorKind::InvalidStack,
                Source::Merge { block },
                format!(
                    "stack height mismatch: {} slots vs {} slots",
                    self.stack_size(),
                    incoming.stack_size()
                ),
            ));
            return false;
        }

        let mut changed = false;

        for (index, (existing, incoming)) in
            self.stack.iter_mut().zip(incoming.stack.iter()).enumerate()
        {
            let merged = Self::merge_slot(existing, incoming, checker, block);
            if merged.ty != existing.ty {
                trace!("stack slot {} widened {} -> {}", index, existing.ty, merged.ty);
                *existing = merged;
                changed = true;
            }
        }

        // Locals are padded with top to the longer length before merging.
        let length = self.locals.len().max(incoming.locals.len());
        let filler = Entry::new(Type::Top, Source::Merge { block });
        self.locals.resize(length, filler.clone());

        for index in 0..length {
            let incoming_entry = incoming.locals.get(index).unwrap_or(&filler);
            let merged = Self::merge_slot(&self.locals[index], incoming_entry, checker, block);
            if merged.ty != self.locals[index].ty {
                trace!("local {} widened {} -> {}", index, self.locals[index].ty, merged.ty);
                self.locals[index] = merged;
                changed = true;
            }
        }

        changed
    }

    fn merge_slot(existing: &Entry, incoming: &Entry, checker: &TypeChecker, block: u32) -> Entry {
        if existing.ty == incoming.ty {
            return existing.clone();
        }

        let merged = if existing.ty.is_reference() && incoming.ty.is_reference()
            || matches!(
                (&existing.ty, &incoming.ty),
                (Type::ReturnAddress(_), Type::ReturnAddress(_))
            ) {
            checker.merge(&existing.ty, &incoming.ty)
        } else {
            Type::Top
        };

        let mut parents = vec![existing.source, incoming.source];
        parents.dedup();
        Entry::with_parents(merged, Source::Merge { block }, parents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(offset: u32) -> Source {
        Source::Instruction {
            offset,
            mnemonic: "nop",
        }
    }

    #[test]
    fn push_pop_and_underflow() {
        let mut errors = Vec::new();
        let mut frame = Frame::new(0, 2);
        frame.push(Entry::new(Type::Int, source(0)), source(0), &mut errors);
        assert_eq!(frame.stack_size(), 1);

        let popped = frame.pop(source(1), &mut errors);
        assert_eq!(popped.ty, Type::Int);
        assert!(errors.is_empty());

        let placeholder = frame.pop(source(2), &mut errors);
        assert_eq!(placeholder.ty, Type::Top);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::InvalidStack);
    }

    #[test]
    fn category_two_counts_two_slots() {
        let mut errors = Vec::new();
        let mut frame = Frame::new(0, 2);
        frame.push(Entry::new(Type::Long, source(0)), source(0), &mut errors);
        assert_eq!(frame.stack_size(), 2);
        assert!(errors.is_empty());

        // A second long would exceed max_stack.
        frame.push(Entry::new(Type::Long, source(1)), source(1), &mut errors);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn store_invalidates_overwritten_pair() {
        let mut errors = Vec::new();
        let mut frame = Frame::new(3, 0);
        frame.store(0, Entry::new(Type::Long, source(0)), source(0), &mut errors);
        assert_eq!(frame.locals[1].ty, Type::Top);

        frame.store(1, Entry::new(Type::Int, source(1)), source(1), &mut errors);
        assert_eq!(frame.locals[0].ty, Type::Top);
        assert_eq!(frame.locals[1].ty, Type::Int);
        assert!(errors.is_empty());
    }

    #[test]
    fn store_out_of_range_is_recorded() {
        let mut errors = Vec::new();
        let mut frame = Frame::new(1, 0);
        frame.store(0, Entry::new(Type::Long, source(0)), source(0), &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::InvalidLocal);
    }

    #[test]
    fn initial_frame_layout() {
        let mut errors = Vec::new();
        let frame = Frame::initial(
            4,
            0,
            Some(Type::class("Example")),
            &[Type::Long, Type::Boolean],
            &mut errors,
        );
        assert!(errors.is_empty());
        assert_eq!(frame.locals[0].ty, Type::class("Example"));
        assert_eq!(frame.locals[1].ty, Type::Long);
        assert_eq!(frame.locals[2].ty, Type::Top);
        // boolean folds to int in the frame.
        assert_eq!(frame.locals[3].ty, Type::Int);
    }

    #[test]
    fn replace_uninitialized_rewrites_every_copy() {
        let mut errors = Vec::new();
        let mut frame = Frame::new(2, 4);
        let uninit = Type::Uninitialized(0);
        frame.push(Entry::new(uninit.clone(), source(0)), source(0), &mut errors);
        frame.push(Entry::new(uninit.clone(), source(0)), source(0), &mut errors);
        frame.store(0, Entry::new(uninit.clone(), source(0)), source(0), &mut errors);

        let initialized = Type::class("Example");
        frame.replace_uninitialized(&uninit, &initialized);
        assert_eq!(frame.stack[0].ty, initialized);
        assert_eq!(frame.stack[1].ty, initialized);
        assert_eq!(frame.locals[0].ty, initialized);
    }

    #[test]
    fn merge_reaches_fixpoint() {
        let checker = TypeChecker::Strict;
        let mut errors = Vec::new();

        let mut left = Frame::new(2, 2);
        left.store(0, Entry::new(Type::class("java/lang/String"), source(0)), source(0), &mut errors);

        let mut right = Frame::new(2, 2);
        right.store(0, Entry::new(Type::class("java/lang/Integer"), source(1)), source(1), &mut errors);

        assert!(left.merge(&right, &checker, 1, &mut errors));
        assert_eq!(left.locals[0].ty, *crate::types::OBJECT);

        // Merging the same frame again changes nothing.
        assert!(!left.merge(&right, &checker, 1, &mut errors));
        assert!(errors.is_empty());
    }

    #[test]
    fn merge_rejects_stack_mismatch() {
        let checker = TypeChecker::Strict;
        let mut errors = Vec::new();

        let mut left = Frame::new(0, 2);
        left.push(Entry::new(Type::Int, source(0)), source(0), &mut errors);
        let right = Frame::new(0, 2);

        assert!(!left.merge(&right, &checker, 3, &mut errors));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::InvalidStack);
    }

    #[test]
    fn incompatible_primitive_slots_become_top() {
        let checker = TypeChecker::Strict;
        let mut errors = Vec::new();

        let mut left = Frame::new(1, 0);
        left.store(0, Entry::new(Type::Int, source(0)), source(0), &mut errors);
        let mut right = Frame::new(1, 0);
        right.store(0, Entry::new(Type::Float, source(1)), source(1), &mut errors);

        assert!(left.merge(&right, &checker, 0, &mut errors));
        assert_eq!(left.locals[0].ty, Type::Top);
        assert!(errors.is_empty());
    }
}
