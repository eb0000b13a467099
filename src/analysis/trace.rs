//! The trace engine: depth-limited fixpoint propagation of abstract frames through the control
//! flow graph, merging at join points and recording per-program-point frames and errors.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::analysis::block::Label;
use crate::analysis::edge::{Edge, EdgeKind};
use crate::analysis::frame::{Entry, Frame};
use crate::analysis::graph::Graph;
use crate::types::Type;
use crate::verifier::{Error, ErrorKind, Source, TypeChecker, VerifyError};

/// The frames surrounding every instruction of one block for a completed trace.
#[derive(Debug, Clone)]
pub struct BlockTrace {
    /// The merged frame the block is entered with.
    pub entry: Frame,
    /// The frame after the final instruction.
    pub exit: Frame,
    /// One `(pre, post)` pair per instruction, in order.
    pub steps: Vec<(Frame, Frame)>,
}

/// Everything the engine learned about a method.
#[derive(Debug)]
pub struct Trace {
    pub blocks: HashMap<Label, BlockTrace>,
    /// The merged incoming frame of every reached block.
    pub merged: HashMap<Label, Frame>,
    pub errors: Vec<Error>,
    /// Observed operand stack high water mark, in slots.
    pub max_stack: u16,
    /// Observed local slot count.
    pub max_locals: u16,
}

/// Runs the abstract interpreter over `graph` starting from `initial`.
///
/// The work-list is processed in ascending block label order so results and error lists are
/// reproducible. Recoverable errors accumulate in the result; only structural impossibilities
/// (or a failure to converge) produce an `Err`.
pub fn trace(
    graph: &mut Graph,
    initial: Frame,
    this_class: Option<&Type>,
    checker: &TypeChecker,
) -> Result<Trace, VerifyError> {
    let mut errors = Vec::new();
    let mut merged: HashMap<Label, Frame> = HashMap::new();
    let mut traces: HashMap<Label, BlockTrace> = HashMap::new();

    let mut max_stack = initial.stack_size();
    let mut max_locals = initial.locals.len() as u16;

    let mut pending: BTreeMap<Label, Vec<Frame>> = BTreeMap::new();
    pending.insert(graph.entry(), vec![initial]);

    // The lattice has finite height, so this bound is only reachable through a checker that
    // fails to converge; treat that as a structural failure rather than spinning.
    let iteration_limit = graph.blocks().len().saturating_mul(1024).max(4096);
    let mut iterations = 0usize;

    while let Some((&label, _)) = pending.iter().next() {
        let frame = {
            let queue = pending.get_mut(&label).expect("key taken from iterator");
            let frame = queue.remove(0);
            if queue.is_empty() {
                pending.remove(&label);
            }
            frame
        };

        iterations += 1;
        if iterations > iteration_limit {
            errors.push(Error::new(
                ErrorKind::InvalidInstruction,
                None,
                "trace did not reach a fixpoint",
            ));
            return Err(VerifyError::new(errors));
        }

        // Merge into the recorded frame; nothing to do when the state is already covered.
        let entry_frame = match merged.get_mut(&label) {
            Some(existing) => {
                if !existing.merge(&frame, checker, label, &mut errors) {
                    continue;
                }
                existing.clone()
            }
            None => {
                merged.insert(label, frame.clone());
                frame
            }
        };

        trace!("tracing block {} with {:?}", label, entry_frame.stack);

        let block = graph.block(label).clone();
        let mut current = entry_frame.clone();
        let mut steps = Vec::with_capacity(block.instructions.len());

        // Locals snapshots feed the exception edges: a handler can be entered from any point
        // inside the block, so its locals are the merge over every boundary.
        let mut handler_locals = current.clone();
        handler_locals.stack.clear();

        for (offset, instruction) in &block.instructions {
            let source = Source::Instruction {
                offset: *offset,
                mnemonic: instruction.mnemonic(),
            };

            let pre = current.clone();
            instruction.trace(source, &mut current, this_class, checker, &mut errors);

            max_stack = max_stack.max(current.stack_size());
            max_locals = max_locals.max(current.locals.len() as u16);

            let mut snapshot = current.clone();
            snapshot.stack.clear();
            handler_locals.merge(&snapshot, checker, label, &mut errors);

            steps.push((pre, current.clone()));
        }

        traces.insert(
            label,
            BlockTrace {
                entry: entry_frame,
                exit: current.clone(),
                steps,
            },
        );

        let outgoing: Vec<Edge> = graph.out_edges(label).cloned().collect();
        let mut resolved_rets: Vec<(Label, Vec<Label>)> = Vec::new();

        for edge in &outgoing {
            match &edge.kind {
                EdgeKind::Fallthrough | EdgeKind::Jump(_) | EdgeKind::Switch { .. } => {
                    let to = edge.to.expect("flow edges are resolved");
                    pending.entry(to).or_default().push(current.clone());
                }
                EdgeKind::JsrJump(_) => {
                    let to = edge.to.expect("jsr edges are resolved");
                    let return_site = outgoing.iter().find_map(|candidate| match candidate.kind {
                        EdgeKind::JsrFallthrough(_) => candidate.to,
                        _ => None,
                    });

                    let mut incoming = current.clone();
                    match return_site {
                        Some(return_site) => {
                            let source = Source::JsrPush { block: label };
                            incoming.push(
                                Entry::new(Type::return_address(return_site), source),
                                source,
                                &mut errors,
                            );
                            max_stack = max_stack.max(incoming.stack_size());
                        }
                        None => errors.push(Error::new(
                            ErrorKind::InvalidInstruction,
                            None,
                            format!("jsr in block {} has no return site", label),
                        )),
                    }
                    pending.entry(to).or_default().push(incoming);
                }
                EdgeKind::JsrFallthrough(_) => {
                    // Reached through the subroutine's ret, never directly.
                }
                EdgeKind::Ret { local } => {
                    match current.return_address_at(*local) {
                        Some(labels) => {
                            let targets: Vec<Label> = labels.to_vec();
                            resolved_rets.push((label, targets.clone()));

                            let mut incoming = current.clone();
                            incoming.clear_return_address(*local);
                            for target in targets {
                                pending.entry(target).or_default().push(incoming.clone());
                            }
                        }
                        None => {
                            errors.push(Error::new(
                                ErrorKind::InvalidLocal,
                                block.instructions.last().map(|(offset, insn)| {
                                    Source::Instruction {
                                        offset: *offset,
                                        mnemonic: insn.mnemonic(),
                                    }
                                }),
                                format!("expected a return address in local {}", local),
                            ));
                        }
                    }
                }
                EdgeKind::Exception { throwable, .. } => {
                    let to = edge.to.expect("exception edges are resolved");
                    let mut incoming = handler_locals.clone();
                    let source = Source::CaughtException { block: to };
                    incoming.stack.clear();
                    incoming.push(Entry::new(throwable.clone(), source), source, &mut errors);
                    max_stack = max_stack.max(incoming.stack_size());
                    pending.entry(to).or_default().push(incoming);
                }
            }
        }

        for (from, targets) in resolved_rets {
            graph.resolve_ret(from, &targets);
        }
    }

    Ok(Trace {
        blocks: traces,
        merged,
        errors,
        max_stack,
        max_locals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::attribute::{CodeAttribute, ExceptionRange};
    use crate::instruction::Instruction::{self, *};

    fn code_attribute(code: Vec<(u32, Instruction)>, length: u32) -> CodeAttribute {
        CodeAttribute {
            max_stack: 4,
            max_locals: 4,
            code,
            code_length: length,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        }
    }

    fn run(
        code: CodeAttribute,
        initial: Frame,
    ) -> (Graph, Trace) {
        let mut graph = Graph::build(&code).unwrap();
        let trace = trace(&mut graph, initial, None, &TypeChecker::Strict).unwrap();
        (graph, trace)
    }

    #[test]
    fn straight_line_method_traces_cleanly() {
        let code = code_attribute(vec![(0, iconst_1), (1, ireturn)], 2);
        let initial = Frame::new(4, 4);
        let (graph, result) = run(code, initial);

        assert!(result.errors.is_empty());
        let body = graph.block_at_offset(0).unwrap();
        let steps = &result.blocks[&body].steps;
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].1.stack[0].ty, Type::Int);
        assert!(steps[1].1.stack.is_empty());
        assert_eq!(result.max_stack, 1);
    }

    #[test]
    fn join_point_merges_frames() {
        // aload_0; ifnull L; iconst_0; ireturn; L: iconst_1; ireturn
        let code = code_attribute(
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

        let mut errors = Vec::new();
        let initial = Frame::initial(4, 4, Some(crate::types::OBJECT.clone()), &[], &mut errors);
        let (graph, result) = run(code, initial);

        assert!(result.errors.is_empty());
        let target = graph.block_at_offset(6).unwrap();
        let merged = &result.merged[&target];
        assert!(merged.stack.is_empty());
        assert_eq!(merged.locals[0].ty, *crate::types::OBJECT);
    }

    #[test]
    fn type_error_is_recorded_once_and_trace_continues() {
        let code = code_attribute(
            vec![(0, iconst_1), (1, aload(0)), (2, iadd), (3, ireturn)],
            4,
        );

        let mut errors = Vec::new();
        let initial = Frame::initial(4, 4, Some(crate::types::OBJECT.clone()), &[], &mut errors);
        let (_, result) = run(code, initial);

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ErrorKind::InvalidType);
        assert!(result.errors[0].to_string().starts_with("error at iadd @ 2"));
    }

    #[test]
    fn exception_handler_receives_thrown_type() {
        // Protected region [0, 5) catching IOException, handler at 5.
        let mut code = code_attribute(
            vec![
                (0, iconst_0),
                (1, istore(1)),
                (2, iconst_1),
                (3, istore(2)),
                (4, r#return),
                (5, astore(3)),
                (6, r#return),
            ],
            7,
        );
        code.exception_table.push(ExceptionRange {
            start_pc: 0,
            end_pc: 5,
            handler_pc: 5,
            catch_type: Some(Type::class("java/io/IOException")),
        });

        let mut errors = Vec::new();
        let initial = Frame::initial(4, 4, None, &[Type::Int], &mut errors);
        let (graph, result) = run(code, initial);

        assert!(result.errors.is_empty());
        let handler = graph.block_at_offset(5).unwrap();
        let incoming = &result.merged[&handler];
        assert_eq!(incoming.stack.len(), 1);
        assert_eq!(incoming.stack[0].ty, Type::class("java/io/IOException"));
        // Locals live on entry to the region survive; one stored only inside it does not,
        // because the throw may happen before the store.
        assert_eq!(incoming.locals[0].ty, Type::Int);
        assert_eq!(incoming.locals[1].ty, Type::Top);
    }

    #[test]
    fn handler_entry_counts_toward_max_stack() {
        // The protected region never touches the stack, so the only depth-1 point in the whole
        // method is the synthesized handler entry.
        let mut code = code_attribute(
            vec![(0, r#return), (1, astore(1)), (2, r#return)],
            3,
        );
        code.exception_table.push(ExceptionRange {
            start_pc: 0,
            end_pc: 1,
            handler_pc: 1,
            catch_type: None,
        });

        let initial = Frame::new(4, 4);
        let (_, result) = run(code, initial);
        assert!(result.errors.is_empty());
        assert_eq!(result.max_stack, 1);
    }

    #[test]
    fn subroutine_ret_resolves_edges_per_call_site() {
        // 0: jsr +8 -> 8
        // 3: jsr +5 -> 8
        // 6: nop
        // 7: return
        // 8: astore_1
        // 9: ret 1
        let code = code_attribute(
            vec![
                (0, jsr(8)),
                (3, jsr(5)),
                (6, nop),
                (7, r#return),
                (8, astore(1)),
                (9, ret(1)),
            ],
            11,
        );

        let initial = Frame::new(4, 4);
        let mut graph = Graph::build(&code).unwrap();
        let result = trace(&mut graph, initial, None, &TypeChecker::Strict).unwrap();
        assert!(result.errors.is_empty());

        let subroutine = graph.block_at_offset(8).unwrap();
        let first_return = graph.block_at_offset(3).unwrap();
        let second_return = graph.block_at_offset(6).unwrap();

        // The subroutine's merged frame holds the union of both return addresses.
        let merged = &result.merged[&subroutine];
        match &merged.stack[0].ty {
            Type::ReturnAddress(labels) => {
                assert_eq!(labels.len(), 2);
                assert!(labels.contains(&first_return));
                assert!(labels.contains(&second_return));
            }
            other => panic!("expected a return address, got {}", other),
        }

        // After tracing, the ret edge fans out to both call sites.
        let ret_targets: Vec<Label> = graph
            .out_edges(subroutine)
            .filter(|edge| matches!(edge.kind, EdgeKind::Ret { .. }))
            .map(|edge| edge.to.unwrap())
            .collect();
        assert_eq!(ret_targets.len(), 2);
        assert!(ret_targets.contains(&first_return));
        assert!(ret_targets.contains(&second_return));
    }

    #[test]
    fn uninitialized_flows_until_init() {
        // new Object; dup; invokespecial <init>; astore_1; return
        let member = crate::instruction::MemberRef {
            class: Type::class("java/lang/Object"),
            name: "<init>".to_owned(),
            descriptor: "()V".to_owned(),
        };
        let code = code_attribute(
            vec![
                (0, new(Type::class("java/lang/Object"))),
                (3, dup),
                (4, invokespecial(member)),
                (7, astore(1)),
                (8, r#return),
            ],
            9,
        );

        let initial = Frame::new(4, 4);
        let (graph, result) = run(code, initial);
        assert!(result.errors.is_empty());

        let body = graph.block_at_offset(0).unwrap();
        let steps = &result.blocks[&body].steps;

        // Before <init>: two copies of uninitialized(0) on the stack.
        let pre_init = &steps[2].0;
        assert_eq!(pre_init.stack[0].ty, Type::Uninitialized(0));
        assert_eq!(pre_init.stack[1].ty, Type::Uninitialized(0));

        // After: the remaining copy is the initialized class.
        let post_init = &steps[2].1;
        assert_eq!(post_init.stack.len(), 1);
        assert_eq!(post_init.stack[0].ty, Type::class("java/lang/Object"));
    }

    #[test]
    fn loop_reaches_fixpoint() {
        // 0: iconst_0; 1: istore_1; 2: iinc 1 1; 5: iload_1; 6: bipush 10; 8: if_icmplt -6; 11: return
        let code = code_attribute(
            vec![
                (0, iconst_0),
                (1, istore(1)),
                (2, iinc { index: 1, constant: 1 }),
                (5, iload(1)),
                (6, bipush(10)),
                (8, if_icmplt(-6)),
                (11, r#return),
            ],
            12,
        );

        let initial = Frame::new(4, 4);
        let (_, result) = run(code, initial);
        assert!(result.errors.is_empty());
        assert_eq!(result.max_stack, 2);
    }
}
