//! Control flow graph construction from a decoded `Code` attribute, and its re-assembly back to
//! bytes.

use hashbrown::HashMap;
use itertools::Itertools;

use crate::analysis::block::{Block, BlockKind, Label};
use crate::analysis::edge::{Edge, EdgeKind};
use crate::class::attribute::{CodeAttribute, ExceptionRange};
use crate::class::constant::ConstantPool;
use crate::error::ClassError;
use crate::instruction::{self, Instruction};
use crate::types::{Type, THROWABLE};

/// The control flow graph of one method body. Blocks are stored in an arena and indexed by
/// label; edges carry `(from, to)` labels so the graph has no owning pointers between blocks.
#[derive(Debug, Clone)]
pub struct Graph {
    blocks: Vec<Block>,
    edges: Vec<Edge>,
    entry: Label,
    /// Block label starting at each bytecode offset.
    offset_labels: HashMap<u32, Label>,
    /// Original code length; used to map exception ranges that end at the code boundary.
    code_length: u32,
}

/// The output of [`Graph::assemble`]: fresh bytes, the rebuilt exception table, and the offset
/// each block landed at.
#[derive(Debug)]
pub struct Assembled {
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionRange>,
    pub block_offsets: HashMap<Label, u32>,
    /// Old bytecode offset to new bytecode offset for every instruction.
    pub offset_mapping: HashMap<u32, u32>,
}

impl Graph {
    /// Builds the graph: finds leaders, slices blocks, and emits typed edges, then checks the
    /// structural invariants.
    pub fn build(code: &CodeAttribute) -> Result<Self, ClassError> {
        if code.code.is_empty() {
            return Err(ClassError::code("method has an empty code array"));
        }

        let starts: HashMap<u32, usize> = code
            .code
            .iter()
            .enumerate()
            .map(|(index, (offset, _))| (*offset, index))
            .collect();

        let target_of = |offset: u32, relative: i32| -> Result<u32, ClassError> {
            let target = offset as i64 + relative as i64;
            if target < 0 || !starts.contains_key(&(target as u32)) {
                return Err(ClassError::code(format!(
                    "branch at {} targets {}, which is not an instruction",
                    offset, target
                )));
            }
            Ok(target as u32)
        };

        // Leaders: instruction 0, branch/switch/jsr targets, the instruction after any block
        // terminator, handler starts, and the boundaries of protected ranges.
        let mut leaders = std::collections::BTreeSet::new();
        leaders.insert(0u32);

        let mut iter = code.code.iter().peekable();
        while let Some((offset, insn)) = iter.next() {
            if let Some(relative) = insn.jump_offset() {
                leaders.insert(target_of(*offset, relative)?);
            }
            match insn {
                Instruction::tableswitch {
                    default, offsets, ..
                } => {
                    leaders.insert(target_of(*offset, *default)?);
                    for relative in offsets {
                        leaders.insert(target_of(*offset, *relative)?);
                    }
                }
                Instruction::lookupswitch { default, pairs } => {
                    leaders.insert(target_of(*offset, *default)?);
                    for (_, relative) in pairs {
                        leaders.insert(target_of(*offset, *relative)?);
                    }
                }
                _ => {}
            }
            if insn.is_block_terminator() {
                if let Some((next, _)) = iter.peek() {
                    leaders.insert(*next);
                }
            }
        }

        for range in &code.exception_table {
            for pc in &[range.start_pc, range.handler_pc] {
                if !starts.contains_key(&(*pc as u32)) {
                    return Err(ClassError::code(format!(
                        "exception table refers into an instruction at {}",
                        pc
                    )));
                }
                leaders.insert(*pc as u32);
            }
            // The exclusive end splits a block as well, so coverage is exact.
            if (range.end_pc as u32) < code.code_length {
                if !starts.contains_key(&(range.end_pc as u32)) {
                    return Err(ClassError::code(format!(
                        "exception table refers into an instruction at {}",
                        range.end_pc
                    )));
                }
                leaders.insert(range.end_pc as u32);
            }
        }

        // Slice the instruction stream into blocks. Label 0 is a synthetic entry so a branch
        // back to offset 0 never gives the entry block an incoming edge.
        let mut blocks = vec![Block::new(0, BlockKind::Entry)];
        let mut offset_labels = HashMap::new();

        for (offset, insn) in &code.code {
            let start_new = leaders.contains(offset);
            if start_new || blocks.len() == 1 {
                let label = blocks.len() as Label;
                blocks.push(Block::new(label, BlockKind::Normal));
                offset_labels.insert(*offset, label);
            }
            blocks
                .last_mut()
                .expect("block arena is never empty")
                .instructions
                .push((*offset, insn.clone()));
        }

        let mut graph = Graph {
            blocks,
            edges: Vec::new(),
            entry: 0,
            offset_labels,
            code_length: code.code_length,
        };

        graph.edges.push(Edge::new(0, 1, EdgeKind::Fallthrough));
        graph.emit_edges(code, &|offset, relative| target_of(offset, relative))?;
        graph.check()?;

        debug!(
            "built graph with {} blocks and {} edges",
            graph.blocks.len(),
            graph.edges.len()
        );

        Ok(graph)
    }

    fn return_block(&mut self, type_: Option<Type>) -> Label {
        let kind = BlockKind::Return(type_);
        if let Some(block) = self.blocks.iter().find(|block| block.kind == kind) {
            return block.label;
        }

        let label = self.blocks.len() as Label;
        self.blocks.push(Block::new(label, kind));
        label
    }

    fn rethrow_block(&mut self) -> Label {
        if let Some(block) = self.blocks.iter().find(|block| block.kind == BlockKind::Rethrow) {
            return block.label;
        }

        let label = self.blocks.len() as Label;
        self.blocks.push(Block::new(label, BlockKind::Rethrow));
        label
    }

    fn emit_edges(
        &mut self,
        code: &CodeAttribute,
        target_of: &dyn Fn(u32, i32) -> Result<u32, ClassError>,
    ) -> Result<(), ClassError> {
        let real: Vec<Label> = self
            .blocks
            .iter()
            .filter(|block| !block.instructions.is_empty())
            .map(|block| block.label)
            .collect();

        for (position, label) in real.iter().enumerate() {
            let next_label = real.get(position + 1).copied();
            let block = &self.blocks[*label as usize];
            let (last_offset, terminator) = block
                .instructions
                .last()
                .map(|(offset, insn)| (*offset, insn.clone()))
                .expect("real blocks are non-empty");

            use Instruction::*;
            match &terminator {
                goto(_) | goto_w(_) => {
                    let target = target_of(last_offset, terminator.jump_offset().unwrap())?;
                    let to = self.offset_labels[&target];
                    self.edges
                        .push(Edge::new(*label, to, EdgeKind::Jump(terminator.clone())));
                }
                jsr(_) | jsr_w(_) => {
                    let target = target_of(last_offset, terminator.jump_offset().unwrap())?;
                    let to = self.offset_labels[&target];
                    self.edges
                        .push(Edge::new(*label, to, EdgeKind::JsrJump(terminator.clone())));

                    let return_site = next_label.ok_or_else(|| {
                        ClassError::code(format!("jsr at {} has no return site", last_offset))
                    })?;
                    self.edges.push(Edge::new(
                        *label,
                        return_site,
                        EdgeKind::JsrFallthrough(terminator.clone()),
                    ));
                }
                ret(index) => {
                    self.edges.push(Edge::unresolved_ret(*label, *index));
                }
                tableswitch {
                    default, offsets, ..
                } => {
                    for (index, relative) in offsets.iter().enumerate() {
                        let target = target_of(last_offset, *relative)?;
                        self.edges.push(Edge::new(
                            *label,
                            self.offset_labels[&target],
                            EdgeKind::Switch {
                                value: Some(index as i32),
                            },
                        ));
                    }
                    let target = target_of(last_offset, *default)?;
                    self.edges.push(Edge::new(
                        *label,
                        self.offset_labels[&target],
                        EdgeKind::Switch { value: None },
                    ));
                }
                lookupswitch { default, pairs } => {
                    for (value, relative) in pairs {
                        let target = target_of(last_offset, *relative)?;
                        self.edges.push(Edge::new(
                            *label,
                            self.offset_labels[&target],
                            EdgeKind::Switch { value: Some(*value) },
                        ));
                    }
                    let target = target_of(last_offset, *default)?;
                    self.edges.push(Edge::new(
                        *label,
                        self.offset_labels[&target],
                        EdgeKind::Switch { value: None },
                    ));
                }
                athrow => {
                    let rethrow = self.rethrow_block();
                    self.edges
                        .push(Edge::new(*label, rethrow, EdgeKind::Fallthrough));
                }
                _ if terminator.is_return() => {
                    let target = self.return_block(terminator.return_type());
                    self.edges
                        .push(Edge::new(*label, target, EdgeKind::Fallthrough));
                }
                _ if terminator.is_conditional_jump() => {
                    let target = target_of(last_offset, terminator.jump_offset().unwrap())?;
                    let to = self.offset_labels[&target];
                    self.edges
                        .push(Edge::new(*label, to, EdgeKind::Jump(terminator.clone())));

                    let fallthrough = next_label.ok_or_else(|| {
                        ClassError::code(format!(
                            "conditional jump at {} falls off the end of the code",
                            last_offset
                        ))
                    })?;
                    self.edges
                        .push(Edge::new(*label, fallthrough, EdgeKind::Fallthrough));
                }
                _ => {
                    // Plain instruction sliced at a leader boundary.
                    let fallthrough = next_label.ok_or_else(|| {
                        ClassError::code(format!(
                            "control falls off the end of the code after {}",
                            last_offset
                        ))
                    })?;
                    self.edges
                        .push(Edge::new(*label, fallthrough, EdgeKind::Fallthrough));
                }
            }
        }

        // Exception edges: every block whose range overlaps a protected range flows to the
        // handler, with the table position as priority.
        for label in &real {
            let span = self.block_span(*label);
            for (priority, range) in code.exception_table.iter().enumerate() {
                if (range.start_pc as u32) < span.1 && span.0 < range.end_pc as u32 {
                    let handler = self.offset_labels[&(range.handler_pc as u32)];
                    self.edges.push(Edge::new(
                        *label,
                        handler,
                        EdgeKind::Exception {
                            priority: priority as u16,
                            throwable: range.catch_type.clone().unwrap_or_else(|| THROWABLE.clone()),
                            inline_coverage: false,
                        },
                    ));
                }
            }
        }

        Ok(())
    }

    /// The `[start, end)` bytecode range a block covers.
    fn block_span(&self, label: Label) -> (u32, u32) {
        let block = &self.blocks[label as usize];
        let start = block.start_offset().unwrap_or(0);

        let end = self
            .blocks
            .iter()
            .filter_map(Block::start_offset)
            .filter(|offset| *offset > start)
            .min()
            .unwrap_or(self.code_length);

        (start, end)
    }

    /// Verifies the structural graph invariants, which must hold after construction.
    pub fn check(&self) -> Result<(), ClassError> {
        // Exactly one entry, and nothing flows into it.
        let entries = self
            .blocks
            .iter()
            .filter(|block| block.kind == BlockKind::Entry)
            .count();
        if entries != 1 {
            return Err(ClassError::code(format!("expected 1 entry block, found {}", entries)));
        }
        if self.edges.iter().any(|edge| edge.to == Some(self.entry)) {
            return Err(ClassError::code("entry block has incoming edges"));
        }

        for block in &self.blocks {
            let outgoing: Vec<&Edge> = self.out_edges(block.label).collect();
            let flow: Vec<&&Edge> = outgoing.iter().filter(|edge| edge.is_flow()).collect();

            if block.is_terminal() {
                if !flow.is_empty() {
                    return Err(ClassError::code(format!(
                        "terminal block {} has outgoing flow edges",
                        block.label
                    )));
                }
                continue;
            }

            if let Some(terminator) = block.terminator() {
                let jumps = flow
                    .iter()
                    .filter(|edge| matches!(edge.kind, EdgeKind::Jump(_)))
                    .count();
                let fallthroughs = flow
                    .iter()
                    .filter(|edge| matches!(edge.kind, EdgeKind::Fallthrough))
                    .count();

                if terminator.is_conditional_jump() && (jumps != 1 || fallthroughs != 1) {
                    return Err(ClassError::code(format!(
                        "conditional jump block {} must have exactly one jump and one \
                         fallthrough edge, found {} and {}",
                        block.label, jumps, fallthroughs
                    )));
                }

                // Unconditional exits never fall through to the next sequential block; the only
                // fallthrough allowed is the one into a terminal block.
                if terminator.is_unconditional_exit() {
                    let bad_fallthrough = flow.iter().any(|edge| {
                        matches!(edge.kind, EdgeKind::Fallthrough)
                            && edge
                                .to
                                .map(|to| !self.blocks[to as usize].is_terminal())
                                .unwrap_or(true)
                    });
                    if bad_fallthrough {
                        return Err(ClassError::code(format!(
                            "block {} ends unconditionally but has a fallthrough edge",
                            block.label
                        )));
                    }
                }
            }

            // Exception edges are totally ordered per source block: strictly ascending
            // priorities, no duplicates.
            let priorities: Vec<u16> = outgoing
                .iter()
                .filter_map(|edge| match edge.kind {
                    EdgeKind::Exception { priority, .. } => Some(priority),
                    _ => None,
                })
                .collect();
            if priorities.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(ClassError::code(format!(
                    "block {} has misordered exception priorities",
                    block.label
                )));
            }
        }

        Ok(())
    }

    pub fn entry(&self) -> Label {
        self.entry
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, label: Label) -> &Block {
        &self.blocks[label as usize]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn out_edges(&self, label: Label) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.from == label)
    }

    pub fn in_edges(&self, label: Label) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.to == Some(label))
    }

    pub fn block_at_offset(&self, offset: u32) -> Option<Label> {
        self.offset_labels.get(&offset).copied()
    }

    /// Replaces the unresolved `ret` edge out of `from` with one resolved edge per possible
    /// return site. Called by the trace engine once the return address local is known.
    pub fn resolve_ret(&mut self, from: Label, targets: &[Label]) {
        let mut local = None;
        self.edges.retain(|edge| {
            if edge.from == from {
                if let EdgeKind::Ret { local: index } = edge.kind {
                    local = Some(index);
                    return false;
                }
            }
            true
        });

        let local = match local {
            Some(local) => local,
            None => return,
        };

        for target in targets {
            self.edges.push(Edge {
                from,
                to: Some(*target),
                kind: EdgeKind::Ret { local },
            });
        }
    }

    /// Relinearizes the blocks in label order and re-encodes them, rebuilding branch operands
    /// from the edges and the exception table from the exception edges.
    pub fn assemble(&self, pool: &mut ConstantPool) -> Result<Assembled, ClassError> {
        use Instruction::*;

        let real: Vec<&Block> = self
            .blocks
            .iter()
            .filter(|block| !block.instructions.is_empty())
            .collect();

        let block_start = |label: Label| -> Result<u32, ClassError> {
            self.blocks[label as usize].start_offset().ok_or_else(|| {
                ClassError::code(format!("edge targets the synthetic block {}", label))
            })
        };

        // Rebuild every branch operand from the graph's edges so that retargeted edges survive
        // re-assembly, then let the codec recompute the byte-level layout.
        let mut instructions: Vec<(u32, Instruction)> = Vec::new();
        for block in &real {
            let (body, terminator) = match block.instructions.split_last() {
                Some((terminator, body)) => (body, terminator),
                None => continue,
            };
            instructions.extend_from_slice(body);

            let (offset, insn) = terminator;
            let patched = match insn {
                goto(_) | goto_w(_) | jsr(_) | jsr_w(_) => {
                    let kind_matches = |edge: &&Edge| {
                        matches!(edge.kind, EdgeKind::Jump(_) | EdgeKind::JsrJump(_))
                    };
                    let edge = self
                        .out_edges(block.label)
                        .find(kind_matches)
                        .ok_or_else(|| {
                            ClassError::code(format!("jump at {} has no jump edge", offset))
                        })?;
                    let target = block_start(edge.to.expect("jump edges are resolved"))?;
                    insn.retarget(target as i32 - *offset as i32)?
                }
                _ if insn.is_conditional_jump() => {
                    let edge = self
                        .out_edges(block.label)
                        .find(|edge| matches!(edge.kind, EdgeKind::Jump(_)))
                        .ok_or_else(|| {
                            ClassError::code(format!("jump at {} has no jump edge", offset))
                        })?;
                    let target = block_start(edge.to.expect("jump edges are resolved"))?;
                    insn.retarget(target as i32 - *offset as i32)?
                }
                tableswitch { low, offsets, .. } => {
                    let mut new_offsets = vec![0i32; offsets.len()];
                    let mut default = None;
                    for edge in self.out_edges(block.label) {
                        if let EdgeKind::Switch { value } = &edge.kind {
                            let target = block_start(edge.to.expect("switch edges are resolved"))?;
                            let relative = target as i32 - *offset as i32;
                            match value {
                                Some(index) => new_offsets[*index as usize] = relative,
                                None => default = Some(relative),
                            }
                        }
                    }
                    tableswitch {
                        default: default.ok_or_else(|| {
                            ClassError::code(format!("switch at {} lost its default edge", offset))
                        })?,
                        low: *low,
                        offsets: new_offsets,
                    }
                }
                lookupswitch { .. } => {
                    let mut pairs = Vec::new();
                    let mut default = None;
                    for edge in self.out_edges(block.label) {
                        if let EdgeKind::Switch { value } = &edge.kind {
                            let target = block_start(edge.to.expect("switch edges are resolved"))?;
                            let relative = target as i32 - *offset as i32;
                            match value {
                                Some(match_value) => pairs.push((*match_value, relative)),
                                None => default = Some(relative),
                            }
                        }
                    }
                    // The specification requires the pairs sorted by match value.
                    pairs.sort_unstable_by_key(|(value, _)| *value);
                    lookupswitch {
                        default: default.ok_or_else(|| {
                            ClassError::code(format!("switch at {} lost its default edge", offset))
                        })?,
                        pairs,
                    }
                }
                other => other.clone(),
            };
            instructions.push((*offset, patched));
        }

        let (code, offset_mapping) =
            instruction::write_code(pool, &instructions, self.code_length)?;

        let block_offsets: HashMap<Label, u32> = real
            .iter()
            .filter_map(|block| {
                block
                    .start_offset()
                    .and_then(|offset| offset_mapping.get(&offset).copied())
                    .map(|new_offset| (block.label, new_offset))
            })
            .collect();

        let exception_table = self.rebuild_exception_table(&offset_mapping)?;

        Ok(Assembled {
            code,
            exception_table,
            block_offsets,
            offset_mapping,
        })
    }

    fn rebuild_exception_table(
        &self,
        mapping: &HashMap<u32, u32>,
    ) -> Result<Vec<ExceptionRange>, ClassError> {
        let mut by_priority: HashMap<u16, (Label, Type, Vec<(u32, u32)>)> = HashMap::new();

        for edge in self.edges.iter().filter(|edge| edge.is_exception()) {
            if let EdgeKind::Exception {
                priority,
                throwable,
                ..
            } = &edge.kind
            {
                let handler = edge.to.expect("exception edges are resolved");
                let span = self.block_span(edge.from);
                by_priority
                    .entry(*priority)
                    .or_insert_with(|| (handler, throwable.clone(), Vec::new()))
                    .2
                    .push(span);
            }
        }

        let mut table = Vec::new();
        for (priority, (handler, throwable, mut spans)) in
            by_priority.into_iter().sorted_by_key(|(priority, _)| *priority)
        {
            spans.sort_unstable();

            let handler_offset = self.blocks[handler as usize]
                .start_offset()
                .and_then(|offset| mapping.get(&offset).copied())
                .ok_or_else(|| {
                    ClassError::code(format!(
                        "handler block {} for priority {} has no offset",
                        handler, priority
                    ))
                })?;

            let catch_type = if throwable == *THROWABLE {
                None
            } else {
                Some(throwable)
            };

            // Merge contiguous covered blocks back into ranges.
            let mut runs: Vec<(u32, u32)> = Vec::new();
            for (start, end) in spans {
                match runs.last_mut() {
                    Some((_, run_end)) if *run_end == start => *run_end = end,
                    _ => runs.push((start, end)),
                }
            }

            for (start, end) in runs {
                let map = |offset: u32| {
                    mapping.get(&offset).copied().ok_or_else(|| {
                        ClassError::code(format!("exception range bound {} has no offset", offset))
                    })
                };
                table.push(ExceptionRange {
                    start_pc: map(start)? as u16,
                    end_pc: map(end)? as u16,
                    handler_pc: handler_offset as u16,
                    catch_type: catch_type.clone(),
                });
            }
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction::*;

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

    /// aload_0; ifnull +5; iconst_0; ireturn; iconst_1; ireturn
    fn branching_code() -> CodeAttribute {
        code_attribute(
            vec![
                (0, aload(0)),
                (1, ifnull(5)),
                (4, iconst_0),
                (5, ireturn),
                (6, iconst_1),
                (7, ireturn),
            ],
            8,
        )
    }

    #[test]
    fn branch_blocks_and_edges() {
        let graph = Graph::build(&branching_code()).unwrap();

        // Synthetic entry + three real blocks + shared return block.
        let real: Vec<&Block> = graph
            .blocks()
            .iter()
            .filter(|block| !block.instructions.is_empty())
            .collect();
        assert_eq!(real.len(), 3);

        let jump_source = graph.block_at_offset(0).unwrap();
        let jump_target = graph.block_at_offset(6).unwrap();

        let jumps: Vec<&Edge> = graph
            .out_edges(jump_source)
            .filter(|edge| matches!(edge.kind, EdgeKind::Jump(_)))
            .collect();
        assert_eq!(jumps.len(), 1);
        assert_eq!(jumps[0].to, Some(jump_target));

        let fallthroughs: Vec<&Edge> = graph
            .out_edges(jump_source)
            .filter(|edge| matches!(edge.kind, EdgeKind::Fallthrough))
            .collect();
        assert_eq!(fallthroughs.len(), 1);
        assert_eq!(fallthroughs[0].to, Some(graph.block_at_offset(4).unwrap()));

        // Both returns flow into one shared terminal block.
        let return_targets: Vec<Label> = graph
            .edges()
            .iter()
            .filter(|edge| {
                edge.to
                    .map(|to| matches!(graph.block(to).kind, BlockKind::Return(_)))
                    .unwrap_or(false)
            })
            .map(|edge| edge.to.unwrap())
            .collect();
        assert_eq!(return_targets.len(), 2);
        assert_eq!(return_targets[0], return_targets[1]);
    }

    #[test]
    fn branch_into_instruction_is_malformed() {
        // ifnull +2 targets the middle of the 3-byte ifnull itself.
        let code = code_attribute(vec![(0, aload(0)), (1, ifnull(1)), (4, r#return)], 5);
        assert!(matches!(
            Graph::build(&code),
            Err(ClassError::MalformedCode(_))
        ));
    }

    #[test]
    fn fall_off_the_end_is_malformed() {
        let code = code_attribute(vec![(0, iconst_0)], 1);
        assert!(matches!(
            Graph::build(&code),
            Err(ClassError::MalformedCode(_))
        ));
    }

    #[test]
    fn exception_edges_cover_overlapping_blocks() {
        // Protected range [0, 5) with handler at 5.
        let mut code = code_attribute(
            vec![
                (0, iconst_0),
                (1, istore(1)),
                (2, iload(1)),
                (3, iconst_1),
                (4, ireturn),
                (5, astore(2)),
                (6, iconst_0),
                (7, ireturn),
            ],
            8,
        );
        code.exception_table.push(ExceptionRange {
            start_pc: 0,
            end_pc: 5,
            handler_pc: 5,
            catch_type: Some(Type::class("java/io/IOException")),
        });

        let graph = Graph::build(&code).unwrap();
        let handler = graph.block_at_offset(5).unwrap();

        let exception_edges: Vec<&Edge> = graph
            .edges()
            .iter()
            .filter(|edge| edge.is_exception())
            .collect();
        assert!(!exception_edges.is_empty());

        for edge in &exception_edges {
            assert_eq!(edge.to, Some(handler));
            match &edge.kind {
                EdgeKind::Exception {
                    priority,
                    throwable,
                    ..
                } => {
                    assert_eq!(*priority, 0);
                    assert_eq!(throwable, &Type::class("java/io/IOException"));
                }
                _ => unreachable!(),
            }
            // Only blocks inside [0, 5) are covered.
            let span = graph.block_span(edge.from);
            assert!(span.0 < 5);
        }
    }

    #[test]
    fn jsr_emits_both_edges_and_ret_is_unresolved() {
        // jsr +4; return; astore_1; ret 1
        let code = code_attribute(
            vec![(0, jsr(4)), (3, r#return), (4, astore(1)), (5, ret(1))],
            7,
        );
        let graph = Graph::build(&code).unwrap();

        let call_site = graph.block_at_offset(0).unwrap();
        let subroutine = graph.block_at_offset(4).unwrap();
        let return_site = graph.block_at_offset(3).unwrap();

        let kinds: Vec<&EdgeKind> = graph.out_edges(call_site).map(|edge| &edge.kind).collect();
        assert!(kinds.iter().any(|kind| matches!(kind, EdgeKind::JsrJump(_))));
        assert!(kinds
            .iter()
            .any(|kind| matches!(kind, EdgeKind::JsrFallthrough(_))));

        let jsr_jump = graph
            .out_edges(call_site)
            .find(|edge| matches!(edge.kind, EdgeKind::JsrJump(_)))
            .unwrap();
        assert_eq!(jsr_jump.to, Some(subroutine));

        let jsr_fallthrough = graph
            .out_edges(call_site)
            .find(|edge| matches!(edge.kind, EdgeKind::JsrFallthrough(_)))
            .unwrap();
        assert_eq!(jsr_fallthrough.to, Some(return_site));

        let ret_block = graph.block_at_offset(4).unwrap();
        let ret_edge = graph
            .out_edges(ret_block)
            .find(|edge| matches!(edge.kind, EdgeKind::Ret { .. }))
            .unwrap();
        assert_eq!(ret_edge.to, None);
    }

    #[test]
    fn assemble_round_trips_branches() {
        let mut pool = ConstantPool::new();
        let original = branching_code();
        let graph = Graph::build(&original).unwrap();

        let assembled = graph.assemble(&mut pool).unwrap();
        let reread = instruction::read_code(&pool, &assembled.code).unwrap();
        assert_eq!(reread, original.code);
        assert!(assembled.exception_table.is_empty());
    }

    #[test]
    fn assemble_rebuilds_exception_table() {
        let mut pool = ConstantPool::new();
        let mut original = branching_code();
        original.exception_table.push(ExceptionRange {
            start_pc: 0,
            end_pc: 6,
            handler_pc: 6,
            catch_type: None,
        });

        let graph = Graph::build(&original).unwrap();
        let assembled = graph.assemble(&mut pool).unwrap();

        assert_eq!(assembled.exception_table.len(), 1);
        let range = &assembled.exception_table[0];
        assert_eq!(range.start_pc, 0);
        assert_eq!(range.end_pc, 6);
        assert_eq!(range.handler_pc, 6);
        assert_eq!(range.catch_type, None);
    }

    #[test]
    fn switch_edges_carry_values() {
        // tableswitch over {0, 1} plus default.
        let code = code_attribute(
            vec![
                (0, iconst_0),
                (
                    1,
                    tableswitch {
                        default: 27,
                        low: 7,
                        offsets: vec![23, 25],
                    },
                ),
                (24, iconst_0),
                (25, ireturn),
                (26, iconst_1),
                (27, ireturn),
                (28, iconst_2),
                (29, ireturn),
            ],
            30,
        );

        let graph = Graph::build(&code).unwrap();
        let switch_block = graph.block_at_offset(0).unwrap();

        let values: Vec<Option<i32>> = graph
            .out_edges(switch_block)
            .filter_map(|edge| match &edge.kind {
                EdgeKind::Switch { value } => Some(*value),
                _ => None,
            })
            .collect();

        assert_eq!(values.len(), 3);
        assert!(values.contains(&Some(0)));
        assert!(values.contains(&Some(1)));
        assert!(values.contains(&None));
    }
}
