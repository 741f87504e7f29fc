//! Per-function stack frame layout (spec §4.7.3). Every instruction result
//! that is actually read by something gets a slot, sized to its own type
//! except `alloc`, which gets a slot sized to the type it allocates: the IR
//! "address" an `alloc` produces is just `sp` plus this offset, never a
//! pointer stored in memory, so there is no indirection to account for.

use std::collections::HashMap;

use crate::back::raw::{RawBasicBlock, RawFunction, RawType, RawTypeKind, RawValue, ValueKind};

pub const WORD_SIZE: i32 = 4;

fn align16(n: i32) -> i32 {
    (n + 15) / 16 * 16
}

pub fn size_of_raw_type(ty: &RawType) -> i32 {
    match ty.kind() {
        RawTypeKind::Int32 | RawTypeKind::Pointer(_) => WORD_SIZE,
        RawTypeKind::Array(elem, len) => *len as i32 * size_of_raw_type(elem),
        RawTypeKind::Unit => 0,
        RawTypeKind::Function(..) => 0,
    }
}

pub fn pointee_size(ty: &RawType) -> i32 {
    match ty.kind() {
        RawTypeKind::Pointer(inner) => size_of_raw_type(inner),
        other => panic!("alloc of a non-pointer type: {other:?}"),
    }
}

/// The stack location of one live instruction result or `alloc`'d slot.
#[derive(Clone, Copy, Debug)]
pub struct LocalVar {
    pub offset: i32,
    pub is_pointer: bool,
}

/// Stack-frame bookkeeping for a single function, built once before any
/// instruction is emitted for it.
pub struct Frame<'p> {
    local_vars: HashMap<RawValue<'p>, i32>,
    local_vars_size: i32,
    arg_num_max: Option<usize>,
    block_names: HashMap<RawBasicBlock<'p>, String>,
}

fn is_local_instruction(kind: &ValueKind) -> bool {
    matches!(
        kind,
        ValueKind::Alloc(_)
            | ValueKind::Load(_)
            | ValueKind::Store(_)
            | ValueKind::GetPtr(_)
            | ValueKind::GetElemPtr(_)
            | ValueKind::Binary(_)
            | ValueKind::Branch(_)
            | ValueKind::Jump(_)
            | ValueKind::Call(_)
            | ValueKind::Return(_)
    )
}

impl<'p> Frame<'p> {
    /// Walks every parameter and instruction in source order, reserving a
    /// stack slot for each value that is actually used, and records the
    /// largest argument count passed to any callee (needed for the
    /// >8-argument stack-spill area).
    pub fn build(func: &RawFunction<'p>) -> Frame<'p> {
        let mut frame = Frame {
            local_vars: HashMap::new(),
            local_vars_size: 0,
            arg_num_max: None,
            block_names: HashMap::new(),
        };

        for bb in func.bbs() {
            for value in bb.insts() {
                if is_local_instruction(&value.kind()) && value.used_by().len() > 0 {
                    frame.add_space_for(value);
                }
                if let ValueKind::Call(call) = value.kind() {
                    frame.update_arg_num_max(call.args().len());
                }
            }
        }

        for bb in func.bbs() {
            let mangled = format!(
                "{}_{}",
                func.name().trim_start_matches('@'),
                bb.name().map(|n| n.trim_start_matches('%')).unwrap_or("")
            );
            frame.block_names.insert(*bb, mangled);
        }

        frame
    }

    fn update_arg_num_max(&mut self, n: usize) {
        self.arg_num_max = Some(self.arg_num_max.map_or(n, |m| m.max(n)));
    }

    pub fn is_leaf_function(&self) -> bool {
        self.arg_num_max.is_none()
    }

    fn add_space_for(&mut self, value: RawValue<'p>) {
        let size = if let ValueKind::Alloc(_) = value.kind() {
            pointee_size(value.ty())
        } else {
            size_of_raw_type(value.ty())
        };
        let offset = self.local_vars_size;
        self.local_vars.insert(value, offset);
        self.local_vars_size += size;
    }

    /// Total bytes to reserve below `sp` on entry: the `ra` save slot (if
    /// this function makes any calls), every local's slot, and the area
    /// this function itself needs to pass more than 8 arguments to a
    /// callee, rounded up to 16-byte alignment.
    pub fn stack_frame_size(&self) -> i32 {
        let ra = if self.is_leaf_function() { 0 } else { WORD_SIZE };
        let extra_args = match self.arg_num_max {
            Some(n) if n > 8 => (n as i32 - 8) * WORD_SIZE,
            _ => 0,
        };
        align16(ra + self.local_vars_size + extra_args)
    }

    /// The stack slot a value was assigned, if any; `None` means the value
    /// was never read (its result is dead) and occupies no slot.
    pub fn local_var_info(&self, value: RawValue<'p>) -> Option<LocalVar> {
        let raw_offset = *self.local_vars.get(&value)?;
        let frame_size = self.stack_frame_size();
        let ra_slot = if self.is_leaf_function() { 0 } else { WORD_SIZE };
        let offset = frame_size - ra_slot - self.local_vars_size + raw_offset;
        let is_pointer = matches!(value.ty().kind(), RawTypeKind::Pointer(_))
            && !matches!(value.kind(), ValueKind::Alloc(_));
        Some(LocalVar { offset, is_pointer })
    }

    pub fn riscv_block_name(&self, bb: RawBasicBlock<'p>) -> &str {
        &self.block_names[&bb]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_rounds_up_to_16() {
        assert_eq!(align16(0), 0);
        assert_eq!(align16(1), 16);
        assert_eq!(align16(16), 16);
        assert_eq!(align16(17), 32);
    }
}
