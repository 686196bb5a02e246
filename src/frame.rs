use crate::{
    function::{FunctionInfo, SourceLocation},
    value::Constant,
};

#[cold]
#[inline(never)]
#[track_caller]
fn slot_out_of_bounds(capacity: usize, index: usize) -> ! {
    panic!("stack slot out of bounds: the capacity is {capacity} but the index is {index}")
}

#[cold]
#[inline(never)]
#[track_caller]
fn stack_overflow(capacity: usize) -> ! {
    panic!("stack frame overflow: all {capacity} slots are in use")
}

#[cold]
#[inline(never)]
#[track_caller]
fn stack_underflow() -> ! {
    panic!("stack frame underflow: pop from an empty frame")
}

/// The value storage of one function call.
///
/// The frame is a fixed array of slots, sized once at construction. Local variables live in the low
/// slots and the evaluation stack grows above them, so the top index starts at the local count.
/// `push`/`pop` work at the top; `load`/`store` address any slot by index.
///
/// The dispatcher is responsible for staying within the frame's capacity. Violations panic rather
/// than touching memory outside the frame.
#[derive(Clone, Debug)]
pub struct StackFrame<'a> {
    info: &'a FunctionInfo,
    stack: Box<[Constant]>,
    top: usize,
    offset: usize,
}

impl<'a> StackFrame<'a> {
    /// Creates a frame with [`FunctionInfo::frame_capacity`] slots.
    pub fn new(info: &'a FunctionInfo) -> Self {
        Self::with_capacity(info, info.frame_capacity())
    }

    /// Creates a frame with exactly `capacity` slots, or one slot per local if that is more.
    pub fn with_capacity(info: &'a FunctionInfo, capacity: usize) -> Self {
        let locals = info.local_variable_count as usize;

        Self {
            info,
            stack: vec![Constant::None; capacity.max(locals)].into_boxed_slice(),
            top: locals,
            offset: 0,
        }
    }

    #[inline(always)]
    pub fn info(&self) -> &'a FunctionInfo {
        self.info
    }

    /// The total number of slots, locals included.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.stack.len()
    }

    /// The index one past the topmost live slot.
    #[inline(always)]
    pub fn depth(&self) -> usize {
        self.top
    }

    #[track_caller]
    pub fn push(&mut self, constant: Constant) {
        if self.try_push(constant).is_err() {
            stack_overflow(self.capacity())
        }
    }

    /// Pushes `constant`, handing it back if the frame is full.
    pub fn try_push(&mut self, constant: Constant) -> Result<(), Constant> {
        match self.stack.get_mut(self.top) {
            Some(slot) => {
                *slot = constant;
                self.top += 1;
                Ok(())
            }
            None => Err(constant),
        }
    }

    #[track_caller]
    pub fn pop(&mut self) -> Constant {
        match self.try_pop() {
            Some(constant) => constant,
            None => stack_underflow(),
        }
    }

    pub fn try_pop(&mut self) -> Option<Constant> {
        self.top = self.top.checked_sub(1)?;
        Some(self.stack[self.top])
    }

    /// The value at the top of the stack.
    #[track_caller]
    pub fn top(&self) -> Constant {
        match self.top.checked_sub(1) {
            Some(index) => self.stack[index],
            None => stack_underflow(),
        }
    }

    /// Pops the top of the stack into slot `index`.
    #[track_caller]
    pub fn store(&mut self, index: usize) {
        if index >= self.capacity() {
            slot_out_of_bounds(self.capacity(), index)
        }

        let value = self.pop();
        self.stack[index] = value;
    }

    /// Pushes a copy of slot `index`, leaving the slot itself untouched.
    #[track_caller]
    pub fn load(&mut self, index: usize) {
        match self.slot(index) {
            Some(value) => self.push(value),
            None => slot_out_of_bounds(self.capacity(), index),
        }
    }

    /// Reads slot `index` without touching the stack.
    pub fn slot(&self, index: usize) -> Option<Constant> {
        self.stack.get(index).copied()
    }

    /// The constant at `index` of the running function's constant pool.
    pub fn constant(&self, index: usize) -> Option<Constant> {
        self.info.constant_list.get(index)
    }

    /// The index of the instruction being executed.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline(always)]
    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    #[inline(always)]
    pub fn advance(&mut self) {
        self.offset += 1;
    }

    pub fn source_location(&self) -> SourceLocation {
        self.info.source_location(self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Instruction, OpCode};

    fn info(locals: u32, operands: u64) -> FunctionInfo {
        FunctionInfo {
            local_variable_count: locals,
            stack_operand_count: operands,
            ..FunctionInfo::new("f")
        }
    }

    #[test]
    fn top_starts_above_locals() {
        let info = info(3, 2);
        let frame = StackFrame::new(&info);

        assert_eq!(frame.depth(), 3);
        assert_eq!(frame.capacity(), 5 + FunctionInfo::EVALUATION_SLOTS);
        assert_eq!(frame.slot(0), Some(Constant::None));
    }

    #[test]
    fn balanced_push_pop_restores_top() {
        let info = info(1, 3);
        let mut frame = StackFrame::new(&info);
        let before = frame.depth();

        frame.push(Constant::Integer(1));
        frame.push(Constant::Boolean(true));
        frame.push(Constant::Real(2.5));
        assert_eq!(frame.top(), Constant::Real(2.5));

        assert_eq!(frame.pop(), Constant::Real(2.5));
        assert_eq!(frame.pop(), Constant::Boolean(true));
        assert_eq!(frame.pop(), Constant::Integer(1));
        assert_eq!(frame.depth(), before);
    }

    #[test]
    fn store_then_load_reproduces_value() {
        let info = info(2, 2);
        let mut frame = StackFrame::new(&info);

        frame.push(Constant::Character('😀'));
        let before_store = frame.depth() - 1;
        frame.store(1);
        assert_eq!(frame.depth(), before_store);

        frame.load(1);
        assert_eq!(frame.top(), Constant::Character('😀'));
        assert_eq!(frame.slot(1), Some(Constant::Character('😀')));
        assert_eq!(frame.depth(), before_store + 1);
    }

    #[test]
    fn try_push_reports_full_frame() {
        let info = info(0, 1);
        let mut frame = StackFrame::with_capacity(&info, 1);

        assert!(frame.try_push(Constant::Integer(1)).is_ok());
        assert_eq!(
            frame.try_push(Constant::Integer(2)),
            Err(Constant::Integer(2))
        );
    }

    #[test]
    fn capacity_never_below_locals() {
        let info = info(4, 0);
        let frame = StackFrame::with_capacity(&info, 1);

        assert_eq!(frame.capacity(), 4);
        assert_eq!(frame.depth(), 4);
    }

    #[test]
    fn try_pop_on_empty_frame() {
        let info = info(0, 1);
        let mut frame = StackFrame::new(&info);

        assert_eq!(frame.try_pop(), None);
        assert_eq!(frame.depth(), 0);
    }

    #[test]
    #[should_panic(expected = "stack frame overflow")]
    fn push_past_capacity_panics() {
        let info = info(1, 0);
        let mut frame = StackFrame::with_capacity(&info, 1);

        frame.push(Constant::None);
    }

    #[test]
    #[should_panic(expected = "stack slot out of bounds")]
    fn store_out_of_range_panics() {
        let info = info(1, 1);
        let mut frame = StackFrame::new(&info);

        frame.push(Constant::Integer(1));
        frame.store(frame.capacity());
    }

    #[test]
    fn push_then_store_local() {
        let mut info = info(2, 0);
        info.constant_list.push(5i64);
        info.instruction_list
            .push(Instruction::with_index(OpCode::Push, 0).unwrap());
        info.instruction_list
            .push(Instruction::with_index(OpCode::StoreLocal, 0).unwrap());

        let mut frame = StackFrame::new(&info);

        while let Some(instruction) = info.instruction_list.get(frame.offset()) {
            let index = instruction.index().unwrap() as usize;

            match instruction.opcode() {
                OpCode::Push => frame.push(frame.constant(index).unwrap()),
                OpCode::StoreLocal => frame.store(index),
                other => panic!("unexpected opcode {other}"),
            }

            frame.advance();
        }

        assert_eq!(frame.slot(0), Some(Constant::Integer(5)));
        assert_eq!(frame.depth(), 2);
    }
}
