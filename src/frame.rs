//! Frame arena shared by every active invocation.
//!
//! All frames live in one flat vector of 32-bit slots. A frame owns
//! `[base, base + max_locals)` for its locals and the `max_stack` slots after
//! that for its operand stack. A callee's base sits `num_args` slots below
//! its caller's stack top, so the arguments the caller pushed become the
//! callee's first locals without being copied.
use crate::error::Fault;

type Result<T> = std::result::Result<T, Fault>;

/// Bounds of one invocation inside the arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Frame {
    base: usize,
    max_locals: usize,
    max_stack: usize,
    // Absolute index of the next free operand slot.
    sp: usize,
}

impl Frame {
    const fn operands(&self) -> usize {
        self.base + self.max_locals
    }

    const fn limit(&self) -> usize {
        self.operands() + self.max_stack
    }
}

#[derive(Debug, Default)]
pub struct FrameArena {
    slots: Vec<i32>,
    frames: Vec<Frame>,
}

impl FrameArena {
    pub fn with_capacity(slots: usize) -> Self {
        Self {
            slots: Vec::with_capacity(slots),
            frames: Vec::new(),
        }
    }

    /// Number of active frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Drop every frame. Backing storage is kept for reuse.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.slots.clear();
    }

    fn top(&self) -> Result<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| Fault::malformed("no active frame"))
    }

    fn top_mut(&mut self) -> Result<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| Fault::malformed("no active frame"))
    }

    fn open(
        &mut self,
        base: usize,
        num_args: usize,
        max_locals: usize,
        max_stack: usize,
    ) -> Result<()> {
        if max_locals < num_args {
            return Err(Fault::malformed(format!(
                "{num_args} arguments do not fit in {max_locals} locals"
            )));
        }
        let frame = Frame {
            base,
            max_locals,
            max_stack,
            sp: base + max_locals,
        };
        if self.slots.len() < frame.limit() {
            self.slots.resize(frame.limit(), 0);
        }
        // Slots past the arguments may hold a dead frame's values.
        self.slots[base + num_args..frame.limit()].fill(0);
        self.frames.push(frame);
        Ok(())
    }

    /// Open an outermost frame whose first locals are `args`.
    pub fn enter_with_args(
        &mut self,
        args: &[i32],
        max_locals: usize,
        max_stack: usize,
    ) -> Result<()> {
        let base = match self.frames.last() {
            Some(frame) => frame.limit(),
            None => 0,
        };
        self.slots.truncate(base);
        self.slots.extend_from_slice(args);
        self.open(base, args.len(), max_locals, max_stack)
    }

    /// Open a callee frame over the top `num_args` operands of the current
    /// frame.
    pub fn enter_call(
        &mut self,
        num_args: usize,
        max_locals: usize,
        max_stack: usize,
    ) -> Result<()> {
        let caller = self.top()?;
        if caller.sp - caller.operands() < num_args {
            return Err(Fault::malformed(format!(
                "call needs {num_args} arguments on the operand stack"
            )));
        }
        let base = caller.sp - num_args;
        self.open(base, num_args, max_locals, max_stack)
    }

    /// Close the current frame. The caller's operand stack loses the
    /// arguments and, if `returns_value`, gains the value the callee stored
    /// in its result slot, which is also returned.
    pub fn leave(&mut self, returns_value: bool) -> Result<Option<i32>> {
        let callee = self
            .frames
            .pop()
            .ok_or_else(|| Fault::malformed("no active frame"))?;
        let result = if returns_value {
            // A frame with no locals and no operand slots has nowhere to keep
            // a result.
            let slot = (callee.base < callee.limit()).then_some(callee.base);
            let value = slot
                .and_then(|slot| self.slots.get(slot))
                .ok_or_else(|| Fault::malformed("frame has no slot for its result"))?;
            Some(*value)
        } else {
            None
        };
        if let Some(caller) = self.frames.last_mut() {
            if caller.operands() <= callee.base && callee.base <= caller.sp {
                caller.sp = callee.base + usize::from(returns_value);
                if caller.sp > caller.limit() {
                    return Err(Fault::malformed("operand stack overflow"));
                }
            }
        }
        Ok(result)
    }

    /// Store the method's return value in its result slot, the first local.
    pub fn set_result(&mut self, value: i32) -> Result<()> {
        let frame = *self.top()?;
        if frame.base >= frame.limit() {
            return Err(Fault::malformed("frame has no slot for its result"));
        }
        self.slots[frame.base] = value;
        Ok(())
    }

    pub fn push(&mut self, value: i32) -> Result<()> {
        let frame = self.top_mut()?;
        if frame.sp >= frame.limit() {
            return Err(Fault::malformed("operand stack overflow"));
        }
        let sp = frame.sp;
        frame.sp += 1;
        self.slots[sp] = value;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<i32> {
        let frame = self.top_mut()?;
        if frame.sp <= frame.operands() {
            return Err(Fault::malformed("operand stack underflow"));
        }
        frame.sp -= 1;
        let sp = frame.sp;
        Ok(self.slots[sp])
    }

    pub fn peek(&self) -> Result<i32> {
        let frame = self.top()?;
        if frame.sp <= frame.operands() {
            return Err(Fault::malformed("operand stack underflow"));
        }
        Ok(self.slots[frame.sp - 1])
    }

    /// Number of values on the current operand stack.
    pub fn stack_depth(&self) -> usize {
        self.frames
            .last()
            .map_or(0, |frame| frame.sp - frame.operands())
    }

    pub fn clear_operands(&mut self) -> Result<()> {
        let frame = self.top_mut()?;
        frame.sp = frame.operands();
        Ok(())
    }

    fn local_slot(&self, index: usize) -> Result<usize> {
        let frame = self.top()?;
        if index >= frame.max_locals {
            return Err(Fault::malformed(format!(
                "local {index} out of range for {} locals",
                frame.max_locals
            )));
        }
        Ok(frame.base + index)
    }

    pub fn load(&self, index: usize) -> Result<i32> {
        let slot = self.local_slot(index)?;
        Ok(self.slots[slot])
    }

    pub fn store(&mut self, index: usize, value: i32) -> Result<()> {
        let slot = self.local_slot(index)?;
        self.slots[slot] = value;
        Ok(())
    }

    /// Locals of the current frame.
    pub fn locals(&self) -> &[i32] {
        match self.frames.last() {
            Some(frame) => &self.slots[frame.base..frame.operands()],
            None => &[],
        }
    }
}
