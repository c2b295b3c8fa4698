//! Core event-driven CPU implementation.
//!
//! The VM runs up to [`MAX_CORES`] cores, each an independent call stack
//! of [`State`] frames over a shared program. One
//! [`single_process`](EventVm::single_process) delivers one unit of work
//! to every core in creation order; cores whose call stacks empty are
//! freed at the end of the pass. All cores share one key-value memory
//! owned by the VM.

use crate::errors::VmError;
use crate::event::isa::{default_lib, InstLib};
use crate::event::memory::Memory;
use crate::event::tag::Tag;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;

/// Arguments carried by every instruction.
pub const MAX_INST_ARGS: usize = 3;

/// Maximum number of parallel cores.
pub const MAX_CORES: usize = 64;

/// Maximum call-stack depth per core.
pub const MAX_CALL_DEPTH: usize = 128;

/// One program position: an opcode id into the instruction library, three
/// integer arguments, and a tag for similarity-based dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Instruction {
    pub id: usize,
    pub args: [i32; MAX_INST_ARGS],
    pub tag: Tag,
}

impl Instruction {
    /// Creates an instruction with the default tag.
    pub fn new(id: usize, a0: i32, a1: i32, a2: i32) -> Self {
        Self {
            id,
            args: [a0, a1, a2],
            tag: Tag::default(),
        }
    }

    /// Replaces the tag.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = tag;
        self
    }

    /// Overwrites this instruction in place, resetting its tag.
    pub fn set(&mut self, id: usize, a0: i32, a1: i32, a2: i32) {
        *self = Self::new(id, a0, a1, a2);
    }
}

/// What an event carries besides its payload.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum EventKind {
    #[default]
    None,
    Message,
    Signal,
}

/// A queued event: kind, dispatch tag, and message payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub tag: Tag,
    pub msg: Memory,
}

impl Event {
    pub fn new(kind: EventKind, tag: Tag, msg: Memory) -> Self {
        Self { kind, tag, msg }
    }
}

/// A nested code region within a function body.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockKind {
    Basic,
    Loop,
}

/// One open block of the executing frame.
#[derive(Clone, Copy, Debug)]
pub struct Block {
    pub begin: usize,
    pub end: usize,
    pub kind: BlockKind,
}

/// A tagged function: the unit of dispatch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Function {
    pub tag: Tag,
    pub insts: Vec<Instruction>,
}

impl Function {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            insts: Vec::new(),
        }
    }

    /// Appends an instruction to the body.
    pub fn push_inst(&mut self, inst: Instruction) {
        self.insts.push(inst);
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }
}

/// A program: an ordered table of functions. Function 0 is where the main
/// frame starts.
pub type Program = Vec<Function>;

/// One call frame: instruction and function pointers, three private
/// memories, and the stack of open blocks.
///
/// The main frame (bottom of core 0) is special: when its instruction
/// pointer runs off the function it wraps instead of returning, keeping
/// the machine alive indefinitely.
#[derive(Clone, Debug)]
pub struct State {
    func_ptr: usize,
    inst_ptr: usize,
    local_mem: Memory,
    input_mem: Memory,
    output_mem: Memory,
    block_stack: Vec<Block>,
    is_main: bool,
}

impl State {
    fn new(is_main: bool) -> Self {
        Self {
            func_ptr: 0,
            inst_ptr: 0,
            local_mem: Memory::new(),
            input_mem: Memory::new(),
            output_mem: Memory::new(),
            block_stack: Vec::new(),
            is_main,
        }
    }

    pub fn get_fp(&self) -> usize {
        self.func_ptr
    }

    pub fn get_ip(&self) -> usize {
        self.inst_ptr
    }

    pub fn set_fp(&mut self, fp: usize) {
        self.func_ptr = fp;
    }

    pub fn set_ip(&mut self, ip: usize) {
        self.inst_ptr = ip;
    }

    pub fn is_main(&self) -> bool {
        self.is_main
    }

    /// Opens a block over `[begin, end)` of the current function.
    pub fn push_block(&mut self, begin: usize, end: usize, kind: BlockKind) {
        self.block_stack.push(Block { begin, end, kind });
    }

    pub fn block_depth(&self) -> usize {
        self.block_stack.len()
    }

    // Reads return the stored value or the default, without inserting.

    pub fn get_local(&self, key: i64) -> f64 {
        self.local_mem.get(key)
    }

    pub fn get_input(&self, key: i64) -> f64 {
        self.input_mem.get(key)
    }

    pub fn get_output(&self, key: i64) -> f64 {
        self.output_mem.get(key)
    }

    pub fn set_local(&mut self, key: i64, value: f64) {
        self.local_mem.set(key, value);
    }

    pub fn set_input(&mut self, key: i64, value: f64) {
        self.input_mem.set(key, value);
    }

    pub fn set_output(&mut self, key: i64, value: f64) {
        self.output_mem.set(key, value);
    }

    // Accesses materialize the slot at the default value first.

    pub fn access_local(&mut self, key: i64) -> &mut f64 {
        self.local_mem.access(key)
    }

    pub fn access_input(&mut self, key: i64) -> &mut f64 {
        self.input_mem.access(key)
    }

    pub fn access_output(&mut self, key: i64) -> &mut f64 {
        self.output_mem.access(key)
    }

    pub fn local_memory(&self) -> &Memory {
        &self.local_mem
    }

    pub fn input_memory(&self) -> &Memory {
        &self.input_mem
    }

    pub fn output_memory(&self) -> &Memory {
        &self.output_mem
    }
}

/// Event-driven multi-core CPU.
///
/// Execution faults never abort: arithmetic faults bump the error counter,
/// and spawning or calling beyond the resource limits is silently ignored.
/// The event queue is a mailbox only; delivery is the driver's explicit
/// call (typically [`next_event`](Self::next_event) followed by
/// [`spawn_core`](Self::spawn_core) with the event's tag and payload).
pub struct EventVm {
    /// Instruction catalogue; opcode ids index into it.
    inst_lib: Arc<InstLib>,
    /// Memory shared by every frame of every core.
    shared_mem: Memory,
    /// Loaded program.
    program: Program,
    /// Live cores, in creation order. Each is a call stack of frames.
    cores: Vec<Vec<State>>,
    /// Index of the core currently receiving work.
    cur_core: usize,
    /// Pending events, oldest first.
    event_queue: VecDeque<Event>,
    /// Count of divide- and mod-by-zero faults.
    errors: usize,
}

impl EventVm {
    /// Creates a CPU over the default instruction library.
    pub fn new() -> Self {
        Self::with_inst_lib(default_lib())
    }

    /// Creates a CPU over a driver-supplied instruction library.
    pub fn with_inst_lib(inst_lib: Arc<InstLib>) -> Self {
        Self {
            inst_lib,
            shared_mem: Memory::new(),
            program: Program::new(),
            cores: vec![vec![State::new(true)]],
            cur_core: 0,
            event_queue: VecDeque::new(),
            errors: 0,
        }
    }

    // -- Control --

    /// Resets everything, including the program.
    pub fn reset(&mut self) {
        self.program.clear();
        self.reset_hardware();
    }

    /// Resets the hardware but keeps the program: every core and frame is
    /// destroyed, then the root is rebuilt as one core holding one main
    /// frame.
    pub fn reset_hardware(&mut self) {
        self.shared_mem.clear();
        self.event_queue.clear();
        self.cores.clear();
        self.cores.push(vec![State::new(true)]);
        self.cur_core = 0;
        self.errors = 0;
    }

    // -- Accessors --

    pub fn get_inst_lib(&self) -> &InstLib {
        &self.inst_lib
    }

    pub fn get_program(&self) -> &Program {
        &self.program
    }

    pub fn get_function(&self, id: usize) -> Option<&Function> {
        self.program.get(id)
    }

    pub fn get_inst(&self, fid: usize, pos: usize) -> Option<Instruction> {
        self.program.get(fid)?.insts.get(pos).copied()
    }

    pub fn valid_position(&self, fid: usize, pos: usize) -> bool {
        self.program.get(fid).is_some_and(|f| pos < f.len())
    }

    pub fn get_num_cores(&self) -> usize {
        self.cores.len()
    }

    pub fn get_num_errors(&self) -> usize {
        self.errors
    }

    /// Bumps the error counter. Public so driver-supplied instruction
    /// bodies can participate in the fault policy.
    pub fn count_error(&mut self) {
        self.errors += 1;
    }

    /// Returns the executing frame of the current core.
    pub fn get_cur_state(&self) -> Option<&State> {
        self.cores.get(self.cur_core)?.last()
    }

    pub fn get_cur_state_mut(&mut self) -> Option<&mut State> {
        self.cores.get_mut(self.cur_core)?.last_mut()
    }

    // -- Shared memory --

    pub fn get_shared(&self, key: i64) -> f64 {
        self.shared_mem.get(key)
    }

    pub fn set_shared(&mut self, key: i64, value: f64) {
        self.shared_mem.set(key, value);
    }

    pub fn access_shared(&mut self, key: i64) -> &mut f64 {
        self.shared_mem.access(key)
    }

    pub fn shared_memory(&self) -> &Memory {
        &self.shared_mem
    }

    // -- Configuration --

    /// Appends a function to the program.
    pub fn add_function(&mut self, function: Function) {
        self.program.push(function);
    }

    /// Replaces the whole program. Hardware state is left untouched.
    pub fn set_program(&mut self, program: Program) {
        self.program = program;
    }

    /// Overwrites the instruction at `pos` of function `fid`.
    pub fn set_inst(
        &mut self,
        fid: usize,
        pos: usize,
        id: usize,
        a0: i32,
        a1: i32,
        a2: i32,
    ) -> Result<(), VmError> {
        let count = self.program.len();
        let function = self
            .program
            .get_mut(fid)
            .ok_or(VmError::InvalidFunction { id: fid, count })?;
        let len = function.insts.len();
        let slot = function
            .insts
            .get_mut(pos)
            .ok_or(VmError::InvalidPosition { pos, len })?;
        slot.set(id, a0, a1, a2);
        Ok(())
    }

    // -- Events --

    /// Enqueues an event. Never fails; the queue is unbounded.
    pub fn queue_event(&mut self, event: Event) {
        self.event_queue.push_back(event);
    }

    /// Dequeues the oldest pending event. The machine never consumes the
    /// queue on its own.
    pub fn next_event(&mut self) -> Option<Event> {
        self.event_queue.pop_front()
    }

    pub fn num_queued_events(&self) -> usize {
        self.event_queue.len()
    }

    // -- Tag dispatch --

    /// Selects the function whose tag lies closest to `tag`: smallest
    /// Hamming distance, lowest index on ties.
    pub fn find_best_match(&self, tag: Tag) -> Option<usize> {
        self.program
            .iter()
            .enumerate()
            .min_by_key(|(_, f)| f.tag.hamming_distance(tag))
            .map(|(idx, _)| idx)
    }

    /// Spawns a core running the best-matching function, seeded with
    /// `input`. Silently ignored at [`MAX_CORES`] or without a matching
    /// function. The core joins the tail of the list and first runs on the
    /// next pass.
    pub fn spawn_core(&mut self, tag: Tag, input: Memory) -> Option<usize> {
        if self.cores.len() >= MAX_CORES {
            return None;
        }
        let fid = self.find_best_match(tag)?;
        let mut state = State::new(false);
        state.func_ptr = fid;
        state.input_mem = input;
        self.cores.push(vec![state]);
        Some(self.cores.len() - 1)
    }

    /// Pushes a frame for the best-matching function onto the current
    /// core, seeding its input with the caller's local memory. Silently
    /// ignored at [`MAX_CALL_DEPTH`] or without a matching function.
    pub fn call_function(&mut self, tag: Tag) {
        let Some(fid) = self.find_best_match(tag) else {
            return;
        };
        let Some(core) = self.cores.get_mut(self.cur_core) else {
            return;
        };
        if core.len() >= MAX_CALL_DEPTH {
            return;
        }
        let mut state = State::new(false);
        state.func_ptr = fid;
        if let Some(caller) = core.last() {
            state.input_mem = caller.local_mem.clone();
        }
        core.push(state);
    }

    // -- Execution --

    /// Executes a single instruction against the current state, through
    /// the library's dispatch table.
    pub fn process_inst(&mut self, inst: &Instruction) {
        let func = self.inst_lib.get(inst.id).map(|def| def.func);
        match func {
            Some(func) => func(self, inst),
            None => debug_assert!(false, "instruction id {} not in library", inst.id),
        }
    }

    /// Delivers one unit of work to every core, in creation order.
    ///
    /// Cores spawned during the pass wait for the next one; cores whose
    /// call stacks emptied are freed afterwards, surviving cores keeping
    /// their relative order. No-op without a program.
    pub fn single_process(&mut self) {
        if self.program.is_empty() {
            return;
        }
        let core_cnt = self.cores.len();
        for idx in 0..core_cnt {
            self.cur_core = idx;
            self.step_core(idx);
        }
        self.cores.retain(|frames| !frames.is_empty());
        self.cur_core = 0;
    }

    /// Delivers `num_inst` units of work.
    pub fn process(&mut self, num_inst: usize) {
        for _ in 0..num_inst {
            self.single_process();
        }
    }

    /// One unit of work for one core.
    fn step_core(&mut self, idx: usize) {
        let Some(state) = self.cores.get(idx).and_then(|core| core.last()) else {
            return;
        };
        let fp = state.func_ptr;
        let ip = state.inst_ptr;
        let has_blocks = !state.block_stack.is_empty();
        let is_main_alone = state.is_main && self.cores[idx].len() == 1;

        // A stale frame pointer leaves the core idle.
        let Some(function) = self.program.get(fp) else {
            return;
        };
        let flen = function.len();

        if ip >= flen {
            if has_blocks {
                if let Some(state) = self.cores[idx].last_mut() {
                    Self::close_block(state);
                }
            } else if is_main_alone {
                // The main frame wraps for free: instruction 0 runs in
                // this same unit.
                if let Some(state) = self.cores[idx].last_mut() {
                    state.inst_ptr = 0;
                }
                if flen > 0 {
                    self.exec_at(idx, fp, 0);
                }
            } else {
                self.return_function(idx);
            }
        } else {
            self.exec_at(idx, fp, ip);
        }
    }

    /// Advances the frame past `ip`, then runs the instruction at
    /// `(fp, ip)`. The advance happens first so the body may retarget the
    /// frame.
    fn exec_at(&mut self, idx: usize, fp: usize, ip: usize) {
        if let Some(state) = self.cores.get_mut(idx).and_then(|core| core.last_mut()) {
            state.inst_ptr = ip + 1;
        }
        let inst = self.program[fp].insts[ip];
        self.process_inst(&inst);
    }

    /// Closes the frame's innermost block, if any. A loop block moves the
    /// instruction pointer back to its beginning.
    fn close_block(state: &mut State) {
        let Some(block) = state.block_stack.last() else {
            return;
        };
        if block.kind == BlockKind::Loop {
            state.inst_ptr = block.begin;
        }
        state.block_stack.pop();
    }

    /// Returns from the top frame of core `idx`, merging its output memory
    /// into the caller's local memory (overwriting on key collisions).
    fn return_function(&mut self, idx: usize) {
        let Some(core) = self.cores.get_mut(idx) else {
            return;
        };
        let Some(returning) = core.pop() else {
            return;
        };
        if let Some(caller) = core.last_mut() {
            for (&key, &value) in returning.output_mem.iter() {
                caller.local_mem.set(key, value);
            }
        }
    }

    // -- Printing --

    /// Writes one instruction as `name arg0 ...`, using only the first
    /// `arity` arguments.
    pub fn write_inst<W: Write>(&self, inst: &Instruction, w: &mut W) -> io::Result<()> {
        match self.inst_lib.get(inst.id) {
            Some(def) => {
                write!(w, "{}", def.name)?;
                for i in 0..def.num_args {
                    write!(w, " {}", inst.args[i])?;
                }
            }
            None => write!(w, "Unknown-{}", inst.id)?,
        }
        Ok(())
    }

    /// Writes the whole program, one `Fn-<id> <tag>:` header per function
    /// with its instructions indented below.
    pub fn write_program<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for (fid, function) in self.program.iter().enumerate() {
            writeln!(w, "Fn-{} {}:", fid, function.tag)?;
            for inst in &function.insts {
                write!(w, "  ")?;
                self.write_inst(inst, w)?;
                writeln!(w)?;
            }
            writeln!(w)?;
        }
        Ok(())
    }

    /// Writes the full hardware state: shared memory, then every core's
    /// call stack, top frame first.
    pub fn write_state<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "Shared memory: ")?;
        Self::write_memory(&self.shared_mem, w)?;
        writeln!(w)?;
        for (idx, core) in self.cores.iter().enumerate() {
            writeln!(w, "Core {}:", idx)?;
            writeln!(w, "  Call stack ({}):", core.len())?;
            writeln!(w, "    --TOP--")?;
            for state in core.iter().rev() {
                write!(w, "    Inst ptr: {} (", state.inst_ptr)?;
                match self.get_inst(state.func_ptr, state.inst_ptr) {
                    Some(inst) => self.write_inst(&inst, w)?,
                    None => write!(w, "NONE")?,
                }
                writeln!(w, ")")?;
                writeln!(w, "    Func ptr: {}", state.func_ptr)?;
                write!(w, "    Input memory: ")?;
                Self::write_memory(&state.input_mem, w)?;
                writeln!(w)?;
                write!(w, "    Local memory: ")?;
                Self::write_memory(&state.local_mem, w)?;
                writeln!(w)?;
                write!(w, "    Output memory: ")?;
                Self::write_memory(&state.output_mem, w)?;
                writeln!(w)?;
                writeln!(w, "    ---")?;
            }
        }
        Ok(())
    }

    fn write_memory<W: Write>(mem: &Memory, w: &mut W) -> io::Result<()> {
        for (key, value) in mem.iter() {
            write!(w, "{{{}:{}}}", key, value)?;
        }
        Ok(())
    }
}

impl Default for EventVm {
    fn default() -> Self {
        Self::new()
    }
}
