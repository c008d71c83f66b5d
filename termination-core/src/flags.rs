//! The Symmetric Flag Store.
//!
//! [`SymmetricState`] owns the substrate handle and every symmetric
//! allocation the protocol needs, allocated once, collectively, in a fixed
//! order. There is no process-wide mutable static; the handle is created
//! once per simulated PE and threaded explicitly through every operation in
//! `fanin`, `fanout`, `dynamic`, and `gate`.
//!
//! Level 0 and the levels above it share one flat, struct-of-arrays layout
//! per level rather than an array of pointers to per-group arrays, so the
//! whole mailbox for a level is one contiguous allocation regardless of how
//! ragged its last group is.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Instant;

use termination_adapter::{SlotF64, SlotI64, Substrate};
use termination_logging::{silent, stderr_logger, Logger, TerminationEvent};

use crate::error::{Result, TerminationError};
use crate::topology::Topology;

/// The distinguished "done" value written to a gate or mailbox slot to mark
/// completion. See `DESIGN.md` for why `-1` was chosen over `1`.
pub const DONE_SENTINEL: i64 = -1;

/// Tags a symmetric slot kind for the debug single-writer probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum WriteKind {
    Mailbox,
    Token,
    Gate,
    GroupLeader,
    GroupDone,
}

/// All symmetric state for one run, owned by one simulated PE.
pub struct SymmetricState<S: Substrate> {
    substrate: S,
    topology: Topology,
    debug: bool,

    local_done: SlotI64,
    elapsed_ms: SlotF64,
    started_at: Instant,

    mailbox_base: Vec<usize>,
    mailbox_cap: Vec<usize>,
    mailbox_slots: Vec<SlotI64>,

    token_slots: Vec<SlotI64>,

    gate: SlotI64,

    leaf_counter_slots: Vec<SlotI64>,
    child_done_count_base: Vec<usize>,
    child_done_count_slots: Vec<SlotI64>,
    group_leader_slots: Vec<SlotI64>,
    group_done_slots: Vec<SlotI64>,

    agg_printed: SlotI64,
    root_go: SlotI64,
    exit_acks: SlotI64,

    writers: RefCell<HashMap<(WriteKind, usize), usize>>,
    logger: Logger<TerminationEvent>,
}

impl<S: Substrate> SymmetricState<S> {
    /// Allocates every symmetric entity this run needs, in the same order
    /// on every PE, then fences with a barrier so no PE reads another's
    /// state before it exists.
    pub fn new(substrate: S, topology: Topology, debug: bool) -> Result<Self> {
        let local_done = substrate.alloc_i64(0)?;
        let elapsed_ms = substrate.alloc_f64(0.0)?;

        let levels = topology.levels();
        let mut mailbox_base = Vec::with_capacity(levels);
        let mut mailbox_cap = Vec::with_capacity(levels);
        let mut mailbox_slots = Vec::new();
        for level in 0..levels {
            let cap = if level == 0 { topology.leaf_group_size } else { topology.branch_factor };
            mailbox_base.push(mailbox_slots.len());
            mailbox_cap.push(cap);
            for _ in 0..topology.groups_at(level) * cap {
                mailbox_slots.push(substrate.alloc_i64(0)?);
            }
        }

        let mut token_slots = Vec::new();
        for level in 0..levels {
            for _ in 0..topology.groups_at(level) {
                token_slots.push(substrate.alloc_i64(0)?);
            }
        }

        let gate = substrate.alloc_i64(0)?;

        let mut leaf_counter_slots = Vec::new();
        for _ in 0..topology.groups_at(0) {
            leaf_counter_slots.push(substrate.alloc_i64(0)?);
        }

        let mut child_done_count_base = vec![0usize; levels];
        let mut child_done_count_slots = Vec::new();
        for level in 1..levels {
            child_done_count_base[level] = child_done_count_slots.len();
            for _ in 0..topology.groups_at(level) {
                child_done_count_slots.push(substrate.alloc_i64(0)?);
            }
        }

        let mut group_leader_slots = Vec::new();
        let mut group_done_slots = Vec::new();
        for level in 0..levels {
            for _ in 0..topology.groups_at(level) {
                group_leader_slots.push(substrate.alloc_i64(-1)?);
                group_done_slots.push(substrate.alloc_i64(0)?);
            }
        }

        let agg_printed = substrate.alloc_i64(0)?;
        let root_go = substrate.alloc_i64(0)?;
        let exit_acks = substrate.alloc_i64(0)?;

        let logger = if debug { stderr_logger(substrate.index()) } else { silent() };

        substrate.barrier_all();
        let started_at = Instant::now();

        Ok(SymmetricState {
            substrate,
            topology,
            debug,
            local_done,
            elapsed_ms,
            started_at,
            mailbox_base,
            mailbox_cap,
            mailbox_slots,
            token_slots,
            gate,
            leaf_counter_slots,
            child_done_count_base,
            child_done_count_slots,
            group_leader_slots,
            group_done_slots,
            agg_printed,
            root_go,
            exit_acks,
            writers: RefCell::new(HashMap::new()),
            logger,
        })
    }

    /// This PE's id.
    pub fn me(&self) -> usize {
        self.substrate.index()
    }

    /// The planned topology this state was allocated for.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Direct access to the underlying substrate, for primitives the
    /// protocol engines issue directly (`quiet`, `barrier_all`, `global_exit`).
    pub fn substrate(&self) -> &S {
        &self.substrate
    }

    /// This PE's event logger: silent unless `Config::debug` selected a
    /// `stderr_logger` at construction.
    pub fn logger(&self) -> &Logger<TerminationEvent> {
        &self.logger
    }

    /// `local_done`: 0 = running, [`DONE_SENTINEL`] = locally finished.
    pub fn local_done(&self) -> SlotI64 {
        self.local_done
    }

    /// `elapsed_ms`: milliseconds from start to local completion.
    pub fn elapsed_ms(&self) -> SlotF64 {
        self.elapsed_ms
    }

    /// Writes the milliseconds elapsed since the post-allocation start
    /// barrier into this PE's own `elapsed_ms` slot. Called once, by the
    /// owner PE, at local completion; the write is local so no `quiet` is
    /// needed before the root later reads it remotely.
    pub fn record_elapsed_now(&self) {
        let ms = self.started_at.elapsed().as_secs_f64() * 1000.0;
        self.substrate.put_f64(self.elapsed_ms, ms, self.me());
    }

    /// This PE's own termination gate.
    pub fn gate(&self) -> SlotI64 {
        self.gate
    }

    pub fn agg_printed(&self) -> SlotI64 {
        self.agg_printed
    }

    pub fn root_go(&self) -> SlotI64 {
        self.root_go
    }

    pub fn exit_acks(&self) -> SlotI64 {
        self.exit_acks
    }

    /// `child_mailbox[level][group][index]`, hosted at `owner(level, group)`.
    pub fn mailbox_slot(&self, level: usize, group: usize, index: usize) -> SlotI64 {
        let cap = self.mailbox_cap[level];
        debug_assert!(index < cap, "mailbox index out of range for this level's capacity");
        self.mailbox_slots[self.mailbox_base[level] + group * cap + index]
    }

    /// `bcast_token[level][group]`, hosted at `owner(level, group)`.
    pub fn token_slot(&self, level: usize, group: usize) -> SlotI64 {
        let mut offset = 0;
        for l in 0..level {
            offset += self.topology.groups_at(l);
        }
        self.token_slots[offset + group]
    }

    /// `leaf_counter[group]` (dynamic variant), hosted at the leaf owner.
    pub fn leaf_counter_slot(&self, group: usize) -> SlotI64 {
        self.leaf_counter_slots[group]
    }

    /// `child_done_count[level][group]` (dynamic variant, `level >= 1`),
    /// hosted at the level-`level` owner.
    pub fn child_done_count_slot(&self, level: usize, group: usize) -> SlotI64 {
        self.child_done_count_slots[self.child_done_count_base[level] + group]
    }

    fn group_index(&self, level: usize, group: usize) -> usize {
        let mut offset = 0;
        for l in 0..level {
            offset += self.topology.groups_at(l);
        }
        offset + group
    }

    /// `group_leader[level][group]` (dynamic variant): the PE id that
    /// completed this group, `-1` until assigned.
    pub fn group_leader_slot(&self, level: usize, group: usize) -> SlotI64 {
        self.group_leader_slots[self.group_index(level, group)]
    }

    /// `group_done[level][group]` (dynamic variant): a CAS-guarded 0/1 flag
    /// set before the leader id is published, so a reader of `group_leader`
    /// never observes a leader id for a group that isn't yet marked done.
    pub fn group_done_slot(&self, level: usize, group: usize) -> SlotI64 {
        self.group_done_slots[self.group_index(level, group)]
    }

    /// Debug-mode single-writer probe for `child_mailbox`. No-op when
    /// `debug` is off.
    pub(crate) fn record_mailbox_write(&self, level: usize, group: usize, index: usize, writer: usize) -> Result<()> {
        self.record_write(WriteKind::Mailbox, self.group_index(level, group) * 1000 + index, writer)
    }

    pub(crate) fn record_token_write(&self, level: usize, group: usize, writer: usize) -> Result<()> {
        self.record_write(WriteKind::Token, self.group_index(level, group), writer)
    }

    pub(crate) fn record_gate_write(&self, target_pe: usize, writer: usize) -> Result<()> {
        self.record_write(WriteKind::Gate, target_pe, writer)
    }

    pub(crate) fn record_group_leader_write(&self, level: usize, group: usize, writer: usize) -> Result<()> {
        self.record_write(WriteKind::GroupLeader, self.group_index(level, group), writer)
    }

    /// Debug-mode single-writer probe for `group_done`'s CAS-guarded 0/1
    /// flag. No-op when `debug` is off.
    pub(crate) fn record_group_done_write(&self, level: usize, group: usize, writer: usize) -> Result<()> {
        self.record_write(WriteKind::GroupDone, self.group_index(level, group), writer)
    }

    fn record_write(&self, kind: WriteKind, index: usize, writer: usize) -> Result<()> {
        if !self.debug {
            return Ok(());
        }
        let mut writers = self.writers.borrow_mut();
        match writers.get(&(kind, index)) {
            Some(&existing) if existing != writer => Err(TerminationError::InvariantViolation(format!(
                "slot {kind:?}/{index} written by PE {existing} and again by PE {writer}"
            ))),
            _ => {
                writers.insert((kind, index), writer);
                Ok(())
            }
        }
    }
}
