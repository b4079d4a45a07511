use crate::jvm::code::{InsnId, Instruction, MethodCode};
use crate::jvm::StructuralError;
use crate::util::RefId;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

/// One `jsr`/`ret` call/return region of a method, or the top level
///
/// A subroutine starts at the target of a `jsr` (an `astore` that parks the
/// pushed return address in a local-variable slot), includes everything
/// reachable from there without leaving the region, and is left through a
/// single `ret` operating on that same slot. The instructions reachable from
/// the method entry (or from an exception handler) without passing through a
/// `jsr` target form the pseudo-subroutine called the *top level*; it has no
/// call sites, no leaving `ret` and no return-address slot, and asking it for
/// any of those is a caller bug.
pub struct Subroutine<'m> {
    method: &'m MethodCode,

    /// Entry instruction; for the top level this is the method entry (kept
    /// for traversal seeding and diagnostics, never exposed as callable)
    entry: InsnId,

    /// Slot the entry `astore` parks the return address in; `None` only for
    /// the top level
    return_slot: Option<u16>,

    /// The `jsr` instructions that call this subroutine
    entering_jsrs: BTreeSet<InsnId>,

    /// The single `ret` that leaves this subroutine
    leaving_ret: Option<InsnId>,

    /// Every instruction assigned to this region
    instructions: BTreeSet<InsnId>,
}

impl<'m> Subroutine<'m> {
    fn new(method: &'m MethodCode, entry: InsnId, return_slot: Option<u16>) -> Subroutine<'m> {
        Subroutine {
            method,
            entry,
            return_slot,
            entering_jsrs: BTreeSet::new(),
            leaving_ret: None,
            instructions: BTreeSet::new(),
        }
    }

    /// Is this the top-level pseudo-subroutine?
    pub fn is_top_level(&self) -> bool {
        self.return_slot.is_none()
    }

    /// Is the given instruction part of this region?
    pub fn contains(&self, insn: InsnId) -> bool {
        self.instructions.contains(&insn)
    }

    /// Slot the return address is stored in; `None` for the top level
    pub fn return_slot(&self) -> Option<u16> {
        self.return_slot
    }

    /// The `jsr` instructions calling this subroutine
    ///
    /// Panics when called on the top level, which cannot be called.
    pub fn entering_jsrs(&self) -> &BTreeSet<InsnId> {
        assert!(
            !self.is_top_level(),
            "call sites queried on the top level, which has none",
        );
        &self.entering_jsrs
    }

    /// The single `ret` leaving this subroutine
    ///
    /// Panics when called on the top level, which is not left via `ret`.
    pub fn leaving_ret(&self) -> InsnId {
        assert!(
            !self.is_top_level(),
            "leaving ret queried on the top level, which has none",
        );
        self.leaving_ret
            .expect("leaving ret queried before it was resolved")
    }

    /// Every instruction assigned to this region, in physical order
    pub fn instructions(&self) -> &BTreeSet<InsnId> {
        &self.instructions
    }

    /// Local-variable slots directly read or written by this region's
    /// instructions
    ///
    /// The leaving `ret`'s slot counts; accesses of `long`/`double` values
    /// claim the following slot too.
    pub fn accessed_locals(&self) -> BTreeSet<u16> {
        assert!(
            self.return_slot.is_none() || self.leaving_ret.is_some(),
            "accessed locals queried before the subroutine was fully built",
        );
        let mut slots = BTreeSet::new();
        for &insn in &self.instructions {
            if let Some(access) = self.method.instruction(insn).accessed_local() {
                slots.insert(access.slot);
                if access.width == 2 {
                    slots.insert(access.slot + 1);
                }
            }
        }
        slots
    }

    /// Local-variable slots accessed by this region or any subroutine it
    /// calls, directly or transitively
    ///
    /// The call graph may contain diamonds (one subroutine called from
    /// several others), so the walk keeps a seen-set keyed on region identity
    /// to stay linear.
    pub fn recursively_accessed_locals(&self, table: &Subroutines<'m>) -> BTreeSet<u16> {
        let mut slots = self.accessed_locals();
        let mut seen: HashSet<RefId<Subroutine<'m>>> = HashSet::new();
        let mut pending = self.nested_subroutines(table);
        while let Some(sub) = pending.pop() {
            if !seen.insert(RefId(sub)) {
                continue;
            }
            slots.extend(sub.accessed_locals());
            pending.extend(sub.nested_subroutines(table));
        }
        slots
    }

    /// The distinct subroutines this region calls directly
    ///
    /// Derived from membership on every call rather than stored, so the
    /// region graph carries no back-pointers.
    pub fn nested_subroutines<'t>(&self, table: &'t Subroutines<'m>) -> Vec<&'t Subroutine<'m>> {
        let mut seen = BTreeSet::new();
        let mut nested = Vec::new();
        for &insn in &self.instructions {
            if let Some(target) = self.method.instruction(insn).jsr_target() {
                if seen.insert(target) {
                    nested.push(table.subroutine(target));
                }
            }
        }
        nested
    }

    /// Record a `jsr` calling this subroutine
    ///
    /// The slot stored by the `jsr`'s target must agree with the slot this
    /// region was created with; since regions are keyed by their entry that
    /// cannot normally diverge, but a caller attaching the wrong `jsr` is a
    /// bug worth catching loudly.
    fn add_entering_jsr(&mut self, jsr: InsnId) {
        let target = self
            .method
            .instruction(jsr)
            .jsr_target()
            .expect("call site attached that is not a jsr");
        let stored = match *self.method.instruction(target) {
            Instruction::AStore(slot) => Some(slot),
            _ => None,
        };
        assert!(
            stored == self.return_slot,
            "call site {:?} does not store the return address into slot {:?}",
            jsr,
            self.return_slot,
        );
        self.entering_jsrs.insert(jsr);
    }

    /// All instructions must be added before the leaving `ret` is resolved.
    fn add_instruction(&mut self, insn: InsnId) {
        assert!(
            self.leaving_ret.is_none(),
            "member added after the leaving ret was already resolved",
        );
        self.instructions.insert(insn);
    }

    /// Find the single `ret` among this subroutine's instructions and check
    /// it operates on the entry's slot. Must be invoked exactly once, after
    /// all members are assigned; never for the top level.
    fn resolve_leaving_ret(&mut self) -> Result<(), StructuralError> {
        let expected = self
            .return_slot
            .expect("leaving ret resolved for the top level");
        let mut found: Option<(InsnId, u16)> = None;
        for &insn in &self.instructions {
            if let Instruction::Ret(slot) = *self.method.instruction(insn) {
                match found {
                    Some((first, _)) => {
                        return Err(StructuralError::MultipleRets {
                            entry: self.entry,
                            first,
                            second: insn,
                        })
                    }
                    None => found = Some((insn, slot)),
                }
            }
        }
        let (ret, slot) = found.ok_or(StructuralError::MissingRet { entry: self.entry })?;
        if slot != expected {
            return Err(StructuralError::MismatchedRetSlot {
                entry: self.entry,
                ret,
                expected,
                found: slot,
            });
        }
        self.leaving_ret = Some(ret);
        Ok(())
    }
}

impl fmt::Debug for Subroutine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subroutine")
            .field("return_slot", &self.return_slot)
            .field("entering_jsrs", &self.entering_jsrs)
            .field("leaving_ret", &self.leaving_ret)
            .field("instructions", &self.instructions)
            .finish()
    }
}

/// The subroutines of one method body
///
/// Construction runs the whole analysis: it discovers every `jsr` target,
/// partitions the method's reachable instructions into the top level and one
/// region per target by independent breadth-first traversals, and validates
/// the structural rules that make the partition meaningful:
///
///   - no instruction belongs to two regions (nor to a region and the top
///     level);
///   - every subroutine is left by exactly one `ret`, operating on the slot
///     its entry stores the return address into;
///   - no subroutine instruction is protected by an exception handler, so
///     control flow through subroutines stays predictable;
///   - no call path through the subroutine graph reuses a return-address
///     slot, which rules out direct and mutual recursion.
///
/// Any violation aborts construction with the corresponding
/// [`StructuralError`]. On success the table is immutable and every query is
/// a pure read, so it can be shared freely between later verifier passes.
pub struct Subroutines<'m> {
    top_level: Subroutine<'m>,

    /// Real subroutines, keyed by their entry instruction
    subroutines: HashMap<InsnId, Subroutine<'m>>,
}

impl<'m> Subroutines<'m> {
    /// Analyze a method body
    pub fn new(method: &'m MethodCode) -> Result<Subroutines<'m>, StructuralError> {
        // Every jsr target is the entry of a subroutine; repeated targeting
        // collapses to one entry.
        let mut leaders: BTreeSet<InsnId> = BTreeSet::new();
        for (_, insn) in method.iter() {
            if let Some(target) = insn.jsr_target() {
                leaders.insert(target);
            }
        }

        // One region per entry. The entry must park the pushed return
        // address in a local, or the region has no slot to key its ret on.
        let mut subroutines: HashMap<InsnId, Subroutine<'m>> =
            HashMap::with_capacity(leaders.len());
        for &leader in &leaders {
            let slot = match *method.instruction(leader) {
                Instruction::AStore(slot) => slot,
                _ => return Err(StructuralError::EntryNotReturnAddressStore { entry: leader }),
            };
            subroutines.insert(leader, Subroutine::new(method, leader, Some(slot)));
        }
        let mut top_level = Subroutine::new(method, method.entry(), None);

        // Tell the subroutines about their call sites.
        for (id, insn) in method.iter() {
            if let Some(target) = insn.jsr_target() {
                subroutines
                    .get_mut(&target)
                    .expect("jsr target without an allocated region")
                    .add_entering_jsr(id);
            }
        }

        // Partition by breadth-first traversal, one independent traversal
        // per region. The top level goes first and is additionally seeded at
        // every exception handler's entry: handlers hang off the top level
        // even though they are not physically adjacent to it.
        let mut assigned: HashMap<InsnId, Option<InsnId>> = HashMap::new();

        let mut seeds: Vec<InsnId> = vec![method.entry()];
        seeds.extend(method.handlers().iter().map(|handler| handler.handler));
        let reached = reachable_within(method, &seeds);
        for id in method.ids().filter(|id| reached.contains(id)) {
            assigned.insert(id, None);
            top_level.add_instruction(id);
        }

        for &leader in &leaders {
            let reached = reachable_within(method, &[leader]);
            let region = subroutines
                .get_mut(&leader)
                .expect("region allocated for every leader");
            for id in method.ids().filter(|id| reached.contains(id)) {
                if let Some(&first_owner) = assigned.get(&id) {
                    return Err(StructuralError::SharedInstruction {
                        instruction: id,
                        first_owner,
                        second_owner: Some(leader),
                    });
                }
                assigned.insert(id, Some(leader));
                region.add_instruction(id);
            }
            region.resolve_leaving_ret()?;
            log::trace!(
                "subroutine at {:?} spans {} instructions",
                leader,
                region.instructions.len(),
            );
        }

        // No subroutine instruction may sit inside a protected range; only
        // top-level exception handlers are allowed.
        for handler in method.handlers() {
            for index in handler.start.0..=handler.end.0 {
                let id = InsnId(index);
                for sub in subroutines.values() {
                    if sub.contains(id) {
                        log::error!(
                            "handler {:?} protects {:?}, inside the subroutine at {:?}",
                            handler,
                            id,
                            sub.entry,
                        );
                        return Err(StructuralError::ProtectedSubroutineInstruction {
                            instruction: id,
                            handler: *handler,
                        });
                    }
                }
            }
        }

        // No call path may reuse a return-address slot; that covers direct
        // and mutual recursion, both of which would clobber a stored return
        // address.
        let table = Subroutines {
            top_level,
            subroutines,
        };
        table.check_no_recursive_calls(&table.top_level, &mut HashMap::new())?;

        Ok(table)
    }

    /// The top-level pseudo-subroutine
    ///
    /// Modeling the top level as a [`Subroutine`] keeps "which region is this
    /// instruction in" queries uniform, but it is a special region on which
    /// [`Subroutine::entering_jsrs`] and [`Subroutine::leaving_ret`] must not
    /// be invoked.
    pub fn top_level(&self) -> &Subroutine<'m> {
        &self.top_level
    }

    /// The subroutine with the given entry instruction
    ///
    /// Panics if `entry` is not the entry of any subroutine; the top level is
    /// not addressable this way (use [`Subroutines::top_level`]).
    pub fn subroutine(&self, entry: InsnId) -> &Subroutine<'m> {
        self.subroutines
            .get(&entry)
            .unwrap_or_else(|| panic!("{:?} is not a subroutine entry", entry))
    }

    /// The region containing the given instruction
    ///
    /// Linear in the number of regions. Returns `None` for instructions that
    /// no traversal reached: dead code belongs to no region, which is
    /// reported rather than rejected since unreachable code is someone else's
    /// concern.
    pub fn subroutine_of(&self, insn: InsnId) -> Option<&Subroutine<'m>> {
        if self.top_level.contains(insn) {
            return Some(&self.top_level);
        }
        match self.subroutines.values().find(|sub| sub.contains(insn)) {
            Some(sub) => Some(sub),
            None => {
                log::debug!("{:?} is not part of any region; presumably dead code", insn);
                None
            }
        }
    }

    /// All real subroutines (the top level excluded), in no particular order
    pub fn subroutines(&self) -> impl Iterator<Item = &Subroutine<'m>> {
        self.subroutines.values()
    }

    /// Depth-first walk over the subroutine call graph keeping the
    /// return-address slots of the current path; entering a subroutine whose
    /// slot is already on the path means a stored return address would be
    /// clobbered. Siblings may reuse a slot freely, hence the removal on the
    /// way back up.
    fn check_no_recursive_calls(
        &self,
        from: &Subroutine<'m>,
        on_path: &mut HashMap<u16, InsnId>,
    ) -> Result<(), StructuralError> {
        for callee in from.nested_subroutines(self) {
            let slot = callee
                .return_slot
                .expect("a real subroutine always has a return-address slot");
            if let Some(&outer_entry) = on_path.get(&slot) {
                return Err(StructuralError::ReturnSlotReuse {
                    outer_entry,
                    inner_entry: callee.entry,
                    slot,
                });
            }
            on_path.insert(slot, callee.entry);
            self.check_no_recursive_calls(callee, on_path)?;
            on_path.remove(&slot);
        }
        Ok(())
    }
}

impl fmt::Debug for Subroutines<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subroutines")
            .field("top_level", &self.top_level)
            .field("subroutines", &self.subroutines)
            .finish()
    }
}

/// Instructions reachable from the given seeds without leaving the region
fn reachable_within(method: &MethodCode, seeds: &[InsnId]) -> HashSet<InsnId> {
    let mut visited: HashSet<InsnId> = seeds.iter().copied().collect();
    let mut queue: VecDeque<InsnId> = seeds.iter().copied().collect();
    while let Some(insn) = queue.pop_front() {
        for successor in successors(method, insn) {
            if visited.insert(successor) {
                queue.push_back(successor);
            }
        }
    }
    visited
}

/// Successors of an instruction *within the same region*
///
/// A `ret` has no successors as defined here, and a `jsr` has its physical
/// successor (opposed to its target) as its successor: the target starts a
/// different region and is reached only by seeding that region's own
/// traversal. A method return or an `athrow` ends the region too - whether
/// the last instruction of the method may fall off the end is a different
/// pass's concern, so a missing physical successor simply yields nothing.
fn successors(method: &MethodCode, id: InsnId) -> Vec<InsnId> {
    match method.instruction(id) {
        Instruction::Ret(_) => vec![],
        Instruction::AThrow => vec![],
        insn if insn.is_method_return() => vec![],
        Instruction::Jsr(_) => method.next(id).into_iter().collect(),
        Instruction::Goto(target) => vec![*target],
        Instruction::TableSwitch {
            default, targets, ..
        } => {
            let mut out = Vec::with_capacity(targets.len() + 1);
            out.push(*default);
            out.extend_from_slice(targets);
            out
        }
        Instruction::LookupSwitch { default, targets } => {
            let mut out = Vec::with_capacity(targets.len() + 1);
            out.push(*default);
            out.extend(targets.iter().map(|(_, target)| *target));
            out
        }
        Instruction::If(_, target)
        | Instruction::IfICmp(_, target)
        | Instruction::IfACmp(_, target)
        | Instruction::IfNull(_, target) => {
            let mut out: Vec<InsnId> = method.next(id).into_iter().collect();
            out.push(*target);
            out
        }
        _ => method.next(id).into_iter().collect(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::Instruction::*;
    use crate::jvm::code::{EqComparison, ExceptionHandler, OrdComparison};

    fn ids(raw: &[usize]) -> Vec<InsnId> {
        raw.iter().map(|&index| InsnId(index)).collect()
    }

    /// How many regions claim this instruction?
    fn owner_count(table: &Subroutines, insn: InsnId) -> usize {
        let top = usize::from(table.top_level().contains(insn));
        top + table.subroutines().filter(|sub| sub.contains(insn)).count()
    }

    #[test]
    fn successors_by_kind() {
        let method = MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(6)),
                /* 1 */ Goto(InsnId(3)),
                /* 2 */ Nop,
                /* 3 */ If(OrdComparison::EQ, InsnId(1)),
                /* 4 */ AThrow,
                /* 5 */ Return,
                /* 6 */ AStore(0),
                /* 7 */ Ret(0),
            ],
            vec![],
        );
        // jsr continues at its physical successor, not its target
        assert_eq!(successors(&method, InsnId(0)), ids(&[1]));
        assert_eq!(successors(&method, InsnId(1)), ids(&[3]));
        assert_eq!(successors(&method, InsnId(2)), ids(&[3]));
        // conditional branch: fallthrough first, then the target
        assert_eq!(successors(&method, InsnId(3)), ids(&[4, 1]));
        assert_eq!(successors(&method, InsnId(4)), ids(&[]));
        assert_eq!(successors(&method, InsnId(5)), ids(&[]));
        assert_eq!(successors(&method, InsnId(7)), ids(&[]));
    }

    #[test]
    fn successors_of_switches() {
        let method = MethodCode::new(
            vec![
                /* 0 */
                TableSwitch {
                    default: InsnId(3),
                    low: 0,
                    targets: vec![InsnId(2), InsnId(3)],
                },
                /* 1 */
                LookupSwitch {
                    default: InsnId(2),
                    targets: vec![(-4, InsnId(3)), (9, InsnId(2))],
                },
                /* 2 */ Return,
                /* 3 */ Return,
            ],
            vec![],
        );
        assert_eq!(successors(&method, InsnId(0)), ids(&[3, 2, 3]));
        assert_eq!(successors(&method, InsnId(1)), ids(&[2, 3, 2]));
    }

    #[test]
    fn method_without_subroutines() {
        let method = MethodCode::new(
            vec![
                /* 0 */ IConst(2),
                /* 1 */ IStore(0),
                /* 2 */ ILoad(0),
                /* 3 */ If(OrdComparison::NE, InsnId(5)),
                /* 4 */ Return,
                /* 5 */ Return,
            ],
            vec![],
        );
        let table = Subroutines::new(&method).unwrap();

        assert_eq!(table.subroutines().count(), 0);
        let top = table.top_level();
        assert!(top.is_top_level());
        assert_eq!(top.return_slot(), None);
        assert_eq!(top.instructions().len(), 6);
        assert!(top.nested_subroutines(&table).is_empty());
        for id in method.ids() {
            assert_eq!(owner_count(&table, id), 1);
            assert!(table.subroutine_of(id).unwrap().is_top_level());
        }
    }

    #[test]
    fn single_subroutine() {
        let method = MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(2)),
                /* 1 */ Return,
                /* 2 */ AStore(3),
                /* 3 */ Ret(3),
            ],
            vec![],
        );
        let table = Subroutines::new(&method).unwrap();

        assert_eq!(table.subroutines().count(), 1);
        let sub = table.subroutine(InsnId(2));
        assert!(!sub.is_top_level());
        assert_eq!(sub.return_slot(), Some(3));
        assert_eq!(sub.leaving_ret(), InsnId(3));
        assert_eq!(
            sub.entering_jsrs().iter().copied().collect::<Vec<InsnId>>(),
            ids(&[0]),
        );
        assert_eq!(
            sub.instructions().iter().copied().collect::<Vec<InsnId>>(),
            ids(&[2, 3]),
        );
        assert_eq!(
            sub.accessed_locals().into_iter().collect::<Vec<u16>>(),
            vec![3],
        );

        let top = table.top_level();
        assert_eq!(
            top.instructions().iter().copied().collect::<Vec<InsnId>>(),
            ids(&[0, 1]),
        );
        assert_eq!(top.nested_subroutines(&table).len(), 1);

        // every instruction is claimed exactly once
        for id in method.ids() {
            assert_eq!(owner_count(&table, id), 1);
        }
    }

    #[test]
    fn two_call_sites_one_subroutine() {
        let method = MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(3)),
                /* 1 */ Jsr(InsnId(3)),
                /* 2 */ Return,
                /* 3 */ AStore(2),
                /* 4 */ Ret(2),
            ],
            vec![],
        );
        let table = Subroutines::new(&method).unwrap();

        assert_eq!(table.subroutines().count(), 1);
        let sub = table.subroutine(InsnId(3));
        assert_eq!(
            sub.entering_jsrs().iter().copied().collect::<Vec<InsnId>>(),
            ids(&[0, 1]),
        );
        assert_eq!(sub.leaving_ret(), InsnId(4));
        // two call sites, still one region
        assert_eq!(table.top_level().nested_subroutines(&table).len(), 1);
    }

    #[test]
    fn entry_must_store_return_address() {
        let method = MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(2)),
                /* 1 */ Return,
                /* 2 */ Nop,
                /* 3 */ Ret(0),
            ],
            vec![],
        );
        assert_eq!(
            Subroutines::new(&method).unwrap_err(),
            StructuralError::EntryNotReturnAddressStore { entry: InsnId(2) },
        );
    }

    #[test]
    fn subroutine_without_ret() {
        let method = MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(2)),
                /* 1 */ Return,
                /* 2 */ AStore(0),
                /* 3 */ Goto(InsnId(3)),
            ],
            vec![],
        );
        assert_eq!(
            Subroutines::new(&method).unwrap_err(),
            StructuralError::MissingRet { entry: InsnId(2) },
        );
    }

    #[test]
    fn subroutine_with_two_rets() {
        let method = MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(2)),
                /* 1 */ Return,
                /* 2 */ AStore(0),
                /* 3 */ If(OrdComparison::EQ, InsnId(5)),
                /* 4 */ Ret(0),
                /* 5 */ Ret(0),
            ],
            vec![],
        );
        assert_eq!(
            Subroutines::new(&method).unwrap_err(),
            StructuralError::MultipleRets {
                entry: InsnId(2),
                first: InsnId(4),
                second: InsnId(5),
            },
        );
    }

    #[test]
    fn ret_on_the_wrong_slot() {
        let method = MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(2)),
                /* 1 */ Return,
                /* 2 */ AStore(0),
                /* 3 */ Ret(1),
            ],
            vec![],
        );
        assert_eq!(
            Subroutines::new(&method).unwrap_err(),
            StructuralError::MismatchedRetSlot {
                entry: InsnId(2),
                ret: InsnId(3),
                expected: 0,
                found: 1,
            },
        );
    }

    #[test]
    fn instruction_shared_with_the_top_level() {
        let method = MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(2)),
                /* 1 */ Return,
                /* 2 */ AStore(0),
                /* 3 */ Goto(InsnId(1)),
            ],
            vec![],
        );
        assert_eq!(
            Subroutines::new(&method).unwrap_err(),
            StructuralError::SharedInstruction {
                instruction: InsnId(1),
                first_owner: None,
                second_owner: Some(InsnId(2)),
            },
        );
    }

    #[test]
    fn instruction_shared_between_subroutines() {
        let method = MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(3)),
                /* 1 */ Jsr(InsnId(7)),
                /* 2 */ Return,
                /* 3 */ AStore(0),
                /* 4 */ If(OrdComparison::EQ, InsnId(9)),
                /* 5 */ Ret(0),
                /* 6 */ Nop,
                /* 7 */ AStore(1),
                /* 8 */ Goto(InsnId(9)),
                /* 9 */ IInc(2, 1),
                /* 10 */ Goto(InsnId(5)),
            ],
            vec![],
        );
        // the first subroutine (entry i3) owns i5, i9 and i10; the second
        // subroutine's traversal reaches them again through its goto
        assert_eq!(
            Subroutines::new(&method).unwrap_err(),
            StructuralError::SharedInstruction {
                instruction: InsnId(5),
                first_owner: Some(InsnId(3)),
                second_owner: Some(InsnId(7)),
            },
        );
    }

    #[test]
    fn handler_must_not_protect_subroutine_code() {
        let handler = ExceptionHandler {
            start: InsnId(2),
            end: InsnId(3),
            handler: InsnId(1),
        };
        let method = MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(2)),
                /* 1 */ Return,
                /* 2 */ AStore(1),
                /* 3 */ Ret(1),
            ],
            vec![handler],
        );
        assert_eq!(
            Subroutines::new(&method).unwrap_err(),
            StructuralError::ProtectedSubroutineInstruction {
                instruction: InsnId(2),
                handler,
            },
        );
    }

    #[test]
    fn handler_entry_seeds_the_top_level() {
        // i4 and i5 are only reachable through the handler, and still belong
        // to the top level
        let method = MethodCode::new(
            vec![
                /* 0 */ IConst(0),
                /* 1 */ IStore(0),
                /* 2 */ Jsr(InsnId(6)),
                /* 3 */ Return,
                /* 4 */ Pop,
                /* 5 */ AThrow,
                /* 6 */ AStore(1),
                /* 7 */ Ret(1),
            ],
            vec![ExceptionHandler {
                start: InsnId(0),
                end: InsnId(1),
                handler: InsnId(4),
            }],
        );
        let table = Subroutines::new(&method).unwrap();
        let top = table.top_level();
        assert_eq!(
            top.instructions().iter().copied().collect::<Vec<InsnId>>(),
            ids(&[0, 1, 2, 3, 4, 5]),
        );
        assert!(table.subroutine_of(InsnId(4)).unwrap().is_top_level());
    }

    #[test]
    fn nested_subroutines_may_not_share_a_slot() {
        let method = MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(2)),
                /* 1 */ Return,
                /* 2 */ AStore(1),
                /* 3 */ Jsr(InsnId(5)),
                /* 4 */ Ret(1),
                /* 5 */ AStore(1),
                /* 6 */ Ret(1),
            ],
            vec![],
        );
        assert_eq!(
            Subroutines::new(&method).unwrap_err(),
            StructuralError::ReturnSlotReuse {
                outer_entry: InsnId(2),
                inner_entry: InsnId(5),
                slot: 1,
            },
        );
    }

    #[test]
    fn subroutine_may_not_call_itself() {
        let method = MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(2)),
                /* 1 */ Return,
                /* 2 */ AStore(0),
                /* 3 */ Jsr(InsnId(2)),
                /* 4 */ Ret(0),
            ],
            vec![],
        );
        assert_eq!(
            Subroutines::new(&method).unwrap_err(),
            StructuralError::ReturnSlotReuse {
                outer_entry: InsnId(2),
                inner_entry: InsnId(2),
                slot: 0,
            },
        );
    }

    #[test]
    fn siblings_may_share_a_slot() {
        // two subroutines on disjoint call paths may use the same slot
        let method = MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(4)),
                /* 1 */ Jsr(InsnId(6)),
                /* 2 */ Nop,
                /* 3 */ Return,
                /* 4 */ AStore(2),
                /* 5 */ Ret(2),
                /* 6 */ AStore(2),
                /* 7 */ Ret(2),
            ],
            vec![],
        );
        let table = Subroutines::new(&method).unwrap();
        assert_eq!(table.subroutines().count(), 2);
        assert_eq!(table.subroutine(InsnId(4)).return_slot(), Some(2));
        assert_eq!(table.subroutine(InsnId(6)).return_slot(), Some(2));
    }

    /// A call diamond: the outer subroutine calls two inner ones, both of
    /// which call the same innermost subroutine.
    fn diamond() -> MethodCode {
        MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(2)),
                /* 1 */ Return,
                /* 2 */ AStore(0),
                /* 3 */ Jsr(InsnId(7)),
                /* 4 */ Jsr(InsnId(10)),
                /* 5 */ ILoad(4),
                /* 6 */ Ret(0),
                /* 7 */ AStore(1),
                /* 8 */ Jsr(InsnId(13)),
                /* 9 */ Ret(1),
                /* 10 */ AStore(2),
                /* 11 */ Jsr(InsnId(13)),
                /* 12 */ Ret(2),
                /* 13 */ AStore(3),
                /* 14 */ LStore(5),
                /* 15 */ Ret(3),
            ],
            vec![],
        )
    }

    #[test]
    fn accessed_locals_through_nested_calls() {
        let method = diamond();
        let table = Subroutines::new(&method).unwrap();

        let outer = table.subroutine(InsnId(2));
        let innermost = table.subroutine(InsnId(13));

        assert_eq!(
            outer.accessed_locals().into_iter().collect::<Vec<u16>>(),
            vec![0, 4],
        );
        // the long store claims two slots
        assert_eq!(
            innermost
                .accessed_locals()
                .into_iter()
                .collect::<Vec<u16>>(),
            vec![3, 5, 6],
        );
        assert_eq!(
            outer
                .recursively_accessed_locals(&table)
                .into_iter()
                .collect::<Vec<u16>>(),
            vec![0, 1, 2, 3, 4, 5, 6],
        );

        // recursive access set contains each region's own and each callee's
        for sub in table.subroutines() {
            let recursive = sub.recursively_accessed_locals(&table);
            assert!(recursive.is_superset(&sub.accessed_locals()));
            for callee in sub.nested_subroutines(&table) {
                assert!(recursive.is_superset(&callee.recursively_accessed_locals(&table)));
            }
        }
    }

    #[test]
    fn nested_subroutines_are_deduplicated() {
        let method = diamond();
        let table = Subroutines::new(&method).unwrap();

        let top_nested = table.top_level().nested_subroutines(&table);
        assert_eq!(top_nested.len(), 1);
        assert_eq!(table.subroutine(InsnId(2)).nested_subroutines(&table).len(), 2);
        // both inner subroutines call the same innermost one
        assert_eq!(table.subroutine(InsnId(7)).nested_subroutines(&table).len(), 1);
        assert_eq!(table.subroutine(InsnId(10)).nested_subroutines(&table).len(), 1);
    }

    #[test]
    fn queries_are_idempotent() {
        let method = diamond();
        let table = Subroutines::new(&method).unwrap();
        let outer = table.subroutine(InsnId(2));

        assert_eq!(outer.accessed_locals(), outer.accessed_locals());
        assert_eq!(
            outer.recursively_accessed_locals(&table),
            outer.recursively_accessed_locals(&table),
        );
        assert_eq!(
            outer.nested_subroutines(&table).len(),
            outer.nested_subroutines(&table).len(),
        );
    }

    #[test]
    fn dead_code_belongs_to_no_region() {
        let method = MethodCode::new(
            vec![
                /* 0 */ Goto(InsnId(2)),
                /* 1 */ Nop,
                /* 2 */ Return,
            ],
            vec![],
        );
        let table = Subroutines::new(&method).unwrap();
        assert!(table.subroutine_of(InsnId(0)).unwrap().is_top_level());
        assert!(table.subroutine_of(InsnId(1)).is_none());
        assert_eq!(owner_count(&table, InsnId(1)), 0);
    }

    #[test]
    #[should_panic(expected = "call sites queried on the top level")]
    fn top_level_has_no_call_sites() {
        let method = MethodCode::new(vec![Return], vec![]);
        let table = Subroutines::new(&method).unwrap();
        table.top_level().entering_jsrs();
    }

    #[test]
    #[should_panic(expected = "leaving ret queried on the top level")]
    fn top_level_has_no_leaving_ret() {
        let method = MethodCode::new(vec![Return], vec![]);
        let table = Subroutines::new(&method).unwrap();
        table.top_level().leaving_ret();
    }

    #[test]
    #[should_panic(expected = "is not a subroutine entry")]
    fn lookup_of_a_non_entry() {
        let method = MethodCode::new(vec![Nop, Return], vec![]);
        let table = Subroutines::new(&method).unwrap();
        table.subroutine(InsnId(0));
    }

    #[test]
    fn conditional_flow_inside_a_subroutine() {
        let method = MethodCode::new(
            vec![
                /* 0 */ Jsr(InsnId(2)),
                /* 1 */ Return,
                /* 2 */ AStore(0),
                /* 3 */ ALoad(1),
                /* 4 */ IfNull(EqComparison::EQ, InsnId(7)),
                /* 5 */ IInc(2, 1),
                /* 6 */ Goto(InsnId(3)),
                /* 7 */ Ret(0),
            ],
            vec![],
        );
        let table = Subroutines::new(&method).unwrap();
        let sub = table.subroutine(InsnId(2));
        assert_eq!(
            sub.instructions().iter().copied().collect::<Vec<InsnId>>(),
            ids(&[2, 3, 4, 5, 6, 7]),
        );
        assert_eq!(
            sub.accessed_locals().into_iter().collect::<Vec<u16>>(),
            vec![0, 1, 2],
        );
    }
}
