use super::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn vm_of(insts: &[(InstId, u8, u8, u8)]) -> LinearVm {
    let mut vm = LinearVm::new();
    for &(id, a0, a1, a2) in insts {
        vm.push_inst(id, a0, a1, a2);
    }
    vm
}

// ==================== Hardware state ====================

#[test]
fn registers_initialize_to_their_index() {
    let vm = LinearVm::new();
    for i in 0..REGS {
        assert_eq!(vm.get_reg(i), i as f64);
        assert_eq!(vm.get_output(i), 0.0);
        assert_eq!(vm.get_input(i), 0.0);
    }
    assert_eq!(vm.get_ip(), 0);
    assert_eq!(vm.get_num_errors(), 0);
    assert!(vm.get_genome().is_empty());
}

#[test]
fn empty_genome_steps_are_noops() {
    let mut vm = LinearVm::new();
    vm.process(5);
    assert_eq!(vm.get_ip(), 0);
    for i in 0..REGS {
        assert_eq!(vm.get_reg(i), i as f64);
    }
}

#[test]
fn reset_restores_post_construction_state() {
    let mut vm = vm_of(&[
        (InstId::SetReg, 0, 9, 0),
        (InstId::Push, 0, 2, 0),
        (InstId::Output, 0, 4, 0),
        (InstId::Div, 0, 5, 1),
    ]);
    vm.set_input(3, 7.5);
    vm.process(10);
    vm.reset();

    let fresh = LinearVm::new();
    assert_eq!(vm.get_ip(), fresh.get_ip());
    assert_eq!(vm.get_num_errors(), fresh.get_num_errors());
    assert!(vm.get_genome().is_empty());
    for i in 0..REGS {
        assert_eq!(vm.get_reg(i), fresh.get_reg(i));
        assert_eq!(vm.get_input(i), fresh.get_input(i));
        assert_eq!(vm.get_output(i), fresh.get_output(i));
    }
}

#[test]
fn reset_is_idempotent() {
    let mut vm = vm_of(&[(InstId::Inc, 0, 0, 0)]);
    vm.process(3);
    vm.reset();
    let regs_after_one: Vec<f64> = (0..REGS).map(|i| vm.get_reg(i)).collect();
    vm.reset();
    let regs_after_two: Vec<f64> = (0..REGS).map(|i| vm.get_reg(i)).collect();
    assert_eq!(regs_after_one, regs_after_two);
    assert_eq!(vm.get_ip(), 0);
}

// ==================== Arithmetic ====================

#[test]
fn setreg_and_add() {
    let mut vm = vm_of(&[(InstId::SetReg, 3, 7, 0), (InstId::Add, 3, 5, 10)]);
    vm.process(2);
    assert_eq!(vm.get_reg(3), 7.0);
    assert_eq!(vm.get_reg(10), 12.0);
}

#[test]
fn sub_and_mult() {
    let mut vm = vm_of(&[(InstId::Sub, 9, 4, 0), (InstId::Mult, 3, 5, 1)]);
    vm.process(2);
    assert_eq!(vm.get_reg(0), 5.0);
    assert_eq!(vm.get_reg(1), 15.0);
}

#[test]
fn div_by_zero_counts_error_and_leaves_destination() {
    let mut vm = vm_of(&[(InstId::SetReg, 1, 0, 0), (InstId::Div, 2, 1, 4)]);
    vm.process(2);
    assert_eq!(vm.get_num_errors(), 1);
    assert_eq!(vm.get_reg(4), 4.0);
}

#[test]
fn div_writes_quotient() {
    let mut vm = vm_of(&[(InstId::Div, 8, 2, 0)]);
    vm.process(1);
    assert_eq!(vm.get_reg(0), 4.0);
}

#[test]
fn mod_behaves_like_div() {
    // Longstanding hardware behavior: Mod divides. Evolved genomes rely
    // on it, so it stays.
    let mut vm = vm_of(&[(InstId::Mod, 8, 2, 0)]);
    vm.process(1);
    assert_eq!(vm.get_reg(0), 4.0);
}

#[test]
fn mod_by_zero_counts_error() {
    let mut vm = vm_of(&[(InstId::SetReg, 1, 0, 0), (InstId::Mod, 2, 1, 4)]);
    vm.process(2);
    assert_eq!(vm.get_num_errors(), 1);
    assert_eq!(vm.get_reg(4), 4.0);
}

#[test]
fn inc_dec_not() {
    let mut vm = vm_of(&[(InstId::Inc, 5, 0, 0), (InstId::Dec, 9, 0, 0)]);
    vm.process(2);
    assert_eq!(vm.get_reg(5), 6.0);
    assert_eq!(vm.get_reg(9), 8.0);

    let mut vm = vm_of(&[(InstId::Not, 0, 0, 0)]);
    vm.single_process();
    assert_eq!(vm.get_reg(0), 1.0);
    vm.reset_ip();
    vm.single_process();
    assert_eq!(vm.get_reg(0), 0.0);
}

#[test]
fn comparisons_write_booleans() {
    let mut vm = vm_of(&[
        (InstId::TestEqu, 4, 4, 1),
        (InstId::TestNEqu, 4, 4, 2),
        (InstId::TestLess, 2, 3, 6),
    ]);
    vm.process(3);
    assert_eq!(vm.get_reg(1), 1.0);
    assert_eq!(vm.get_reg(2), 0.0);
    assert_eq!(vm.get_reg(6), 1.0);
}

#[test]
fn copyval_copies() {
    let mut vm = vm_of(&[(InstId::CopyVal, 3, 9, 0)]);
    vm.process(1);
    assert_eq!(vm.get_reg(9), 3.0);
}

// ==================== Scopes and loops ====================

#[test]
fn if_skips_scope_when_test_is_zero() {
    let mut vm = vm_of(&[
        (InstId::SetReg, 0, 0, 0),
        (InstId::If, 0, 1, 0),
        (InstId::Inc, 5, 0, 0),
        (InstId::Scope, 0, 0, 0),
        (InstId::Inc, 6, 0, 0),
    ]);
    vm.process(4);
    assert_eq!(vm.get_reg(5), 5.0);
    assert_eq!(vm.get_reg(6), 7.0);
}

#[test]
fn if_enters_scope_when_test_is_nonzero() {
    let mut vm = vm_of(&[
        (InstId::SetReg, 0, 1, 0),
        (InstId::If, 0, 1, 0),
        (InstId::Inc, 5, 0, 0),
        (InstId::Scope, 0, 0, 0),
        (InstId::Inc, 6, 0, 0),
    ]);
    vm.process(5);
    assert_eq!(vm.get_reg(5), 6.0);
    assert_eq!(vm.get_reg(6), 7.0);
}

#[test]
fn countdown_loops_until_zero() {
    let mut vm = vm_of(&[
        (InstId::SetReg, 0, 3, 0),
        (InstId::Countdown, 0, 1, 0),
        (InstId::Inc, 5, 0, 0),
    ]);
    // Three passes through the body, then the failed test bypasses it.
    vm.process(8);
    assert_eq!(vm.get_reg(0), 0.0);
    assert_eq!(vm.get_reg(5), 8.0);

    // The next step wraps the IP and re-runs the genome from the top.
    vm.single_process();
    assert_eq!(vm.get_ip(), 1);
    assert_eq!(vm.get_reg(0), 3.0);
}

#[test]
fn while_loops_until_test_clears() {
    let mut vm = vm_of(&[
        (InstId::SetReg, 1, 1, 0),
        (InstId::While, 1, 1, 0),
        (InstId::SetReg, 1, 0, 0),
    ]);
    vm.process(4);
    assert_eq!(vm.get_reg(1), 0.0);
    assert_eq!(vm.get_ip(), 3);
}

#[test]
fn break_fast_forwards_past_loop() {
    let mut vm = vm_of(&[
        (InstId::SetReg, 0, 5, 0),
        (InstId::While, 0, 1, 0),
        (InstId::Break, 0, 0, 0),
        (InstId::Inc, 5, 0, 0),
    ]);
    vm.process(3);
    assert_eq!(vm.get_reg(5), 5.0);
    assert_eq!(vm.get_ip(), 4);
}

#[test]
fn scope_reg_restores_on_scope_exit() {
    let mut vm = vm_of(&[
        (InstId::Scope, 0, 0, 0),
        (InstId::ScopeReg, 3, 0, 0),
        (InstId::SetReg, 3, 9, 0),
        (InstId::Scope, 0, 0, 0),
    ]);
    vm.process(4);
    assert_eq!(vm.get_reg(3), 3.0);
}

#[test]
fn scope_reg_restores_in_lifo_order() {
    let mut vm = vm_of(&[
        (InstId::Scope, 0, 0, 0),
        (InstId::ScopeReg, 3, 0, 0),
        (InstId::SetReg, 3, 9, 0),
        (InstId::ScopeReg, 3, 0, 0),
        (InstId::SetReg, 3, 2, 0),
        (InstId::Scope, 0, 0, 0),
    ]);
    vm.process(6);
    // The backup of 9 is undone by the earlier backup of 3.
    assert_eq!(vm.get_reg(3), 3.0);
}

// ==================== Functions ====================

#[test]
fn define_skips_body_and_call_enters_it() {
    let mut vm = vm_of(&[
        (InstId::Define, 0, 0, 0),
        (InstId::Inc, 5, 0, 0),
        (InstId::Inc, 6, 0, 0),
        (InstId::Scope, 0, 0, 0),
        (InstId::Call, 0, 0, 0),
    ]);
    // Define records and skips its body.
    vm.single_process();
    assert_eq!(vm.get_ip(), 3);
    assert_eq!(vm.get_reg(5), 5.0);
    assert_eq!(vm.get_reg(6), 6.0);

    // Call lands past the first body slot: the step advance runs from
    // one after the recorded jump target.
    vm.process(3);
    assert_eq!(vm.get_reg(5), 5.0);
    assert_eq!(vm.get_reg(6), 7.0);
}

#[test]
fn call_to_unset_function_is_noop() {
    let mut vm = vm_of(&[(InstId::Call, 7, 0, 0)]);
    vm.process(1);
    assert_eq!(vm.get_ip(), 1);
    for i in 0..REGS {
        assert_eq!(vm.get_reg(i), i as f64);
    }
}

#[test]
fn call_to_mutated_define_is_noop() {
    let mut vm = vm_of(&[(InstId::Define, 0, 1, 0), (InstId::Inc, 5, 0, 0)]);
    vm.single_process();
    // Mutate the definition away, then try to call it.
    vm.set_inst(0, InstId::Inc, 0, 0, 0).unwrap();
    let ip = vm.get_ip();
    vm.process_inst(&Instruction::new(InstId::Call, 0, 0, 0));
    assert_eq!(vm.get_ip(), ip);
}

// ==================== Stacks and buffers ====================

#[test]
fn push_pop_roundtrip_and_empty_pop() {
    let mut vm = vm_of(&[
        (InstId::Push, 3, 0, 0),
        (InstId::Pop, 0, 10, 0),
        (InstId::Pop, 0, 11, 0),
    ]);
    vm.process(3);
    assert_eq!(vm.get_reg(10), 3.0);
    assert_eq!(vm.get_reg(11), 0.0);
}

#[test]
fn stack_drops_pushes_beyond_capacity() {
    let mut vm = LinearVm::new();
    for _ in 0..STACK_CAP + 1 {
        vm.push_inst(InstId::Push, 1, 2, 0);
    }
    for _ in 0..STACK_CAP {
        vm.push_inst(InstId::Pop, 2, 5, 0);
    }
    vm.push_inst(InstId::Pop, 2, 6, 0);
    vm.process(2 * STACK_CAP + 2);
    // Sixteen stored values drain, the dropped seventeenth reads as zero.
    assert_eq!(vm.get_reg(5), 1.0);
    assert_eq!(vm.get_reg(6), 0.0);
}

#[test]
fn input_and_output_buffers() {
    let mut vm = vm_of(&[(InstId::Input, 2, 5, 0), (InstId::Output, 5, 7, 0)]);
    vm.set_input(2, 42.0);
    vm.process(2);
    assert_eq!(vm.get_reg(5), 42.0);
    assert_eq!(vm.get_output(7), 42.0);
}

// ==================== Construction API ====================

#[test]
fn set_inst_rejects_out_of_range_positions() {
    let mut vm = LinearVm::new();
    assert_eq!(
        vm.set_inst(5, InstId::Inc, 0, 0, 0),
        Err(VmError::InvalidPosition { pos: 5, len: 0 })
    );
}

#[test]
fn push_random_never_draws_unknown() {
    let mut rng = StdRng::seed_from_u64(17);
    let mut vm = LinearVm::new();
    vm.push_random(&mut rng, 200);
    assert_eq!(vm.get_genome().len(), 200);
    assert!(vm.get_genome().iter().all(|i| i.id != InstId::Unknown));
    assert!(vm
        .get_genome()
        .iter()
        .all(|i| i.args.iter().all(|&a| (a as usize) < REGS)));
}

#[test]
fn randomize_inst_rejects_out_of_range_positions() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut vm = LinearVm::new();
    assert!(vm.randomize_inst(0, &mut rng).is_err());
    vm.push_inst(InstId::Inc, 0, 0, 0);
    assert!(vm.randomize_inst(0, &mut rng).is_ok());
}

// ==================== Laws ====================

#[test]
fn identical_programs_run_identically() {
    let mut rng_a = StdRng::seed_from_u64(99);
    let mut rng_b = StdRng::seed_from_u64(99);
    let mut a = LinearVm::new();
    let mut b = LinearVm::new();
    a.push_random(&mut rng_a, 300);
    b.push_random(&mut rng_b, 300);
    assert_eq!(a.get_genome(), b.get_genome());

    a.process(500);
    b.process(500);
    assert_eq!(a.get_ip(), b.get_ip());
    assert_eq!(a.get_num_errors(), b.get_num_errors());
    for i in 0..REGS {
        assert_eq!(a.get_reg(i), b.get_reg(i));
        assert_eq!(a.get_output(i), b.get_output(i));
    }
}

// ==================== Disassembly ====================

#[test]
fn disassembly_marks_scope_entry() {
    let vm = vm_of(&[
        (InstId::SetReg, 0, 3, 0),
        (InstId::Countdown, 0, 1, 0),
        (InstId::Inc, 5, 0, 0),
    ]);
    assert_eq!(
        vm.genome_string(),
        "SetReg 0 3\nCountdown 0 1 0 --> \n  Inc 5\n"
    );
}

#[test]
fn disassembly_separates_sibling_scopes() {
    let vm = vm_of(&[
        (InstId::Scope, 0, 0, 0),
        (InstId::Inc, 1, 0, 0),
        (InstId::Scope, 0, 0, 0),
        (InstId::Inc, 2, 0, 0),
    ]);
    assert_eq!(
        vm.genome_string(),
        "Scope 0 --> \n Inc 1\n ----\n Scope 0\n Inc 2\n"
    );
}

#[test]
fn instruction_display_limits_args_to_arity() {
    let inst = Instruction::new(InstId::Pop, 2, 5, 9);
    assert_eq!(inst.to_string(), "Pop 2 5");
    let inst = Instruction::new(InstId::Unknown, 1, 2, 3);
    assert_eq!(inst.to_string(), "Unknown");
}
