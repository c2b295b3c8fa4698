//! VM benchmark binary.
//!
//! Measures interpreter throughput for representative programs on both
//! machines. Run with: `cargo run --release --bin bench`

use evovm::event::{EventVm, Function, Instruction, Memory, Tag};
use evovm::linear::{InstId, LinearVm};
use evovm::utils::log::{self, Level, Logger};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Benchmark harness
// ---------------------------------------------------------------------------

struct BenchResult {
    name: &'static str,
    iterations: u64,
    total: Duration,
    /// Instruction steps delivered per run.
    steps: u64,
}

impl BenchResult {
    fn avg(&self) -> Duration {
        self.total / self.iterations as u32
    }

    fn print(&self) {
        let avg = self.avg();
        let ns_per_op = avg.as_nanos();
        println!(
            "  {:<28} {:>7} iters {:>10.3} us/iter {:>8.1} ns/step",
            self.name,
            self.iterations,
            ns_per_op as f64 / 1000.0,
            ns_per_op as f64 / self.steps as f64,
        );
    }
}

/// Runs `f` for at least `min_duration`, returning aggregated results.
fn bench<F>(name: &'static str, min_duration: Duration, steps: u64, mut f: F) -> BenchResult
where
    F: FnMut(),
{
    // Warmup
    for _ in 0..5 {
        f();
    }

    let mut iterations = 0u64;
    let start = Instant::now();
    while start.elapsed() < min_duration {
        f();
        iterations += 1;
    }
    let total = start.elapsed();

    BenchResult {
        name,
        iterations,
        total,
        steps,
    }
}

// ---------------------------------------------------------------------------
// Benchmark definitions
// ---------------------------------------------------------------------------

const STEPS: u64 = 100_000;

/// Randomized genome on the linear machine.
fn linear_random(steps: u64) -> BenchResult {
    let mut rng = StdRng::seed_from_u64(0xEC0);
    let mut vm = LinearVm::new();
    vm.push_random(&mut rng, 1_000);
    bench("linear/random-genome", Duration::from_secs(2), steps, move || {
        vm.reset_hardware();
        vm.process(steps as usize);
    })
}

/// Tight countdown loop, the hot path of the scope machinery.
fn linear_countdown(steps: u64) -> BenchResult {
    let mut vm = LinearVm::new();
    vm.push_inst(InstId::SetReg, 0, 15, 0);
    vm.push_inst(InstId::Countdown, 0, 1, 0);
    vm.push_inst(InstId::Inc, 5, 0, 0);
    vm.push_inst(InstId::Add, 5, 5, 6);
    bench("linear/countdown-loop", Duration::from_secs(2), steps, move || {
        vm.reset_hardware();
        vm.process(steps as usize);
    })
}

/// Pure arithmetic over local memory on the event machine.
fn event_arithmetic(steps: u64) -> BenchResult {
    let lib = evovm::event::default_lib();
    let mut vm = EventVm::new();
    let mut function = Function::new(Tag::default());
    for name in ["Inc", "Inc", "Add", "Mult", "Sub", "Div", "Mod"] {
        function.push_inst(Instruction::new(
            lib.id_of(name).expect("default op"),
            0,
            1,
            2,
        ));
    }
    vm.add_function(function);
    bench("event/arithmetic", Duration::from_secs(2), steps, move || {
        vm.reset_hardware();
        vm.process(steps as usize);
    })
}

/// Full house of cores stepping in parallel.
fn event_multicore(steps: u64) -> BenchResult {
    let lib = evovm::event::default_lib();
    let mut vm = EventVm::new();
    let mut function = Function::new(Tag::default());
    function.push_inst(Instruction::new(lib.id_of("Inc").expect("default op"), 0, 0, 0));
    function.push_inst(Instruction::new(lib.id_of("Add").expect("default op"), 0, 0, 1));
    vm.add_function(function);
    for _ in 0..evovm::event::MAX_CORES - 1 {
        vm.spawn_core(Tag::default(), Memory::new());
    }
    let passes = steps as usize / evovm::event::MAX_CORES;
    bench("event/64-cores", Duration::from_secs(2), steps, move || {
        vm.process(passes);
    })
}

fn main() {
    log::init(Level::Info);
    let logger = Logger::new("bench");
    logger.info("benchmarking both machines (each case runs for >= 2s)");

    println!(
        "  {:<28} {:>13} {:>18} {:>16}",
        "benchmark", "iters", "avg time", "per step"
    );
    println!("  {}", "-".repeat(78));

    linear_random(STEPS).print();
    linear_countdown(STEPS).print();
    event_arithmetic(STEPS).print();
    event_multicore(STEPS).print();

    logger.info("done");
}
