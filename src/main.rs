//! Simulation driver: JSON system description on stdin, one JSON value per
//! measurement per batch on stdout.

use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;

use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lattice_vmc::io::Config;
use lattice_vmc::lattice::{BoundaryCondition, Lattice, NdLattice, SimpleSubsystem, Subsystem};
use lattice_vmc::measurement::{
    DensityDensityMeasurement, Measurement, RenyiModMeasurement, RenyiSignMeasurement,
};
use lattice_vmc::sampling::{
    random_combination, MetropolisSimulation, RenyiModWalk, RenyiSignWalk, StandardWalk,
};
use lattice_vmc::wavefunction::{Amplitude, OrbitalDefinitions, PositionArguments};

#[derive(Parser, Debug)]
#[command(version, about = "Variational Monte Carlo for lattice wave functions")]
struct Args {
    /// Measurement batches to run
    #[arg(long, default_value_t = 100)]
    batches: usize,

    /// Metropolis sweeps per batch
    #[arg(long, default_value_t = 12)]
    sweeps_per_batch: usize,

    /// Unmeasured equilibration sweeps per simulation
    #[arg(long, default_value_t = 8)]
    initialization_sweeps: usize,

    /// Side length of the entanglement subsystem box
    #[arg(long, default_value_t = 2)]
    subsystem_length: u32,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = match Config::from_reader(std::io::stdin().lock()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let result = match config.dimensions() {
        1 => run_simulation::<1>(&config, &args),
        2 => run_simulation::<2>(&config, &args),
        _ => unreachable!("dimension already validated"),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_simulation<const D: usize>(config: &Config, args: &Args) -> Result<(), Box<dyn Error>> {
    let mut lattice_size = [0i32; D];
    for (i, &l) in config.system.lattice.size.iter().enumerate() {
        lattice_size[i] = l as i32;
    }
    let lattice = Rc::new(NdLattice::<D>::new(lattice_size));

    let orbitals_config = config
        .system
        .wavefunction
        .orbitals
        .as_ref()
        .expect("orbitals validated at parse time");
    let mut boundary_conditions = [BoundaryCondition::periodic(); D];
    for (i, &denominator) in orbitals_config.boundary_conditions.iter().enumerate() {
        boundary_conditions[i] = BoundaryCondition::from_denominator(denominator as i32);
    }
    let mut filled_momenta = Vec::with_capacity(orbitals_config.filling.len());
    for momentum in &orbitals_config.filling {
        let mut k = [0i32; D];
        for (i, &m) in momentum.iter().enumerate() {
            k[i] = m as i32;
        }
        filled_momenta.push(k);
    }
    let orbitals = Rc::new(OrbitalDefinitions::from_filled_momenta(
        &filled_momenta,
        Rc::clone(&lattice),
        boundary_conditions,
    ));

    let mut master_rng = StdRng::seed_from_u64(config.rng.seed);

    // uniform random initial configuration at the requested filling
    let initial_positions = random_combination(
        orbitals.n_filled(),
        lattice.total_sites(),
        &mut master_rng,
    );
    let r = PositionArguments::new(vec![initial_positions], lattice.total_sites())?;
    let wf = Rc::new(Amplitude::free_fermion(r, orbitals));

    let subsystem: Rc<dyn Subsystem<D>> =
        Rc::new(SimpleSubsystem::<D>::cube(args.subsystem_length));

    // standard walk with the density-density correlator
    let density_measurement = Rc::new(RefCell::new(DensityDensityMeasurement::<D>::new()));
    let mut density_sim = MetropolisSimulation::new(
        StandardWalk::new(Rc::clone(&wf)),
        vec![Rc::clone(&density_measurement) as Rc<RefCell<dyn Measurement<StandardWalk<D>>>>],
        args.initialization_sweeps,
        StdRng::seed_from_u64(master_rng.gen()),
    )?;

    // mod walk over two copies of the same wave function
    let mod_measurement = Rc::new(RefCell::new(RenyiModMeasurement::<D>::new()));
    let mut mod_sim = MetropolisSimulation::new(
        RenyiModWalk::new(Rc::clone(&wf), Rc::clone(&wf), Rc::clone(&subsystem)),
        vec![Rc::clone(&mod_measurement) as Rc<RefCell<dyn Measurement<RenyiModWalk<D>>>>],
        args.initialization_sweeps,
        StdRng::seed_from_u64(master_rng.gen()),
    )?;

    // sign walk likewise
    let sign_measurement = Rc::new(RefCell::new(RenyiSignMeasurement::<D>::new()));
    let mut sign_sim = MetropolisSimulation::new(
        RenyiSignWalk::new(Rc::clone(&wf), Rc::clone(&wf), Rc::clone(&subsystem)),
        vec![Rc::clone(&sign_measurement) as Rc<RefCell<dyn Measurement<RenyiSignWalk<D>>>>],
        args.initialization_sweeps,
        StdRng::seed_from_u64(master_rng.gen()),
    )?;

    for _ in 0..args.batches {
        density_sim.iterate(args.sweeps_per_batch)?;
        {
            let m = density_measurement.borrow();
            let table: Vec<Vec<f64>> = (0..m.basis_indices())
                .map(|basis| (0..m.n_sites()).map(|site| m.get(site, basis)).collect())
                .collect();
            println!("{}", serde_json::to_string(&table)?);
        }
        info!(
            "density-density {:.1}%",
            100.0 * density_sim.steps_accepted() as f64 / density_sim.steps() as f64
        );

        mod_sim.iterate(args.sweeps_per_batch)?;
        println!("{}", serde_json::to_string(&mod_measurement.borrow().get())?);
        info!(
            "swap,mod {:.1}%\t{}",
            100.0 * mod_sim.steps_accepted() as f64 / mod_sim.steps() as f64,
            mod_measurement.borrow().get()
        );

        sign_sim.iterate(args.sweeps_per_batch)?;
        let sign = sign_measurement.borrow().get();
        println!("{}", serde_json::to_string(&[sign.re, sign.im])?);
        info!(
            "swap,sign {:.1}%\t{}",
            100.0 * sign_sim.steps_accepted() as f64 / sign_sim.steps() as f64,
            sign
        );
    }

    Ok(())
}
