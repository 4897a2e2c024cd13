use nalgebra::DVector;
use num_complex::Complex64;
use tracing::debug;

use super::{
    config::SolverConfig,
    error::{PfResult, PowerFlowError},
    network::{BusKind, ExternalGrid, Network},
    newtonpf::newton_pf,
    results::{Convergence, SolveResult, extract_results},
    solver::{DefaultSolver, Solve},
    system::{AdmittanceMatrix, build_admittance},
};

/// Solves the power flow of `network` with the default linear solver.
pub fn solve(network: &Network, config: &SolverConfig) -> PfResult<SolveResult> {
    network.run_pf(config)
}

/// Solves the power flow of `network` with a caller-supplied linear solver.
pub fn solve_with<S: Solve>(
    network: &Network,
    config: &SolverConfig,
    solver: &mut S,
) -> PfResult<SolveResult> {
    network.run_pf_with(config, solver)
}

/// A trait for running power flow analysis.
pub trait RunPF {
    /// Creates the nodal admittance matrix (Ybus) on `base_mva`.
    fn create_y_bus(&self, base_mva: f64) -> PfResult<AdmittanceMatrix>;

    /// Creates the scheduled net injection vector (Sbus) in per unit.
    fn create_s_bus(&self, base_mva: f64) -> DVector<Complex64>;

    /// Creates the flat-start voltage vector (V_init).
    fn create_v_init(&self) -> PfResult<DVector<Complex64>>;

    /// Runs the power flow with the default linear solver.
    fn run_pf(&self, config: &SolverConfig) -> PfResult<SolveResult> {
        self.run_pf_with(config, &mut DefaultSolver::default())
    }

    /// Runs the power flow with `solver` for the Newton steps.
    fn run_pf_with<S: Solve>(
        &self,
        config: &SolverConfig,
        solver: &mut S,
    ) -> PfResult<SolveResult>;
}

impl RunPF for Network {
    fn create_y_bus(&self, base_mva: f64) -> PfResult<AdmittanceMatrix> {
        build_admittance(self, base_mva)
    }

    fn create_s_bus(&self, base_mva: f64) -> DVector<Complex64> {
        let mut sbus = DVector::from_element(self.buses().len(), Complex64::new(0.0, 0.0));
        for load in self.loads() {
            sbus[load.bus.index()] -= Complex64::new(load.p_mw, load.q_mvar);
        }
        for g in self.generators() {
            sbus[g.bus.index()] += g.p_mw;
        }
        let divider = 1.0 / base_mva;
        sbus.apply(|x| (*x) *= divider);
        sbus
    }

    fn create_v_init(&self) -> PfResult<DVector<Complex64>> {
        let ext = external_grid(self)?;
        let angle = ext.va_degree.to_radians();
        let mut vbus = DVector::from_element(self.buses().len(), Complex64::from_polar(1.0, angle));
        for g in self.generators() {
            if let Some(vm) = g.vm_pu {
                vbus[g.bus.index()] = Complex64::from_polar(vm, angle);
            }
        }
        vbus[ext.bus.index()] = Complex64::from_polar(ext.vm_pu, angle);
        Ok(vbus)
    }

    fn run_pf_with<S: Solve>(
        &self,
        config: &SolverConfig,
        solver: &mut S,
    ) -> PfResult<SolveResult> {
        config.validate()?;
        let ext = external_grid(self)?;
        let (pv, pq) = classify_buses(self)?;
        let ybus = self.create_y_bus(config.base_mva)?;
        let sbus = self.create_s_bus(config.base_mva);
        let v_init = self.create_v_init()?;
        debug!(pv = pv.len(), pq = pq.len(), "starting newton-raphson");

        let outcome = newton_pf(ybus.sparse(), &sbus, &v_init, &pv, &pq, config, solver)?;
        Ok(extract_results(
            self,
            ext,
            &ybus,
            &outcome.v,
            Convergence {
                iterations: outcome.iterations,
                max_mismatch_mva: outcome.max_mismatch_mva,
            },
        ))
    }
}

fn external_grid(network: &Network) -> PfResult<&ExternalGrid> {
    let slack = network.slack_bus().ok_or(PowerFlowError::NoSlack)?;
    network.external_grid().ok_or_else(|| {
        PowerFlowError::topology(format!("slack bus {slack} has no external grid"))
    })
}

/// Splits the non-slack buses into PV and PQ index lists. Every PV bus needs a
/// generator holding its voltage.
fn classify_buses(network: &Network) -> PfResult<(Vec<usize>, Vec<usize>)> {
    let mut pv = Vec::new();
    let mut pq = Vec::new();
    for bus in network.buses() {
        match bus.kind {
            BusKind::Slack => {}
            BusKind::Pq => pq.push(bus.id.index()),
            BusKind::Pv => {
                let controlled = network
                    .generators()
                    .iter()
                    .any(|g| g.bus == bus.id && g.is_voltage_controlled());
                if !controlled {
                    return Err(PowerFlowError::topology(format!(
                        "PV bus {} has no voltage-controlling generator",
                        bus.id
                    )));
                }
                pv.push(bus.id.index());
            }
        }
    }
    Ok((pv, pq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::network::{BusId, LineParams};
    use crate::basic::solver::DenseLuSolver;
    use crate::testcases::four_bus_feeder;

    #[test]
    fn four_bus_feeder_converges_and_balances() {
        let net = four_bus_feeder().unwrap();
        let config = SolverConfig::default();
        let res = solve(&net, &config).unwrap();

        assert!(res.converged);
        assert!(res.iterations <= config.max_iterations);
        assert!(res.max_mismatch_mva < config.tolerance_mva);

        // setpoints are held
        assert!((res.buses[0].vm_pu - 1.05).abs() < 1e-12);
        assert!((res.buses[3].vm_pu - 1.02).abs() < 1e-12);
        assert!(res.buses[3].va_degree.abs() < 1e-12);
        // no load on the PV bus
        assert!((res.buses[0].p_mw - 0.4889).abs() < config.tolerance_mva);
        // the generator exports, so power flows from bus 1 towards the grid
        assert!(res.lines[0].p_from_mw > 0.0);
        assert!(res.ext_grid.p_mw < 0.0, "surplus goes upstream: {}", res.ext_grid.p_mw);

        let balance = res.verify_balance(config.tolerance_mva);
        assert!(balance.passed(), "{balance:?}");
        assert!(balance.active.losses > 0.0);
        assert!((balance.active.load - 0.3).abs() < 1e-12);
    }

    #[test]
    fn four_bus_feeder_matches_across_solvers() {
        let net = four_bus_feeder().unwrap();
        let config = SolverConfig::default().with_tolerance(1e-9);
        let sparse = solve(&net, &config).unwrap();
        let dense = solve_with(&net, &config, &mut DenseLuSolver).unwrap();
        for (a, b) in sparse.buses.iter().zip(&dense.buses) {
            assert!((a.vm_pu - b.vm_pu).abs() < 1e-9);
            assert!((a.va_degree - b.va_degree).abs() < 1e-7);
        }
        assert_eq!(sparse.iterations, dense.iterations);
    }

    #[test]
    fn no_load_network_settles_at_slack_voltage() {
        let mut net = Network::new();
        let slack = net.add_bus(None, 0.4, BusKind::Slack).unwrap();
        net.set_external_grid(slack, 1.03, 10.0).unwrap();
        let mut prev = slack;
        for _ in 0..4 {
            let b = net.add_bus(None, 0.4, BusKind::Pq).unwrap();
            net.add_line(prev, b, LineParams::new(0.2, 0.206, 0.08, 0.27)).unwrap();
            prev = b;
        }
        // a mesh closing line
        net.add_line(prev, slack, LineParams::new(0.5, 0.206, 0.08, 0.27)).unwrap();

        let res = solve(&net, &SolverConfig::default().with_tolerance(1e-9)).unwrap();
        for bus in &res.buses {
            assert!((bus.vm_pu - 1.03).abs() < 1e-9, "{bus:?}");
            assert!((bus.va_degree - 10.0).abs() < 1e-7, "{bus:?}");
        }
        assert!(res.lines.iter().all(|l| l.pl_mw.abs() < 1e-9));
    }

    #[test]
    fn disconnected_bus_fails_before_solving() {
        let mut net = four_bus_feeder().unwrap();
        let island = net.add_bus(Some("island"), 11.0, BusKind::Pq).unwrap();
        net.add_load(island, 0.1, 0.0).unwrap();
        assert_eq!(
            solve(&net, &SolverConfig::default()),
            Err(PowerFlowError::DisconnectedNetwork {
                buses: vec![island]
            })
        );
    }

    #[test]
    fn infeasible_load_does_not_converge() {
        let mut net = Network::new();
        let slack = net.add_bus(None, 11.0, BusKind::Slack).unwrap();
        let far = net.add_bus(None, 11.0, BusKind::Pq).unwrap();
        net.set_external_grid(slack, 1.0, 0.0).unwrap();
        net.add_line(slack, far, LineParams::new(10.0, 5.0, 5.0, 0.1)).unwrap();
        // roughly 100x what this feeder can transfer
        net.add_load(far, 100.0, 30.0).unwrap();

        let config = SolverConfig::default();
        match solve(&net, &config) {
            Err(PowerFlowError::DidNotConverge {
                iterations,
                max_mismatch_mva,
            }) => {
                assert!(iterations <= config.max_iterations);
                assert!(!(max_mismatch_mva < config.tolerance_mva));
            }
            other => panic!("expected non-convergence, got {other:?}"),
        }
    }

    #[test]
    fn pv_bus_needs_a_controlling_generator() {
        let mut net = Network::new();
        let slack = net.add_bus(None, 11.0, BusKind::Slack).unwrap();
        let pv = net.add_bus(None, 11.0, BusKind::Pv).unwrap();
        net.set_external_grid(slack, 1.0, 0.0).unwrap();
        net.add_line(slack, pv, LineParams::new(1.0, 0.3, 0.3, 0.2)).unwrap();
        net.add_generator(pv, 0.1, None).unwrap();
        assert!(matches!(
            solve(&net, &SolverConfig::default()),
            Err(PowerFlowError::InvalidTopology { .. })
        ));
    }

    #[test]
    fn slack_problems_are_reported() {
        let mut net = Network::new();
        net.add_bus(None, 11.0, BusKind::Pq).unwrap();
        assert_eq!(solve(&net, &SolverConfig::default()), Err(PowerFlowError::NoSlack));

        let mut net = Network::new();
        net.add_bus(None, 11.0, BusKind::Slack).unwrap();
        assert!(matches!(
            solve(&net, &SolverConfig::default()),
            Err(PowerFlowError::InvalidTopology { .. })
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let net = four_bus_feeder().unwrap();
        let config = SolverConfig::default().with_base_mva(0.0);
        assert!(matches!(
            solve(&net, &config),
            Err(PowerFlowError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn base_power_does_not_change_physical_results() {
        let net = four_bus_feeder().unwrap();
        let small = solve(&net, &SolverConfig::default().with_tolerance(1e-9)).unwrap();
        let large = solve(
            &net,
            &SolverConfig::default().with_tolerance(1e-9).with_base_mva(100.0),
        )
        .unwrap();
        for (a, b) in small.lines.iter().zip(&large.lines) {
            assert!((a.p_from_mw - b.p_from_mw).abs() < 1e-8);
            assert!((a.ql_mvar - b.ql_mvar).abs() < 1e-8);
            assert!((a.i_ka - b.i_ka).abs() < 1e-10);
        }
    }

    #[test]
    fn sbus_and_initial_voltage() {
        let net = four_bus_feeder().unwrap();
        let sbus = net.create_s_bus(10.0);
        assert!((sbus[0] - Complex64::new(0.04889, 0.0)).norm() < 1e-15);
        assert!((sbus[1] - Complex64::new(-0.015, -0.00493)).norm() < 1e-15);
        assert_eq!(sbus[3], Complex64::new(0.0, 0.0));

        let v = net.create_v_init().unwrap();
        assert_eq!(v[0], Complex64::new(1.05, 0.0));
        assert_eq!(v[1], Complex64::new(1.0, 0.0));
        assert_eq!(v[BusId(3).index()], Complex64::new(1.02, 0.0));
    }

    #[test]
    fn shunt_capacitor_raises_voltage() {
        let build = |with_cap: bool| {
            let mut net = Network::new();
            let slack = net.add_bus(None, 0.4, BusKind::Slack).unwrap();
            let b = net.add_bus(None, 0.4, BusKind::Pq).unwrap();
            net.set_external_grid(slack, 1.0, 0.0).unwrap();
            net.add_line(slack, b, LineParams::new(0.3, 0.206, 0.08, 0.27)).unwrap();
            net.add_load(b, 0.05, 0.02).unwrap();
            if with_cap {
                net.add_shunt(b, 0.0, -0.02).unwrap();
            }
            net
        };
        let config = SolverConfig::default().with_tolerance(1e-8);
        let plain = solve(&build(false), &config).unwrap();
        let comp = solve(&build(true), &config).unwrap();
        assert!(comp.buses[1].vm_pu > plain.buses[1].vm_pu);
        assert!(comp.verify_balance(1e-6).passed());
    }
}
