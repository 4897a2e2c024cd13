use std::fmt;

use lvflow::{prelude::*, testcases::four_bus_feeder};
use tabled::{Table, Tabled, settings::Style};

/// A float that prints with a fixed number of decimal places.
#[derive(Clone, Copy)]
struct FloatWrapper {
    value: f64,
    precision: usize,
}

impl FloatWrapper {
    fn new(value: f64, precision: usize) -> Self {
        FloatWrapper { value, precision }
    }
}

impl fmt::Display for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

#[derive(Tabled)]
struct BusRow {
    bus: BusId,
    name: String,
    vm_pu: FloatWrapper,
    va_degree: FloatWrapper,
    p_mw: FloatWrapper,
    q_mvar: FloatWrapper,
}

#[derive(Tabled)]
struct LineRow {
    line: LineId,
    from: BusId,
    to: BusId,
    p_from_mw: FloatWrapper,
    q_from_mvar: FloatWrapper,
    pl_mw: FloatWrapper,
    ql_mvar: FloatWrapper,
    i_ka: FloatWrapper,
    loading_percent: FloatWrapper,
}

#[derive(Tabled)]
struct BalanceRow {
    component: &'static str,
    generation: FloatWrapper,
    load: FloatWrapper,
    losses: FloatWrapper,
    imbalance: FloatWrapper,
    passed: bool,
}

impl BalanceRow {
    fn new(component: &'static str, totals: &BalanceTotals) -> Self {
        Self {
            component,
            generation: FloatWrapper::new(totals.generation, 6),
            load: FloatWrapper::new(totals.load, 6),
            losses: FloatWrapper::new(totals.losses, 6),
            imbalance: FloatWrapper::new(totals.imbalance, 9),
            passed: totals.passed,
        }
    }
}

fn main() -> Result<(), PowerFlowError> {
    tracing_subscriber::fmt::init();

    let net = four_bus_feeder()?;
    let config = SolverConfig::default();
    let res = solve(&net, &config)?;
    println!(
        "converged in {} iterations, max mismatch {:.3e} MVA",
        res.iterations, res.max_mismatch_mva
    );

    let buses = res.buses.iter().map(|b| BusRow {
        bus: b.bus,
        name: net
            .bus(b.bus)
            .and_then(|bus| bus.name.clone())
            .unwrap_or_default(),
        vm_pu: FloatWrapper::new(b.vm_pu, 5),
        va_degree: FloatWrapper::new(b.va_degree, 4),
        p_mw: FloatWrapper::new(b.p_mw, 5),
        q_mvar: FloatWrapper::new(b.q_mvar, 5),
    });
    println!("{}", Table::new(buses).with(Style::psql()));

    let lines = res.lines.iter().map(|l| LineRow {
        line: l.line,
        from: l.from_bus,
        to: l.to_bus,
        p_from_mw: FloatWrapper::new(l.p_from_mw, 5),
        q_from_mvar: FloatWrapper::new(l.q_from_mvar, 5),
        pl_mw: FloatWrapper::new(l.pl_mw, 6),
        ql_mvar: FloatWrapper::new(l.ql_mvar, 6),
        i_ka: FloatWrapper::new(l.i_ka, 5),
        loading_percent: FloatWrapper::new(l.loading_percent, 2),
    });
    println!("{}", Table::new(lines).with(Style::psql()));

    let balance = res.verify_balance(config.tolerance_mva);
    let rows = [
        BalanceRow::new("P [MW]", &balance.active),
        BalanceRow::new("Q [MVAr]", &balance.reactive),
    ];
    println!("{}", Table::new(rows).with(Style::psql()));
    Ok(())
}
