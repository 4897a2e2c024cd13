//! Ready-made networks for tests and demos.

use crate::prelude::*;

/// Conductor used on every section of [`four_bus_feeder`]: 0.09 + j0.1577 p.u.
/// per km on an 11 kV, 1 MVA base.
fn feeder_section() -> LineParams {
    let z_base = 11.0 * 11.0;
    LineParams::new(1.0, 0.09 * z_base, 0.1577 * z_base, 1.0)
}

/// 11 kV radial feeder of four buses.
///
/// ```text
/// gen(0.4889 MW, 1.05 pu)      load         load        ext grid (1.02 pu)
///        bus1 ─────────── bus2 ─────── bus3 ─────── bus4
/// ```
///
/// Bus 1 is voltage controlled, buses 2 and 3 each draw 0.15 MW + j0.0493
/// MVAr and bus 4 is the slack.
pub fn four_bus_feeder() -> PfResult<Network> {
    let mut net = Network::new();
    let bus1 = net.add_bus(Some("bus1"), 11.0, BusKind::Pv)?;
    let bus2 = net.add_bus(Some("bus2"), 11.0, BusKind::Pq)?;
    let bus3 = net.add_bus(Some("bus3"), 11.0, BusKind::Pq)?;
    let bus4 = net.add_bus(Some("bus4"), 11.0, BusKind::Slack)?;

    net.add_generator(bus1, 0.4889, Some(1.05))?;
    net.add_load(bus2, 0.15, 0.0493)?;
    net.add_load(bus3, 0.15, 0.0493)?;
    net.set_external_grid(bus4, 1.02, 0.0)?;

    net.add_line(bus1, bus2, feeder_section())?;
    net.add_line(bus2, bus3, feeder_section())?;
    net.add_line(bus3, bus4, feeder_section())?;
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_bus_layout() {
        let net = four_bus_feeder().unwrap();
        assert_eq!(net.buses().len(), 4);
        assert_eq!(net.lines().len(), 3);
        assert_eq!(net.slack_bus(), Some(BusId(3)));
        assert!((net.lines()[0].params.r_ohm() - 10.89).abs() < 1e-12);
    }
}
