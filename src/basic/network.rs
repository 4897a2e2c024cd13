use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use super::error::{PfResult, PowerFlowError};

/// Defines a stable integer handle returned by the construction API.
///
/// The wrapped value is the insertion index of the element.
macro_rules! define_id {
    ($id:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
            From,
            Into,
            Display,
        )]
        #[serde(transparent)]
        pub struct $id(pub usize);

        impl $id {
            /// Position of the element in its network table.
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

define_id!(BusId);
define_id!(LineId);
define_id!(GeneratorId);
define_id!(LoadId);
define_id!(ShuntId);

/// Which quantities are fixed at a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusKind {
    /// Voltage magnitude and angle fixed by the external grid.
    Slack,
    /// Active power and voltage magnitude fixed by a generator.
    Pv,
    /// Active and reactive power fixed.
    Pq,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    pub name: Option<String>,
    /// Nominal line-to-line voltage, also the per-unit voltage base.
    pub vn_kv: f64,
    pub kind: BusKind,
}

/// Electrical parameters of an overhead line or cable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineParams {
    pub length_km: f64,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    /// Shunt capacitance, converted to susceptance with the network frequency.
    pub c_nf_per_km: f64,
    /// Shunt conductance.
    pub g_us_per_km: f64,
    /// Thermal current limit of one circuit.
    pub max_i_ka: f64,
    /// Number of identical circuits in parallel.
    pub parallel: u32,
}

impl LineParams {
    /// A single circuit without shunt elements.
    pub fn new(length_km: f64, r_ohm_per_km: f64, x_ohm_per_km: f64, max_i_ka: f64) -> Self {
        Self {
            length_km,
            r_ohm_per_km,
            x_ohm_per_km,
            c_nf_per_km: 0.0,
            g_us_per_km: 0.0,
            max_i_ka,
            parallel: 1,
        }
    }

    pub fn with_capacitance(mut self, c_nf_per_km: f64) -> Self {
        self.c_nf_per_km = c_nf_per_km;
        self
    }

    pub fn with_conductance(mut self, g_us_per_km: f64) -> Self {
        self.g_us_per_km = g_us_per_km;
        self
    }

    pub fn with_parallel(mut self, parallel: u32) -> Self {
        self.parallel = parallel;
        self
    }

    /// Total series resistance of the line in Ω.
    pub fn r_ohm(&self) -> f64 {
        self.r_ohm_per_km * self.length_km / self.parallel as f64
    }

    /// Total series reactance of the line in Ω.
    pub fn x_ohm(&self) -> f64 {
        self.x_ohm_per_km * self.length_km / self.parallel as f64
    }

    fn validate(&self) -> PfResult<()> {
        check_positive("line length_km", self.length_km)?;
        check_non_negative("line r_ohm_per_km", self.r_ohm_per_km)?;
        check_non_negative("line x_ohm_per_km", self.x_ohm_per_km)?;
        check_non_negative("line c_nf_per_km", self.c_nf_per_km)?;
        check_non_negative("line g_us_per_km", self.g_us_per_km)?;
        check_positive("line max_i_ka", self.max_i_ka)?;
        if self.parallel == 0 {
            return Err(PowerFlowError::topology("line needs at least one parallel circuit"));
        }
        if self.r_ohm_per_km == 0.0 && self.x_ohm_per_km == 0.0 {
            return Err(PowerFlowError::topology(
                "zero-impedance line would make the admittance matrix singular",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: LineId,
    pub from_bus: BusId,
    pub to_bus: BusId,
    pub params: LineParams,
}

/// Scheduled active injection, optionally controlling the bus voltage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    pub id: GeneratorId,
    pub bus: BusId,
    pub p_mw: f64,
    /// Voltage setpoint; `Some` makes this the controlling unit of a PV bus.
    pub vm_pu: Option<f64>,
}

impl Generator {
    pub fn is_voltage_controlled(&self) -> bool {
        self.vm_pu.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub id: LoadId,
    pub bus: BusId,
    pub p_mw: f64,
    pub q_mvar: f64,
}

/// Constant-admittance shunt, rated by its consumption at 1 p.u. voltage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shunt {
    pub id: ShuntId,
    pub bus: BusId,
    pub p_mw: f64,
    pub q_mvar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalGrid {
    pub bus: BusId,
    pub vm_pu: f64,
    pub va_degree: f64,
}

/// In-memory network data. Elements are validated on insertion and never
/// change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Network {
    f_hz: f64,
    buses: Vec<Bus>,
    lines: Vec<Line>,
    generators: Vec<Generator>,
    loads: Vec<Load>,
    shunts: Vec<Shunt>,
    ext_grid: Option<ExternalGrid>,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            f_hz: 50.0,
            buses: Vec::new(),
            lines: Vec::new(),
            generators: Vec::new(),
            loads: Vec::new(),
            shunts: Vec::new(),
            ext_grid: None,
        }
    }
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty network operated at `f_hz`.
    pub fn with_frequency(f_hz: f64) -> PfResult<Self> {
        check_positive("network frequency", f_hz)?;
        Ok(Self {
            f_hz,
            ..Self::default()
        })
    }

    pub fn add_bus(&mut self, name: Option<&str>, vn_kv: f64, kind: BusKind) -> PfResult<BusId> {
        check_positive("bus vn_kv", vn_kv)?;
        let id = BusId(self.buses.len());
        if kind == BusKind::Slack {
            if let Some(existing) = self.slack_bus() {
                return Err(PowerFlowError::MultipleSlack {
                    existing,
                    rejected: id,
                });
            }
        }
        self.buses.push(Bus {
            id,
            name: name.map(str::to_owned),
            vn_kv,
            kind,
        });
        Ok(id)
    }

    pub fn add_line(
        &mut self,
        from_bus: BusId,
        to_bus: BusId,
        params: LineParams,
    ) -> PfResult<LineId> {
        let from = self.bus_checked(from_bus)?;
        let to = self.bus_checked(to_bus)?;
        if from_bus == to_bus {
            return Err(PowerFlowError::topology(format!(
                "line from bus {from_bus} to itself"
            )));
        }
        if from.vn_kv != to.vn_kv {
            return Err(PowerFlowError::topology(format!(
                "line {from_bus}-{to_bus} joins {} kV and {} kV buses",
                from.vn_kv, to.vn_kv
            )));
        }
        params.validate()?;
        let id = LineId(self.lines.len());
        self.lines.push(Line {
            id,
            from_bus,
            to_bus,
            params,
        });
        Ok(id)
    }

    pub fn add_generator(
        &mut self,
        bus: BusId,
        p_mw: f64,
        vm_pu: Option<f64>,
    ) -> PfResult<GeneratorId> {
        let kind = self.bus_checked(bus)?.kind;
        check_finite("generator p_mw", p_mw)?;
        if let Some(vm) = vm_pu {
            check_positive("generator vm_pu", vm)?;
            if kind != BusKind::Pv {
                return Err(PowerFlowError::topology(format!(
                    "voltage-controlled generator on {kind:?} bus {bus}"
                )));
            }
            if self
                .generators
                .iter()
                .any(|g| g.bus == bus && g.is_voltage_controlled())
            {
                return Err(PowerFlowError::topology(format!(
                    "bus {bus} already has a voltage-controlling generator"
                )));
            }
        }
        let id = GeneratorId(self.generators.len());
        self.generators.push(Generator {
            id,
            bus,
            p_mw,
            vm_pu,
        });
        Ok(id)
    }

    pub fn add_load(&mut self, bus: BusId, p_mw: f64, q_mvar: f64) -> PfResult<LoadId> {
        self.bus_checked(bus)?;
        check_non_negative("load p_mw", p_mw)?;
        check_non_negative("load q_mvar", q_mvar)?;
        let id = LoadId(self.loads.len());
        self.loads.push(Load {
            id,
            bus,
            p_mw,
            q_mvar,
        });
        Ok(id)
    }

    /// Adds a shunt consuming `p_mw + j q_mvar` at 1 p.u. voltage. A negative
    /// `q_mvar` is a capacitor bank.
    pub fn add_shunt(&mut self, bus: BusId, p_mw: f64, q_mvar: f64) -> PfResult<ShuntId> {
        self.bus_checked(bus)?;
        check_non_negative("shunt p_mw", p_mw)?;
        check_finite("shunt q_mvar", q_mvar)?;
        let id = ShuntId(self.shunts.len());
        self.shunts.push(Shunt {
            id,
            bus,
            p_mw,
            q_mvar,
        });
        Ok(id)
    }

    /// Attaches the external grid to the slack bus, replacing any previous one.
    pub fn set_external_grid(&mut self, bus: BusId, vm_pu: f64, va_degree: f64) -> PfResult<()> {
        let kind = self.bus_checked(bus)?.kind;
        if kind != BusKind::Slack {
            return Err(PowerFlowError::topology(format!(
                "external grid on {kind:?} bus {bus}, it must sit on the slack bus"
            )));
        }
        check_positive("external grid vm_pu", vm_pu)?;
        check_finite("external grid va_degree", va_degree)?;
        self.ext_grid = Some(ExternalGrid {
            bus,
            vm_pu,
            va_degree,
        });
        Ok(())
    }

    pub fn f_hz(&self) -> f64 {
        self.f_hz
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn generators(&self) -> &[Generator] {
        &self.generators
    }

    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    pub fn shunts(&self) -> &[Shunt] {
        &self.shunts
    }

    pub fn external_grid(&self) -> Option<&ExternalGrid> {
        self.ext_grid.as_ref()
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.buses.get(id.index())
    }

    pub fn slack_bus(&self) -> Option<BusId> {
        self.buses
            .iter()
            .find(|b| b.kind == BusKind::Slack)
            .map(|b| b.id)
    }

    fn bus_checked(&self, id: BusId) -> PfResult<&Bus> {
        self.bus(id)
            .ok_or_else(|| PowerFlowError::topology(format!("unknown bus {id}")))
    }
}

fn check_finite(what: &str, value: f64) -> PfResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PowerFlowError::topology(format!("{what} must be finite, got {value}")))
    }
}

fn check_positive(what: &str, value: f64) -> PfResult<()> {
    check_finite(what, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(PowerFlowError::topology(format!("{what} must be positive, got {value}")))
    }
}

fn check_non_negative(what: &str, value: f64) -> PfResult<()> {
    check_finite(what, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(PowerFlowError::topology(format!("{what} must not be negative, got {value}")))
    }
}
