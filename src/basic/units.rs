//! Per-unit bases shared by the admittance builder and the result extractor.

/// Base quantities of one voltage level.
///
/// `s_mva` is the common power base of the whole network; `v_kv` is the
/// nominal line-to-line voltage of the bus or line being converted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PerUnitBase {
    pub s_mva: f64,
    pub v_kv: f64,
}

impl PerUnitBase {
    pub fn new(s_mva: f64, v_kv: f64) -> Self {
        Self { s_mva, v_kv }
    }

    /// Base impedance in Ω.
    pub fn z_ohm(&self) -> f64 {
        self.v_kv * self.v_kv / self.s_mva
    }

    /// Base line current in kA.
    pub fn i_ka(&self) -> f64 {
        self.s_mva / (3f64.sqrt() * self.v_kv)
    }
}
