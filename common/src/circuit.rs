use crate::types::CircuitId;

// Seeds keep the first duty-cycle small and the denominator non-zero.
const SEED_ON_DURATION_MS: u64 = 1;
const SEED_OFF_DURATION_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    SwitchedOn,
    SwitchedOff,
}

/// One floor-heating loop and its duty-cycle bookkeeping.
///
/// Durations are only recomputed when the commanded state changes, so the duty
/// cycle describes the most recently completed on+off cycle.
#[derive(Debug, Clone)]
pub struct Circuit {
    id: CircuitId,
    desired_on: bool,
    commanded_on: bool,
    last_on_ms: u64,
    last_off_ms: u64,
    on_duration_ms: u64,
    off_duration_ms: u64,
    duty_cycle: f64,
}

impl Circuit {
    pub fn new(id: CircuitId) -> Self {
        Self {
            id,
            desired_on: false,
            commanded_on: false,
            last_on_ms: 0,
            last_off_ms: 0,
            on_duration_ms: SEED_ON_DURATION_MS,
            off_duration_ms: SEED_OFF_DURATION_MS,
            duty_cycle: 0.0,
        }
    }

    pub fn id(&self) -> CircuitId {
        self.id
    }

    pub fn rated_power_w(&self) -> u32 {
        self.id.rated_power_w()
    }

    pub fn desired_on(&self) -> bool {
        self.desired_on
    }

    pub fn set_desired(&mut self, on: bool) {
        self.desired_on = on;
    }

    pub fn commanded_on(&self) -> bool {
        self.commanded_on
    }

    pub fn duty_cycle(&self) -> f64 {
        self.duty_cycle
    }

    pub fn on_duration_ms(&self) -> u64 {
        self.on_duration_ms
    }

    pub fn off_duration_ms(&self) -> u64 {
        self.off_duration_ms
    }

    /// Drives the commanded state towards the desired state.
    ///
    /// Returns the edge taken, if any. The caller is responsible for
    /// switching the relay on an edge.
    pub fn apply(&mut self, now_ms: u64) -> Option<Edge> {
        match (self.desired_on, self.commanded_on) {
            (true, false) => {
                self.commanded_on = true;
                self.last_on_ms = now_ms;
                self.off_duration_ms = now_ms.saturating_sub(self.last_off_ms);
                self.recompute_duty_cycle();
                Some(Edge::SwitchedOn)
            }
            (false, true) => {
                self.commanded_on = false;
                self.last_off_ms = now_ms;
                self.on_duration_ms = now_ms.saturating_sub(self.last_on_ms);
                self.recompute_duty_cycle();
                Some(Edge::SwitchedOff)
            }
            _ => None,
        }
    }

    fn recompute_duty_cycle(&mut self) {
        let period = self.on_duration_ms.saturating_add(self.off_duration_ms);
        if period == 0 {
            return;
        }
        let duty = self.on_duration_ms as f64 * 100.0 / period as f64;
        self.duty_cycle = duty.clamp(0.0, 100.0);
    }
}

/// Sum of rated power over the circuits currently commanded ON.
pub fn heat_demand_w(circuits: &[Circuit]) -> u32 {
    circuits
        .iter()
        .filter(|circuit| circuit.commanded_on())
        .map(Circuit::rated_power_w)
        .sum()
}

/// Names of the ON circuits plus the demand, e.g. `*VV:  BB IK = 2.28 kW`.
pub fn summary_line(circuits: &[Circuit]) -> String {
    let mut line = String::from("*VV: ");
    for circuit in circuits.iter().filter(|circuit| circuit.commanded_on()) {
        line.push(' ');
        line.push_str(circuit.id().as_str());
    }
    let demand_kw = heat_demand_w(circuits) as f64 / 1000.0;
    line.push_str(&format!(" = {demand_kw:.2} kW"));
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circuit() -> Circuit {
        Circuit::new(CircuitId::Bb)
    }

    #[test]
    fn first_switch_on_uses_seeded_on_duration() {
        let mut circuit = circuit();
        circuit.set_desired(true);

        assert_eq!(circuit.apply(9_999), Some(Edge::SwitchedOn));
        assert!(circuit.commanded_on());
        assert_eq!(circuit.off_duration_ms(), 9_999);
        // 1 * 100 / (1 + 9_999)
        assert!((circuit.duty_cycle() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn duty_cycle_reflects_completed_cycle() {
        let mut circuit = circuit();

        circuit.set_desired(true);
        circuit.apply(60_000);
        circuit.set_desired(false);
        assert_eq!(circuit.apply(90_000), Some(Edge::SwitchedOff));
        assert_eq!(circuit.on_duration_ms(), 30_000);
        // on 30_000 / (30_000 + off 60_000)
        assert!((circuit.duty_cycle() - 100.0 / 3.0).abs() < 1e-9);

        circuit.set_desired(true);
        assert_eq!(circuit.apply(180_000), Some(Edge::SwitchedOn));
        assert_eq!(circuit.off_duration_ms(), 90_000);
        assert!((circuit.duty_cycle() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn polling_without_edge_leaves_duty_cycle_untouched() {
        let mut circuit = circuit();
        circuit.set_desired(true);
        circuit.apply(60_000);
        let duty = circuit.duty_cycle();

        for now in [120_000, 180_000, 3_600_000] {
            assert_eq!(circuit.apply(now), None);
            assert_eq!(circuit.duty_cycle(), duty);
        }
    }

    #[test]
    fn duty_cycle_stays_within_bounds() {
        let mut circuit = circuit();
        let mut now = 0;
        for step in 0..50u64 {
            now += (step % 7) * 13_000;
            circuit.set_desired(step % 2 == 0);
            circuit.apply(now);
            assert!((0.0..=100.0).contains(&circuit.duty_cycle()));
        }
    }

    #[test]
    fn zero_length_cycle_keeps_previous_duty_cycle() {
        let mut circuit = circuit();
        circuit.set_desired(true);
        circuit.apply(0);
        let duty = circuit.duty_cycle();
        circuit.set_desired(false);
        circuit.apply(0);
        circuit.set_desired(true);
        circuit.apply(0);

        assert!(circuit.duty_cycle().is_finite());
        assert_eq!(circuit.duty_cycle(), duty);
    }

    #[test]
    fn heat_demand_sums_commanded_circuits() {
        let mut circuits: Vec<Circuit> = CircuitId::ALL.into_iter().map(Circuit::new).collect();
        for circuit in &mut circuits {
            circuit.set_desired(true);
            circuit.apply(1_000);
        }
        assert_eq!(heat_demand_w(&circuits), 6_601);

        circuits[0].set_desired(false);
        circuits[0].apply(2_000);
        assert_eq!(heat_demand_w(&circuits), 6_601 - 1_254);
    }

    #[test]
    fn summary_lists_on_circuits() {
        let mut circuits: Vec<Circuit> = CircuitId::ALL.into_iter().map(Circuit::new).collect();
        circuits[0].set_desired(true);
        circuits[0].apply(1_000);
        circuits[2].set_desired(true);
        circuits[2].apply(1_000);

        assert_eq!(summary_line(&circuits), "*VV:  BB IK = 2.28 kW");
    }
}
