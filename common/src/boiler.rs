use crate::types::BoilerId;

/// kWh per litre per kelvin of water.
const WATER_KWH_PER_LITRE_K: f64 = 1.163 / 1000.0;

/// Volumes of the five zones of the 294 l buffer, top to bottom.
pub const ZONE_VOLUMES_L: [f64; 5] = [66.0, 54.0, 54.0, 54.0, 66.0];

/// Stratified buffer boiler with six sensors (top-high, top-low, mid-high,
/// mid-low, bottom-high, bottom-low) delimiting five zones.
#[derive(Debug, Clone)]
pub struct Boiler {
    id: BoilerId,
    min_useful_c: f64,
    readings_c: [f64; 6],
    zone_avg_c: [f64; 5],
    zone_energy_kwh: [f64; 5],
    spare_energy_kwh: f64,
    valid: bool,
}

impl Boiler {
    pub fn new(id: BoilerId, min_useful_c: f64) -> Self {
        Self {
            id,
            min_useful_c,
            readings_c: [0.0; 6],
            zone_avg_c: [0.0; 5],
            zone_energy_kwh: [0.0; 5],
            spare_energy_kwh: 0.0,
            valid: false,
        }
    }

    pub fn id(&self) -> BoilerId {
        self.id
    }

    pub fn readings_c(&self) -> &[f64; 6] {
        &self.readings_c
    }

    pub fn zone_avg_c(&self) -> &[f64; 5] {
        &self.zone_avg_c
    }

    pub fn zone_energy_kwh(&self) -> &[f64; 5] {
        &self.zone_energy_kwh
    }

    /// Sum of the zone energies. Zones colder than the useful minimum
    /// contribute negatively.
    pub fn spare_energy_kwh(&self) -> f64 {
        self.spare_energy_kwh
    }

    pub fn average_c(&self) -> f64 {
        self.zone_avg_c.iter().sum::<f64>() / self.zone_avg_c.len() as f64
    }

    /// True once every sensor has produced at least one valid reading.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Recomputes the model from the last valid sensor values. Sensors that
    /// never produced a valid reading hold the previous model in place.
    pub fn update(&mut self, readings: [Option<f64>; 6]) -> bool {
        let mut values = [0.0; 6];
        for (slot, reading) in values.iter_mut().zip(readings) {
            match reading {
                Some(value) => *slot = value,
                None => return false,
            }
        }

        self.readings_c = values;
        for zone in 0..5 {
            let avg = (values[zone] + values[zone + 1]) / 2.0;
            self.zone_avg_c[zone] = avg;
            self.zone_energy_kwh[zone] =
                (avg - self.min_useful_c) * ZONE_VOLUMES_L[zone] * WATER_KWH_PER_LITRE_K;
        }
        self.spare_energy_kwh = self.zone_energy_kwh.iter().sum();
        self.valid = true;
        true
    }

    /// One-line zone breakdown, e.g. `*KS: 1.5,1.3,...=6.20(45)`.
    pub fn zone_report(&self) -> String {
        let tag = match self.id {
            BoilerId::Sch => "KS",
            BoilerId::Won => "KW",
        };
        let zones = self
            .zone_energy_kwh
            .iter()
            .map(|energy| format!("{energy:.1}"))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "*{tag}: {zones}={:.2}({:.0})",
            self.spare_energy_kwh,
            self.average_c()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn uniform_tank_energy_matches_volume() {
        let mut boiler = Boiler::new(BoilerId::Sch, 25.0);
        assert!(boiler.update([Some(45.0); 6]));

        // 20 K over 294 l
        assert!(approx(boiler.spare_energy_kwh(), 20.0 * 294.0 * 1.163 / 1000.0));
        assert!(approx(boiler.average_c(), 45.0));
    }

    #[test]
    fn zones_average_adjacent_sensors() {
        let mut boiler = Boiler::new(BoilerId::Sch, 25.0);
        boiler.update([
            Some(60.0),
            Some(50.0),
            Some(40.0),
            Some(30.0),
            Some(20.0),
            Some(10.0),
        ]);

        assert_eq!(boiler.zone_avg_c(), &[55.0, 45.0, 35.0, 25.0, 15.0]);
        assert!(approx(boiler.zone_energy_kwh()[0], 30.0 * 66.0 * 1.163 / 1000.0));
        assert!(approx(boiler.zone_energy_kwh()[3], 0.0));
        assert!(approx(boiler.zone_energy_kwh()[4], -10.0 * 66.0 * 1.163 / 1000.0));
    }

    #[test]
    fn cold_zones_cancel_warm_zones() {
        let mut boiler = Boiler::new(BoilerId::Won, 25.0);
        boiler.update([
            Some(35.0),
            Some(35.0),
            Some(25.0),
            Some(25.0),
            Some(15.0),
            Some(15.0),
        ]);

        let zones = boiler.zone_energy_kwh();
        assert!(zones[4] < 0.0);
        assert!(approx(
            boiler.spare_energy_kwh(),
            zones.iter().sum::<f64>()
        ));
        // 10 K * 66 l + 5 K * 54 l - 5 K * 54 l - 10 K * 66 l
        assert!(approx(boiler.spare_energy_kwh(), 0.0));
    }

    #[test]
    fn missing_sensor_keeps_previous_model() {
        let mut boiler = Boiler::new(BoilerId::Sch, 25.0);
        boiler.update([Some(40.0); 6]);
        let before = boiler.spare_energy_kwh();

        let mut readings = [Some(80.0); 6];
        readings[2] = None;
        assert!(!boiler.update(readings));
        assert_eq!(boiler.spare_energy_kwh(), before);
        assert!(boiler.is_valid());
    }

    #[test]
    fn zone_report_lists_each_zone() {
        let mut boiler = Boiler::new(BoilerId::Won, 25.0);
        boiler.update([Some(25.0); 6]);
        assert_eq!(boiler.zone_report(), "*KW: 0.0,0.0,0.0,0.0,0.0=0.00(25)");
    }
}
