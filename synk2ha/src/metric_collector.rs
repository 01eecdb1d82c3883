use crate::projector::SensorValues;

pub trait MetricCollector {
    fn publish(&mut self, serial: &str, values: &SensorValues);
}
