use std::collections::HashSet;

use crate::telemetry::Domain;

/// Where a sensor's value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// A path expression such as `.data.vip[0].power` into one document.
    Field(Domain, &'static str),
    /// The value of another sensor in the same projection.
    Alias(&'static str),
}

/// Static Home Assistant metadata of a sensor.
///
/// More information about the Home Assistant sensor entities can be found here:
/// https://developers.home-assistant.io/docs/core/entity/sensor/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensorAttributes {
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub unit: Option<&'static str>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensorDef {
    pub key: &'static str,
    pub friendly_name: &'static str,
    pub attributes: SensorAttributes,
    pub source: Source,
}

impl SensorDef {
    pub fn entity_id(&self, serial: &str) -> String {
        format!("sensor.solarsynk_{serial}_{}", self.key)
    }
}

const fn field(domain: Domain, path: &'static str) -> Source {
    Source::Field(domain, path)
}

const fn sensor(
    key: &'static str,
    friendly_name: &'static str,
    device_class: Option<&'static str>,
    state_class: Option<&'static str>,
    unit: Option<&'static str>,
    source: Source,
) -> SensorDef {
    SensorDef {
        key,
        friendly_name,
        attributes: SensorAttributes {
            device_class,
            state_class,
            unit,
        },
        source,
    }
}

const MEASUREMENT: Option<&str> = Some("measurement");
const TOTAL_INCREASING: Option<&str> = Some("total_increasing");

const fn power(key: &'static str, name: &'static str, source: Source) -> SensorDef {
    sensor(key, name, Some("power"), MEASUREMENT, Some("W"), source)
}

const fn voltage(key: &'static str, name: &'static str, source: Source) -> SensorDef {
    sensor(key, name, Some("voltage"), MEASUREMENT, Some("V"), source)
}

const fn current(key: &'static str, name: &'static str, source: Source) -> SensorDef {
    sensor(key, name, Some("current"), MEASUREMENT, Some("A"), source)
}

const fn frequency(key: &'static str, name: &'static str, source: Source) -> SensorDef {
    sensor(key, name, Some("frequency"), MEASUREMENT, Some("Hz"), source)
}

const fn temperature(key: &'static str, name: &'static str, source: Source) -> SensorDef {
    sensor(key, name, Some("temperature"), MEASUREMENT, Some("°C"), source)
}

const fn energy(key: &'static str, name: &'static str, source: Source) -> SensorDef {
    sensor(key, name, Some("energy"), TOTAL_INCREASING, Some("kWh"), source)
}

const fn battery(key: &'static str, name: &'static str, source: Source) -> SensorDef {
    sensor(key, name, Some("battery"), MEASUREMENT, Some("%"), source)
}

const fn charge(key: &'static str, name: &'static str, source: Source) -> SensorDef {
    sensor(key, name, None, MEASUREMENT, Some("Ah"), source)
}

const fn power_factor(key: &'static str, name: &'static str, source: Source) -> SensorDef {
    sensor(key, name, Some("power_factor"), MEASUREMENT, None, source)
}

// Configured limits: typed like their live counterparts, but not measurements.
const fn power_setting(key: &'static str, name: &'static str, source: Source) -> SensorDef {
    sensor(key, name, Some("power"), None, Some("W"), source)
}

const fn current_setting(key: &'static str, name: &'static str, source: Source) -> SensorDef {
    sensor(key, name, Some("current"), None, Some("A"), source)
}

const fn text(key: &'static str, name: &'static str, source: Source) -> SensorDef {
    sensor(key, name, None, None, None, source)
}

const fn alias(key: &'static str, name: &'static str, target: &'static str) -> SensorDef {
    text(key, name, Source::Alias(target))
}

/// Every sensor the bridge can publish, independent of which documents
/// loaded in a given cycle.
pub static SENSORS: &[SensorDef] = &[
    charge("battery_capacity", "Battery Capacity", field(Domain::Battery, ".data.capacity")),
    voltage(
        "battery_chargevolt",
        "Battery Charge Voltage",
        field(Domain::Battery, ".data.chargeVolt"),
    ),
    voltage(
        "battery_dischargevolt",
        "Battery Discharge Voltage",
        field(Domain::Battery, ".data.dischargeVolt"),
    ),
    current("battery_current", "Battery Current", field(Domain::Battery, ".data.current")),
    power("battery_power", "Battery Power", field(Domain::Battery, ".data.power")),
    battery("battery_soc", "Battery SOC", field(Domain::Battery, ".data.bmsSoc")),
    temperature("battery_temperature", "Battery Temperature", field(Domain::Battery, ".data.temp")),
    voltage("battery_voltage", "Battery Voltage", field(Domain::Battery, ".data.voltage")),
    current(
        "battery_bms_current",
        "Battery BMS Current",
        field(Domain::Battery, ".data.bmsCurrent"),
    ),
    voltage("battery_bms_voltage", "Battery BMS Voltage", field(Domain::Battery, ".data.bmsVolt")),
    temperature(
        "battery_bms_temperature",
        "Battery BMS Temperature",
        field(Domain::Battery, ".data.bmsTemp"),
    ),
    text("battery_status", "Battery Status", field(Domain::Battery, ".data.status")),
    text("battery_type", "Battery Type", field(Domain::Battery, ".data.type")),
    energy("day_battery_charge", "Daily Battery Charge", field(Domain::Battery, ".data.etodayChg")),
    energy(
        "day_battery_discharge",
        "Daily Battery Discharge",
        field(Domain::Battery, ".data.etodayDischg"),
    ),
    energy(
        "month_battery_charge",
        "Monthly Battery Charge",
        field(Domain::Battery, ".data.emonthChg"),
    ),
    energy(
        "month_battery_discharge",
        "Monthly Battery Discharge",
        field(Domain::Battery, ".data.emonthDischg"),
    ),
    energy(
        "year_battery_charge",
        "Yearly Battery Charge",
        field(Domain::Battery, ".data.eyearChg"),
    ),
    energy(
        "year_battery_discharge",
        "Yearly Battery Discharge",
        field(Domain::Battery, ".data.eyearDischg"),
    ),
    energy(
        "total_battery_charge",
        "Total Battery Charge",
        field(Domain::Battery, ".data.etotalChg"),
    ),
    energy(
        "total_battery_discharge",
        "Total Battery Discharge",
        field(Domain::Battery, ".data.etotalDischg"),
    ),
    text("grid_connected_status", "Grid Connection Status", field(Domain::Grid, ".data.status")),
    frequency("grid_frequency", "Grid Frequency", field(Domain::Grid, ".data.fac")),
    power("grid_power", "Grid Power", field(Domain::Grid, ".data.vip[0].power")),
    voltage("grid_voltage", "Grid Voltage", field(Domain::Grid, ".data.vip[0].volt")),
    current("grid_current", "Grid Current", field(Domain::Grid, ".data.vip[0].current")),
    power("grid_power1", "Grid Power L2", field(Domain::Grid, ".data.vip[1].power")),
    voltage("grid_voltage1", "Grid Voltage L2", field(Domain::Grid, ".data.vip[1].volt")),
    current("grid_current1", "Grid Current L2", field(Domain::Grid, ".data.vip[1].current")),
    power("grid_power2", "Grid Power L3", field(Domain::Grid, ".data.vip[2].power")),
    voltage("grid_voltage2", "Grid Voltage L3", field(Domain::Grid, ".data.vip[2].volt")),
    current("grid_current2", "Grid Current L3", field(Domain::Grid, ".data.vip[2].current")),
    power("grid_total_power", "Grid Total Power", field(Domain::Grid, ".data.pac")),
    power_factor("grid_power_factor", "Grid Power Factor", field(Domain::Grid, ".data.pf")),
    energy("day_grid_import", "Daily Grid Import", field(Domain::Grid, ".data.etodayFrom")),
    energy("day_grid_export", "Daily Grid Export", field(Domain::Grid, ".data.etodayTo")),
    energy("total_grid_import", "Total Grid Import", field(Domain::Grid, ".data.etotalFrom")),
    energy("total_grid_export", "Total Grid Export", field(Domain::Grid, ".data.etotalTo")),
    power("load_power", "Load Power", field(Domain::Load, ".data.totalPower")),
    frequency("load_frequency", "Load Frequency", field(Domain::Load, ".data.loadFac")),
    voltage("load_voltage_l1", "Load Voltage L1", field(Domain::Load, ".data.vip[0].volt")),
    current("load_current_l1", "Load Current L1", field(Domain::Load, ".data.vip[0].current")),
    power("load_power_l1", "Load Power L1", field(Domain::Load, ".data.vip[0].power")),
    voltage("load_voltage_l2", "Load Voltage L2", field(Domain::Load, ".data.vip[1].volt")),
    current("load_current_l2", "Load Current L2", field(Domain::Load, ".data.vip[1].current")),
    power("load_power_l2", "Load Power L2", field(Domain::Load, ".data.vip[1].power")),
    voltage("load_voltage_l3", "Load Voltage L3", field(Domain::Load, ".data.vip[2].volt")),
    current("load_current_l3", "Load Current L3", field(Domain::Load, ".data.vip[2].current")),
    power("load_power_l3", "Load Power L3", field(Domain::Load, ".data.vip[2].power")),
    power("load_ups_power_l1", "Load UPS Power L1", field(Domain::Load, ".data.upsPowerL1")),
    power("load_ups_power_l2", "Load UPS Power L2", field(Domain::Load, ".data.upsPowerL2")),
    power("load_ups_power_l3", "Load UPS Power L3", field(Domain::Load, ".data.upsPowerL3")),
    power(
        "load_ups_power_total",
        "Load UPS Power Total",
        field(Domain::Load, ".data.upsPowerTotal"),
    ),
    energy("day_load_energy", "Daily Load Energy", field(Domain::Load, ".data.dailyUsed")),
    energy("total_load_energy", "Total Load Energy", field(Domain::Load, ".data.totalUsed")),
    power("inverter_power", "Inverter Power", field(Domain::InverterOutput, ".data.pInv")),
    frequency(
        "inverter_frequency",
        "Inverter Frequency",
        field(Domain::InverterOutput, ".data.fac"),
    ),
    voltage(
        "inverter_voltage_l1",
        "Inverter Voltage L1",
        field(Domain::InverterOutput, ".data.vip[0].volt"),
    ),
    current(
        "inverter_current_l1",
        "Inverter Current L1",
        field(Domain::InverterOutput, ".data.vip[0].current"),
    ),
    power(
        "inverter_power_l1",
        "Inverter Power L1",
        field(Domain::InverterOutput, ".data.vip[0].power"),
    ),
    voltage(
        "inverter_voltage_l2",
        "Inverter Voltage L2",
        field(Domain::InverterOutput, ".data.vip[1].volt"),
    ),
    current(
        "inverter_current_l2",
        "Inverter Current L2",
        field(Domain::InverterOutput, ".data.vip[1].current"),
    ),
    power(
        "inverter_power_l2",
        "Inverter Power L2",
        field(Domain::InverterOutput, ".data.vip[1].power"),
    ),
    voltage(
        "inverter_voltage_l3",
        "Inverter Voltage L3",
        field(Domain::InverterOutput, ".data.vip[2].volt"),
    ),
    current(
        "inverter_current_l3",
        "Inverter Current L3",
        field(Domain::InverterOutput, ".data.vip[2].current"),
    ),
    power(
        "inverter_power_l3",
        "Inverter Power L3",
        field(Domain::InverterOutput, ".data.vip[2].power"),
    ),
    power("inverter_ac_power", "Inverter AC Power", field(Domain::InverterOutput, ".data.pac")),
    power("pv_power", "PV Power", field(Domain::PvInput, ".data.pac")),
    energy("day_pv_energy", "Daily PV Energy", field(Domain::PvInput, ".data.etoday")),
    energy("month_pv_energy", "Monthly PV Energy", field(Domain::PvInput, ".data.emonth")),
    energy("year_pv_energy", "Yearly PV Energy", field(Domain::PvInput, ".data.eyear")),
    energy("total_pv_energy", "Total PV Energy", field(Domain::PvInput, ".data.etotal")),
    voltage("pv1_voltage", "PV1 Voltage", field(Domain::PvInput, ".data.pvIV[0].vpv")),
    current("pv1_current", "PV1 Current", field(Domain::PvInput, ".data.pvIV[0].ipv")),
    power("pv1_power", "PV1 Power", field(Domain::PvInput, ".data.pvIV[0].ppv")),
    voltage("pv2_voltage", "PV2 Voltage", field(Domain::PvInput, ".data.pvIV[1].vpv")),
    current("pv2_current", "PV2 Current", field(Domain::PvInput, ".data.pvIV[1].ipv")),
    power("pv2_power", "PV2 Power", field(Domain::PvInput, ".data.pvIV[1].ppv")),
    voltage("pv3_voltage", "PV3 Voltage", field(Domain::PvInput, ".data.pvIV[2].vpv")),
    current("pv3_current", "PV3 Current", field(Domain::PvInput, ".data.pvIV[2].ipv")),
    power("pv3_power", "PV3 Power", field(Domain::PvInput, ".data.pvIV[2].ppv")),
    voltage("pv4_voltage", "PV4 Voltage", field(Domain::PvInput, ".data.pvIV[3].vpv")),
    current("pv4_current", "PV4 Current", field(Domain::PvInput, ".data.pvIV[3].ipv")),
    power("pv4_power", "PV4 Power", field(Domain::PvInput, ".data.pvIV[3].ppv")),
    temperature(
        "dc_temperature",
        "Inverter DC Temperature",
        field(Domain::Temperature, ".data.infos[0].records[-1].value"),
    ),
    temperature(
        "ac_temperature",
        "Inverter AC Temperature",
        field(Domain::Temperature, ".data.infos[1].records[-1].value"),
    ),
    text("inverter_status", "Inverter Status", field(Domain::InverterInfo, ".data.status")),
    text("run_status", "Inverter Run Status", field(Domain::InverterInfo, ".data.runStatus")),
    alias("overall_state", "Overall State", "run_status"),
    text(
        "inverter_firmware",
        "Inverter Master Firmware",
        field(Domain::InverterInfo, ".data.version.masterVer"),
    ),
    text(
        "inverter_comm_firmware",
        "Inverter Comms Firmware",
        field(Domain::InverterInfo, ".data.version.softVer"),
    ),
    power_setting(
        "inverter_rated_power",
        "Inverter Rated Power",
        field(Domain::InverterInfo, ".data.ratePower"),
    ),
    text("inverter_name", "Inverter Name", field(Domain::InverterInfo, ".data.alias")),
    text(
        "inverter_last_update",
        "Inverter Last Update",
        field(Domain::InverterInfo, ".data.updateAt"),
    ),
    text("prog1_time", "Program 1 Time", field(Domain::Settings, ".data.sellTime1")),
    battery("prog1_capacity", "Program 1 Capacity", field(Domain::Settings, ".data.cap1")),
    power_setting("prog1_power", "Program 1 Power", field(Domain::Settings, ".data.sellTime1Pac")),
    text("prog1_charge", "Program 1 Grid Charge", field(Domain::Settings, ".data.time1on")),
    text("prog2_time", "Program 2 Time", field(Domain::Settings, ".data.sellTime2")),
    battery("prog2_capacity", "Program 2 Capacity", field(Domain::Settings, ".data.cap2")),
    power_setting("prog2_power", "Program 2 Power", field(Domain::Settings, ".data.sellTime2Pac")),
    text("prog2_charge", "Program 2 Grid Charge", field(Domain::Settings, ".data.time2on")),
    text("prog3_time", "Program 3 Time", field(Domain::Settings, ".data.sellTime3")),
    battery("prog3_capacity", "Program 3 Capacity", field(Domain::Settings, ".data.cap3")),
    power_setting("prog3_power", "Program 3 Power", field(Domain::Settings, ".data.sellTime3Pac")),
    text("prog3_charge", "Program 3 Grid Charge", field(Domain::Settings, ".data.time3on")),
    text("prog4_time", "Program 4 Time", field(Domain::Settings, ".data.sellTime4")),
    battery("prog4_capacity", "Program 4 Capacity", field(Domain::Settings, ".data.cap4")),
    power_setting("prog4_power", "Program 4 Power", field(Domain::Settings, ".data.sellTime4Pac")),
    text("prog4_charge", "Program 4 Grid Charge", field(Domain::Settings, ".data.time4on")),
    text("prog5_time", "Program 5 Time", field(Domain::Settings, ".data.sellTime5")),
    battery("prog5_capacity", "Program 5 Capacity", field(Domain::Settings, ".data.cap5")),
    power_setting("prog5_power", "Program 5 Power", field(Domain::Settings, ".data.sellTime5Pac")),
    text("prog5_charge", "Program 5 Grid Charge", field(Domain::Settings, ".data.time5on")),
    text("prog6_time", "Program 6 Time", field(Domain::Settings, ".data.sellTime6")),
    battery("prog6_capacity", "Program 6 Capacity", field(Domain::Settings, ".data.cap6")),
    power_setting("prog6_power", "Program 6 Power", field(Domain::Settings, ".data.sellTime6Pac")),
    text("prog6_charge", "Program 6 Grid Charge", field(Domain::Settings, ".data.time6on")),
    text("use_timer", "Use Timer", field(Domain::Settings, ".data.peakAndVallery")),
    text("priority_load", "Energy Priority Mode", field(Domain::Settings, ".data.energyMode")),
    text("solar_export", "Solar Export", field(Domain::Settings, ".data.solarSell")),
    battery(
        "battery_shutdown_cap",
        "Battery Shutdown Capacity",
        field(Domain::Settings, ".data.batteryShutdownCap"),
    ),
    battery(
        "battery_restart_cap",
        "Battery Restart Capacity",
        field(Domain::Settings, ".data.batteryRestartCap"),
    ),
    battery(
        "battery_low_cap",
        "Battery Low Capacity",
        field(Domain::Settings, ".data.batteryLowCap"),
    ),
    current_setting(
        "battery_max_charge_current",
        "Battery Max Charge Current",
        field(Domain::Settings, ".data.batteryMaxCurrentCharge"),
    ),
    current_setting(
        "battery_max_discharge_current",
        "Battery Max Discharge Current",
        field(Domain::Settings, ".data.batteryMaxCurrentDischarge"),
    ),
    text("sys_work_mode", "System Work Mode", field(Domain::Settings, ".data.sysWorkMode")),
];

pub fn find(key: &str) -> Option<&'static SensorDef> {
    SENSORS.iter().find(|sensor| sensor.key == key)
}

/// Keys defined more than once; empty for a well-formed catalogue.
pub fn duplicate_keys(catalog: &[SensorDef]) -> Vec<&'static str> {
    let mut seen = HashSet::new();
    catalog
        .iter()
        .filter(|sensor| !seen.insert(sensor.key))
        .map(|sensor| sensor.key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_unique() {
        assert!(duplicate_keys(SENSORS).is_empty());
    }

    #[test]
    fn catalogue_covers_every_domain() {
        for domain in Domain::ALL {
            assert!(
                SENSORS
                    .iter()
                    .any(|s| matches!(s.source, Source::Field(d, _) if d == domain)),
                "no sensor reads {domain}"
            );
        }
        assert!(SENSORS.len() >= 100);
    }

    #[test]
    fn aliases_point_at_field_sensors() {
        for sensor in SENSORS {
            if let Source::Alias(target) = sensor.source {
                let target = find(target).unwrap();
                assert!(matches!(target.source, Source::Field(..)));
            }
        }
        assert_eq!(
            find("overall_state").unwrap().source,
            Source::Alias("run_status")
        );
    }

    #[test]
    fn entity_ids_carry_the_serial() {
        assert_eq!(
            find("battery_soc").unwrap().entity_id("2211229948"),
            "sensor.solarsynk_2211229948_battery_soc"
        );
    }

    #[test]
    fn detects_duplicates() {
        let catalog = [
            text("a", "A", Source::Alias("x")),
            text("a", "A again", Source::Alias("x")),
        ];
        assert_eq!(duplicate_keys(&catalog), vec!["a"]);
    }
}
