//! Engine activation, relay (de)configuration and sensor lifecycle.

use crate::mock_bus::{Harness, TEMPERATURE_CONTROL, id};
use temprelay::app::commands::AppCommand;
use temprelay::app::events::AppEvent;
use temprelay::config::{ControlMode, SettingChange};
use temprelay::relays::RelayId;

const ADC: &str = "adc_builtin0_6";
const RUUVI: &str = "ruuvi_c66a72222d16";

#[test]
fn dormant_until_a_relay_is_ours() {
    let mut h = Harness::new();
    assert!(!h.app.is_active());
    assert!(!h.bus.registered);
    assert!(h.app.sensors().is_empty());

    h.tick();
    assert!(h.bus.writes.is_empty());
    assert!(h.bus.published_states.is_empty());

    h.set_function(RelayId::Relay1, TEMPERATURE_CONTROL);
    assert!(h.app.is_active());
    assert!(h.bus.registered);
    assert_eq!(h.bus.mode, Some(ControlMode::Auto));
    assert!(h.app.sensor(&id(ADC)).is_some());
    assert_eq!(h.states(ADC), [Some(false), Some(false)]);
    assert!(h.sink.events.iter().any(|e| matches!(e, AppEvent::Activated)));
}

#[test]
fn sensor_added_later_is_tracked() {
    let mut h = Harness::new();
    h.tick();
    h.set_function(RelayId::Relay1, TEMPERATURE_CONTROL);

    h.set_temperature(RUUVI, Some(15.0));
    h.send(AppCommand::DeviceAdded(id(RUUVI)));
    h.tick();
    h.set_setting(RUUVI, SettingChange::Relay { slot: 1, relay: 1 });
    h.set_setting(RUUVI, SettingChange::SetValue { slot: 1, value: 16.0 });
    h.set_setting(RUUVI, SettingChange::ClearValue { slot: 1, value: 25.0 });
    h.tick();
    assert_eq!(h.states(RUUVI), [Some(false), Some(false)], "disabled by default");
    assert!(h.bus.writes.is_empty());

    h.set_setting(RUUVI, SettingChange::Enabled(true));
    h.tick();
    assert_eq!(h.states(RUUVI), [Some(false), Some(true)]);
    assert_eq!(h.relays(), [false, true]);
}

#[test]
fn deconfigured_relay_gets_exactly_one_deactivation() {
    let mut h = Harness::new();
    h.take_both_relays();
    h.set_temperature(ADC, Some(32.0));
    h.set_setting(ADC, SettingChange::Enabled(true));
    h.configure_conditions(ADC, 0, 1);
    h.tick();
    assert_eq!(h.relays(), [true, false]);

    h.set_function(RelayId::Relay0, 0);
    assert_eq!(h.bus.writes_to(RelayId::Relay0), vec![true, false]);
    assert!(h.app.is_active(), "relay 1 is still ours");

    // The condition stays active but its relay is left alone.
    h.ticks(5);
    assert_eq!(h.states(ADC), [Some(true), Some(false)]);
    assert_eq!(h.bus.writes_to(RelayId::Relay0), vec![true, false]);

    // Handing it back resumes control on the next tick.
    h.set_function(RelayId::Relay0, TEMPERATURE_CONTROL);
    h.tick();
    assert_eq!(h.relays(), [true, false]);
}

#[test]
fn inactive_relay_is_not_commanded_on_deconfiguration() {
    let mut h = Harness::new();
    h.take_both_relays();
    h.tick();
    h.set_function(RelayId::Relay1, 2);
    assert!(h.bus.writes.is_empty());
}

#[test]
fn losing_the_last_relay_goes_dormant() {
    let mut h = Harness::new();
    h.set_function(RelayId::Relay0, TEMPERATURE_CONTROL);
    h.set_temperature(ADC, Some(32.0));
    h.set_setting(ADC, SettingChange::Enabled(true));
    h.configure_conditions(ADC, 0, -1);
    h.tick();
    assert_eq!(h.relays(), [true, false]);

    h.set_function(RelayId::Relay0, 1);
    assert!(!h.app.is_active());
    assert!(!h.bus.registered);
    assert!(h.app.sensors().is_empty());
    assert!(h.bus.published_settings.is_empty());
    assert_eq!(h.relays(), [false, false]);
    assert!(h.sink.events.iter().any(|e| matches!(e, AppEvent::Deactivated)));

    // Coming back rebuilds sensor state from the stored settings.
    h.set_function(RelayId::Relay0, TEMPERATURE_CONTROL);
    let sensor = h.app.sensor(&id(ADC)).unwrap();
    assert!(sensor.is_enabled());
    assert_eq!(sensor.conditions()[0].settings.set_value, 30.0);
    h.tick();
    assert_eq!(h.relays(), [true, false]);
}

#[test]
fn removed_sensor_stops_contributing() {
    let mut h = Harness::new();
    h.take_both_relays();
    h.set_temperature(ADC, Some(32.0));
    h.set_temperature(RUUVI, Some(20.0));
    h.send(AppCommand::DeviceAdded(id(RUUVI)));
    for sensor in [ADC, RUUVI] {
        h.set_setting(sensor, SettingChange::Enabled(true));
        h.configure_conditions(sensor, 0, -1);
    }
    h.tick();
    assert_eq!(h.states(ADC)[0], Some(true));
    assert_eq!(h.states(RUUVI)[0], Some(false));
    assert_eq!(h.relays(), [true, false]);

    h.bus.temperatures.remove(&id(ADC));
    h.send(AppCommand::DeviceRemoved(id(ADC)));
    assert!(h.app.sensor(&id(ADC)).is_none());
    assert_eq!(h.states(ADC), [None, None]);

    h.tick();
    assert_eq!(h.relays(), [false, false]);
}

#[test]
fn enabling_an_unseen_sensor_creates_it() {
    let mut h = Harness::new();
    h.take_both_relays();
    h.set_setting("mystery_sensor", SettingChange::Enabled(true));

    let sensor = h.app.sensor(&id("mystery_sensor")).unwrap();
    assert!(sensor.is_enabled());
    assert_eq!(h.states("mystery_sensor"), [Some(false), Some(false)]);

    // Never read successfully: frozen at inactive.
    assert_eq!(h.tick().evaluated, 0);
    assert_eq!(h.states("mystery_sensor"), [Some(false), Some(false)]);
    assert_eq!(h.app.sensor(&id("mystery_sensor")).unwrap().failed_reads(), 1);
}

#[test]
fn devices_seen_while_dormant_are_ignored() {
    let mut h = Harness::new();
    h.set_temperature(RUUVI, Some(20.0));
    h.send(AppCommand::DeviceAdded(id(RUUVI)));
    assert!(h.app.sensors().is_empty());

    // Enumeration on activation still finds it.
    h.set_function(RelayId::Relay0, TEMPERATURE_CONTROL);
    assert!(h.app.sensor(&id(RUUVI)).is_some());
}

#[test]
fn mode_is_persisted_and_published_only() {
    let mut h = Harness::new();
    h.take_both_relays();
    h.set_temperature(ADC, Some(32.0));
    h.set_setting(ADC, SettingChange::Enabled(true));
    h.configure_conditions(ADC, 0, 1);

    h.send(AppCommand::SetMode(ControlMode::Off));
    assert_eq!(h.app.mode(), ControlMode::Off);
    assert_eq!(h.bus.mode, Some(ControlMode::Off));
    assert_eq!(h.settings.config_saves, 1);
    assert_eq!(h.settings.config.mode, ControlMode::Off);

    h.tick();
    assert_eq!(h.relays(), [true, false]);
    assert_eq!(h.app.build_status().mode, ControlMode::Off);
}

#[test]
fn status_snapshot_reflects_state() {
    let mut h = Harness::new();
    h.set_function(RelayId::Relay1, TEMPERATURE_CONTROL);
    h.set_temperature(ADC, Some(4.0));
    h.set_setting(ADC, SettingChange::Enabled(true));
    h.configure_conditions(ADC, 0, 1);
    h.tick();

    let status = h.app.build_status();
    assert!(status.active);
    assert_eq!(status.sensor_count, 1);
    assert_eq!(status.enabled_sensors, 1);
    assert_eq!(status.configured_relays, 0b10);
    assert_eq!(status.desired_relays, [false, true]);
    assert_eq!(status.tick_count, 1);
}

#[test]
fn mode_change_patches_only_the_stored_mode() {
    let mut h = Harness::new();
    h.take_both_relays();

    // Edited in the store after the engine booted.
    h.settings.config.retry_limit = 600;
    h.send(AppCommand::SetMode(ControlMode::Off));
    assert_eq!(h.settings.config.retry_limit, 600);
    assert_eq!(h.settings.config.mode, ControlMode::Off);
    assert_eq!(h.settings.config_saves, 1);

    // Already stored: published but not written again.
    h.send(AppCommand::SetMode(ControlMode::Off));
    assert_eq!(h.settings.config_saves, 1);
    assert_eq!(h.bus.mode, Some(ControlMode::Off));
}

#[test]
fn service_writes_are_stored_and_bad_ones_reverted() {
    let mut h = Harness::new();
    h.take_both_relays();
    h.set_temperature(ADC, Some(32.0));

    h.write_service(ADC, SettingChange::Enabled(true));
    h.write_service(ADC, SettingChange::Relay { slot: 0, relay: 0 });
    h.write_service(ADC, SettingChange::SetValue { slot: 0, value: 30.0 });
    h.write_service(ADC, SettingChange::ClearValue { slot: 0, value: 25.0 });
    assert_eq!(h.settings.sensor_saves, 4);
    let stored = h.settings.sensors[&id(ADC)];
    assert!(stored.enabled);
    assert_eq!(stored.conditions[0].relay, 0);
    assert_eq!(stored.conditions[0].set_value, 30.0);

    h.tick();
    assert_eq!(h.relays(), [true, false]);

    h.write_service(ADC, SettingChange::SetValue { slot: 0, value: 500.0 });
    assert_eq!(h.settings.sensor_saves, 4);
    assert_eq!(h.bus.published_settings[&id(ADC)].conditions[0].set_value, 30.0);

    // Changes coming from the store are not written back to it.
    h.set_setting(ADC, SettingChange::ClearValue { slot: 0, value: 20.0 });
    assert_eq!(h.settings.sensor_saves, 4);
}

#[test]
fn available_sensors_follow_the_table() {
    let mut h = Harness::new();
    h.set_temperature(RUUVI, Some(20.0));
    h.set_function(RelayId::Relay0, TEMPERATURE_CONTROL);
    assert_eq!(h.bus.available, vec![id(ADC), id(RUUVI)]);

    h.bus.temperatures.remove(&id(RUUVI));
    h.send(AppCommand::DeviceRemoved(id(RUUVI)));
    assert_eq!(h.bus.available, vec![id(ADC)]);

    h.set_function(RelayId::Relay0, 0);
    assert!(h.bus.available.is_empty());
}
