//! Configuration lifecycle: parse, validate, wire, persist.
//!
//! The manager is the only writer of the dispatcher's binding table.  An
//! apply pass first removes every existing binding, then wires each entry
//! independently: one invalid entry is logged and skipped, the rest still
//! land (partial-failure semantics).  The same canonical JSON the web UI
//! posts is what gets persisted and served back.

use log::{error, info, warn};

use crate::config::{CHANNEL_COUNT, CHANNEL_MAX, CHANNEL_MID, CHANNEL_MIN, Config, HandlerConfig, HandlerKind};
use crate::dispatch::ChannelDispatcher;
use crate::error::{ConfigValidationError, Error, PersistenceError};
use crate::handlers::{BlinkHandler, OnOffHandler, Predicate, PwmHandler};
use crate::pins;
use crate::ports::{ByteStore, OutputFactory};
use crate::store::ConfigStore;

/// Outcome of one apply pass.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Entries successfully wired.
    pub applied: usize,
    /// Entry index and reason for every skipped entry.
    pub skipped: Vec<(usize, Error)>,
}

impl ApplyReport {
    pub fn fully_applied(&self) -> bool {
        self.skipped.is_empty()
    }
}

pub struct ConfigManager<S: ByteStore> {
    store: ConfigStore<S>,
    config: Config,
}

impl<S: ByteStore> ConfigManager<S> {
    pub fn new(store: ConfigStore<S>) -> Self {
        Self {
            store,
            config: Config::default(),
        }
    }

    /// Bring up the store and load the persisted configuration.  Any
    /// persistence failure clears the region and falls back to defaults;
    /// a corrupt record must never keep the vehicle from booting.
    pub fn begin(&mut self) -> Result<(), PersistenceError> {
        self.store.begin()?;
        self.config = self.load_or_default();
        Ok(())
    }

    fn load_or_default(&mut self) -> Config {
        match self.store.read() {
            Ok(config) => {
                info!("loaded persisted config ({} handlers)", config.handlers.len());
                config
            }
            Err(e) => {
                warn!("stored config unusable ({e}), clearing and using defaults");
                if let Err(e) = self.store.clear() {
                    error!("config region clear failed: {e}");
                }
                Config::default()
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_store(self) -> ConfigStore<S> {
        self.store
    }

    /// Lossy wire-format parse; never fails.
    pub fn parse(&self, json: &str) -> Config {
        Config::from_json_lossy(json)
    }

    /// Canonical JSON of the active configuration, as served by the API.
    pub fn serialize(&self) -> String {
        self.config.to_json()
    }

    pub fn keep_network_running(&self) -> bool {
        self.config.keep_web_server_running
    }

    /// Rewire the dispatcher to `config`.  Existing bindings are dropped
    /// first (stopping any blink togglers), then each entry is validated
    /// and registered independently.
    pub fn apply(
        &mut self,
        dispatcher: &mut ChannelDispatcher,
        outputs: &mut dyn OutputFactory,
        config: &Config,
    ) -> ApplyReport {
        dispatcher.cleanup();
        let mut report = ApplyReport::default();

        if config.handlers.is_empty() {
            warn!("applying config with no handlers");
        }
        for (index, entry) in config.handlers.iter().enumerate() {
            match wire_entry(dispatcher, outputs, entry) {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!(
                        "skipping handler {index} ({} on '{}'): {e}",
                        entry.kind.as_wire(),
                        entry.pin
                    );
                    report.skipped.push((index, e));
                }
            }
        }

        self.config = config.clone();
        dispatcher.mark_configured();
        info!(
            "config applied: {} wired, {} skipped",
            report.applied,
            report.skipped.len()
        );
        report
    }

    /// Apply and, when the wiring took, persist.
    pub fn apply_and_persist(
        &mut self,
        dispatcher: &mut ChannelDispatcher,
        outputs: &mut dyn OutputFactory,
        config: &Config,
    ) -> (ApplyReport, Result<(), PersistenceError>) {
        let report = self.apply(dispatcher, outputs, config);
        let persisted = self.store.write(&self.config);
        if let Err(e) = &persisted {
            error!("config persist failed: {e}");
        }
        (report, persisted)
    }
}

/// Validate and register one entry.  Validation order: handler type, pin
/// resolution (including PWM capability), channel, failsafe, PWM range.
fn wire_entry(
    dispatcher: &mut ChannelDispatcher,
    outputs: &mut dyn OutputFactory,
    entry: &HandlerConfig,
) -> Result<(), Error> {
    if entry.kind == HandlerKind::Unknown {
        return Err(ConfigValidationError::UnknownHandlerType.into());
    }

    let pin_info = pins::resolve(entry.pin.as_str()).ok_or(ConfigValidationError::InvalidPin)?;
    if entry.kind == HandlerKind::Pwm && !pin_info.is_pwm {
        return Err(ConfigValidationError::InvalidPin.into());
    }

    if !(1..=CHANNEL_COUNT as u8).contains(&entry.channel) {
        return Err(ConfigValidationError::InvalidChannel(entry.channel).into());
    }

    if let Some(failsafe) = entry.failsafe {
        if !(CHANNEL_MIN..=CHANNEL_MAX).contains(&failsafe) {
            return Err(ConfigValidationError::OutOfRangeFailsafe(failsafe).into());
        }
    }

    let predicate = Predicate {
        threshold: entry.threshold,
        operator: entry.operator,
    };

    match entry.kind {
        HandlerKind::Pwm => {
            if entry.min >= entry.max {
                return Err(ConfigValidationError::InvalidPwmRange {
                    min: entry.min,
                    max: entry.max,
                }
                .into());
            }
            let pin = outputs.pwm(pin_info.pin)?;
            let mut handler = PwmHandler::new(pin, entry.min, entry.max);
            handler.set_inverted(entry.inverted);
            handler.setup(entry.failsafe.unwrap_or(CHANNEL_MID));
            dispatcher.register(entry.channel, Box::new(handler), entry.failsafe)?;
        }
        HandlerKind::OnOff => {
            let pin = outputs.digital(pin_info.pin)?;
            let handler = OnOffHandler::new(pin, predicate);
            dispatcher.register(entry.channel, Box::new(handler), entry.failsafe)?;
        }
        HandlerKind::Blink => {
            let pin = outputs.digital(pin_info.pin)?;
            let handler = BlinkHandler::new(pin, predicate, entry.on_time, entry.off_time);
            dispatcher.register(entry.channel, Box::new(handler), entry.failsafe)?;
        }
        HandlerKind::Unknown => unreachable!("rejected above"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::eeprom::EepromRegion;
    use crate::adapters::outputs::SimOutputs;
    use crate::config::bounded;

    fn manager() -> ConfigManager<EepromRegion> {
        let mut m = ConfigManager::new(ConfigStore::new(EepromRegion::new()));
        m.begin().unwrap();
        m
    }

    #[test]
    fn blank_store_boots_with_defaults() {
        let m = manager();
        assert_eq!(m.config(), &Config::default());
    }

    #[test]
    fn factory_profile_applies_cleanly() {
        let mut m = manager();
        let mut dispatcher = ChannelDispatcher::new();
        let mut outputs = SimOutputs::new();
        let report = m.apply(&mut dispatcher, &mut outputs, &Config::factory());
        assert!(report.fully_applied(), "skipped: {:?}", report.skipped);
        assert_eq!(report.applied, Config::factory().handlers.len());
        // Steering channel carries the servo plus both blinkers.
        assert_eq!(dispatcher.binding_count(1), 3);
    }

    #[test]
    fn apply_is_partial_failure_tolerant() {
        let mut m = manager();
        let mut dispatcher = ChannelDispatcher::new();
        let mut outputs = SimOutputs::new();
        let json = r#"{"handlers":[
            {"type":"onoff","pin":"HEADLIGHT","channel":3,"failsafe":1000},
            {"type":"onoff","pin":"NOT_A_PIN","channel":3},
            {"type":"onoff","pin":"HEADLIGHT","channel":42},
            {"type":"onoff","pin":"HEADLIGHT","channel":3,"failsafe":2500},
            {"type":"pwm","pin":"STEERING","channel":1,"min":200,"max":100},
            {"type":"warp","pin":"STEERING","channel":1},
            {"type":"blink","pin":"BLINKER_LEFT","channel":1,"failsafe":1000}
        ]}"#;
        let config = m.parse(json);
        let report = m.apply(&mut dispatcher, &mut outputs, &config);
        assert_eq!(report.applied, 2);
        let reasons: Vec<Error> = report.skipped.iter().map(|(_, e)| *e).collect();
        assert_eq!(
            reasons,
            vec![
                ConfigValidationError::InvalidPin.into(),
                ConfigValidationError::InvalidChannel(42).into(),
                ConfigValidationError::OutOfRangeFailsafe(2500).into(),
                ConfigValidationError::InvalidPwmRange { min: 200, max: 100 }.into(),
                ConfigValidationError::UnknownHandlerType.into(),
            ]
        );
    }

    #[test]
    fn reapply_replaces_previous_bindings() {
        let mut m = manager();
        let mut dispatcher = ChannelDispatcher::new();
        let mut outputs = SimOutputs::new();
        m.apply(&mut dispatcher, &mut outputs, &Config::factory());
        let one = m.parse(r#"{"handlers":[{"type":"onoff","pin":"HEADLIGHT","channel":3,"failsafe":1000}]}"#);
        m.apply(&mut dispatcher, &mut outputs, &one);
        assert_eq!(dispatcher.binding_count(1), 0);
        assert_eq!(dispatcher.binding_count(3), 1);
    }

    #[test]
    fn apply_and_persist_round_trips_through_the_store() {
        let mut m = manager();
        let mut dispatcher = ChannelDispatcher::new();
        let mut outputs = SimOutputs::new();
        let config = Config::factory();
        let (report, persisted) = m.apply_and_persist(&mut dispatcher, &mut outputs, &config);
        assert!(report.fully_applied());
        persisted.unwrap();

        // A second manager over the same region sees the config.
        let region = m.store;
        let mut m2 = ConfigManager::new(region);
        m2.begin().unwrap();
        assert_eq!(m2.config(), &config);
    }

    #[test]
    fn pwm_entry_seeds_output_at_failsafe() {
        let mut m = manager();
        let mut dispatcher = ChannelDispatcher::new();
        let mut outputs = SimOutputs::new();
        let mut config = Config::default();
        config
            .handlers
            .push(HandlerConfig {
                kind: HandlerKind::Pwm,
                pin: bounded("THROTTLE"),
                channel: 2,
                failsafe: Some(1500),
                min: 0,
                max: 180,
                ..HandlerConfig::default()
            })
            .unwrap();
        m.apply(&mut dispatcher, &mut outputs, &config);
        assert_eq!(outputs.last_pwm(5), Some(90));
    }

    #[test]
    fn serialize_reflects_the_applied_config() {
        let mut m = manager();
        let mut dispatcher = ChannelDispatcher::new();
        let mut outputs = SimOutputs::new();
        let config = Config::factory();
        m.apply(&mut dispatcher, &mut outputs, &config);
        assert_eq!(m.parse(&m.serialize()), config);
    }
}
