//! Unit assembly.
//!
//! Wires recovered configuration, shared state, actuator, command authority
//! and cycle runner together over a set of hardware backends.

use std::sync::Arc;

use brake_common::clock::Clock;
use brake_common::hal::driver::{
    NvStorage, PwmOutput, RetainedMemory, StatusSink, TelemetrySource,
};
use tracing::info;

use crate::command::authority::CommandAuthority;
use crate::command::terminal::Terminal;
use crate::config::UnitConfig;
use crate::control::output::Actuator;
use crate::cycle::CycleRunner;
use crate::error::CycleError;
use crate::persist::recovery::RecoveryReport;
use crate::persist::store::PersistedState;
use crate::state::{ControllerState, LiveConfig};

/// Hardware backends the unit runs on.
#[derive(Clone)]
pub struct Backends {
    pub telemetry: Arc<dyn TelemetrySource>,
    pub pwm: Arc<dyn PwmOutput>,
    pub clock: Arc<dyn Clock>,
    pub retained: Arc<dyn RetainedMemory>,
    pub nv: Arc<dyn NvStorage>,
    /// Destination of periodic status lines.
    pub sink: Arc<dyn StatusSink>,
}

/// A fully wired controller.
pub struct ControlUnit {
    pub runner: CycleRunner,
    pub authority: Arc<CommandAuthority>,
    pub persisted: Arc<PersistedState>,
    pub live: Arc<LiveConfig>,
    pub state: Arc<ControllerState>,
    pub recovery: RecoveryReport,
    telemetry: Arc<dyn TelemetrySource>,
    sensor_count: usize,
}

impl ControlUnit {
    /// Recover persisted state, program the timer and build the control task.
    ///
    /// # Errors
    /// `CycleError::Hal` when the output stage rejects its timing.
    pub fn assemble(config: &UnitConfig, backends: Backends) -> Result<Self, CycleError> {
        let Backends {
            telemetry,
            pwm,
            clock,
            retained,
            nv,
            sink,
        } = backends;

        let (persisted, recovery) =
            PersistedState::open(retained, nv, &config.defaults, &config.hardware);
        let persisted = Arc::new(persisted);
        let live = Arc::new(LiveConfig::new(&persisted.config()));

        let state = Arc::new(ControllerState::new(clock.now_us()));
        let actuator = Actuator::new(pwm, clock, state.clone(), &config.hardware)?;

        let authority = Arc::new(CommandAuthority::new(
            actuator.clone(),
            live.clone(),
            persisted.clone(),
            config.hardware.clone(),
        ));
        let runner = CycleRunner::new(config, telemetry.clone(), actuator, live.clone(), sink);

        info!(
            controller_id = live.load().controller_id,
            recovered_clean = recovery.clean(),
            "control unit assembled"
        );

        Ok(Self {
            runner,
            authority,
            persisted,
            live,
            state,
            recovery,
            telemetry,
            sensor_count: config.hardware.temp_sensor_count,
        })
    }

    /// Terminal replying through `sink`.
    pub fn terminal(&self, sink: Arc<dyn StatusSink>) -> Terminal {
        Terminal::new(
            self.authority.clone(),
            self.telemetry.clone(),
            sink,
            self.sensor_count,
        )
    }
}
