//! Bus session: discovery, command surface and move verification.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use elliptec_protocol::{
    units, BusAddress, Command, DeviceInfo, DeviceStatus, HomeDirection, MotorDirection,
    MotorInfo, CurvePoint, ProtocolError, Response,
};

use crate::error::BusError;
use crate::motion::{within_tolerance, MoveOutcome, MAX_MOVE_ATTEMPTS};
use crate::registry::DeviceRegistry;
use crate::transport::{TimeoutOverride, Transport, DEFAULT_BUS_TIMEOUT, DISCOVERY_TIMEOUT};

/// Session options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Motor ids expected on the bus, each 0-15. Sorted and deduplicated
    /// before discovery.
    pub motor_ids: Vec<u8>,
    /// Home every discovered device during discovery.
    pub home_on_open: bool,
    /// Run the resonant frequency search during discovery, saving user data
    /// on success.
    pub frequency_search_on_open: bool,
    /// Per-request deadline for normal operations.
    pub bus_timeout: Duration,
    /// Deadline while the initial bulk discovery runs.
    pub discovery_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            motor_ids: vec![0],
            home_on_open: true,
            frequency_search_on_open: true,
            bus_timeout: DEFAULT_BUS_TIMEOUT,
            discovery_timeout: DISCOVERY_TIMEOUT,
        }
    }
}

/// An exclusive session over one physical bus.
///
/// Owns the transport and the device registry; both live exactly as long as
/// the session. One request/response pair is in flight at a time.
pub struct BusSession<T: Transport> {
    transport: T,
    config: SessionConfig,
    registry: DeviceRegistry,
    addresses: Vec<BusAddress>,
}

impl<T: Transport> BusSession<T> {
    /// Open a session and run the discovery bootstrap.
    ///
    /// For each configured motor id: query the identity record, optionally
    /// run the frequency search, optionally home, then query the position.
    /// Ids that stay silent are skipped with a warning; they may simply be
    /// absent from the bus.
    pub fn open(transport: T, config: SessionConfig) -> Result<Self, BusError> {
        if !transport.is_open() {
            return Err(BusError::NotOpen);
        }

        let mut addresses = Vec::with_capacity(config.motor_ids.len());
        for &id in &config.motor_ids {
            addresses.push(BusAddress::new(id)?);
        }
        addresses.sort();
        addresses.dedup();

        let mut session = BusSession {
            transport,
            config,
            registry: DeviceRegistry::new(),
            addresses,
        };

        // Discovery gets a generous deadline; restore the normal one on
        // every path out.
        session
            .transport
            .set_timeout(Some(session.config.discovery_timeout));
        let result = session.discover();
        session
            .transport
            .set_timeout(Some(session.config.bus_timeout));
        result?;

        info!(devices = session.registry.len(), "bus session open");
        Ok(session)
    }

    fn discover(&mut self) -> Result<(), BusError> {
        for address in self.addresses.clone() {
            let info = match self.get_info(address) {
                Ok(info) => info,
                Err(BusError::CommTimeout) => {
                    warn!(%address, "no device answered during discovery");
                    continue;
                }
                Err(e) => return Err(e),
            };
            debug!(%info, "discovered");

            if self.config.frequency_search_on_open {
                self.search_frequency(address)?;
            }
            if self.config.home_on_open {
                self.home(address, HomeDirection::default())?;
            }
            if info.is_linrot() {
                self.get_position(address)?;
            }
        }
        Ok(())
    }

    /// The configured motor addresses, sorted and deduplicated.
    pub fn addresses(&self) -> &[BusAddress] {
        &self.addresses
    }

    /// The device registry built during discovery.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// The session options.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Shared access to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Exclusive access to the transport, e.g. to feed a scripted mock.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Whether the transport is open.
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Close the transport. The registry is dropped with the session.
    pub fn close(&mut self) {
        self.transport.close();
    }

    // ------------------------------------------------------------------
    // Identity and status
    // ------------------------------------------------------------------

    /// Query the identity record and register the device.
    pub fn get_info(&mut self, address: BusAddress) -> Result<DeviceInfo, BusError> {
        match self.transact(address, &Command::GetInfo)? {
            Response::Info(info) => Ok(info),
            other => Err(unexpected("identity", &other)),
        }
    }

    /// Query the status code. Non-OK statuses are returned, not errors:
    /// polling for busy/ready is a normal thing to do.
    pub fn get_status(&mut self, address: BusAddress) -> Result<DeviceStatus, BusError> {
        self.send(address, &Command::GetStatus)?;
        let line = self.transport.read_frame()?;
        match Response::parse(&line)? {
            Response::Status { status, .. } => Ok(status),
            other => Err(unexpected("status", &other)),
        }
    }

    /// Persist user settings (address, frequencies) to device flash.
    pub fn save_user_data(&mut self, address: BusAddress) -> Result<(), BusError> {
        let reply = self.transact(address, &Command::SaveUserData)?;
        expect_ok_status(&reply)
    }

    /// Change a device's bus address, then persist and re-index it.
    ///
    /// Fails with [`BusError::AddressInUse`] before touching the wire if the
    /// target address is already assigned.
    pub fn change_address(
        &mut self,
        address: BusAddress,
        new_address: BusAddress,
    ) -> Result<(), BusError> {
        if self.registry.contains_address(new_address) {
            return Err(BusError::AddressInUse(new_address));
        }
        if !self.registry.contains_address(address) {
            return Err(BusError::DeviceNotFound(address));
        }

        let reply = self.transact(address, &Command::ChangeAddress { new_address })?;
        expect_ok_status(&reply)?;
        self.save_user_data(new_address)?;

        self.registry.rename(address, new_address)?;
        for a in &mut self.addresses {
            if *a == address {
                *a = new_address;
            }
        }
        info!(%address, %new_address, "device readdressed");
        Ok(())
    }

    /// Assign the device to a group address.
    pub fn set_group_address(
        &mut self,
        address: BusAddress,
        group: BusAddress,
    ) -> Result<(), BusError> {
        let reply = self.transact(address, &Command::SetGroupAddress { group })?;
        expect_ok_status(&reply)
    }

    /// Take the device off the bus for a number of minutes. No reply.
    pub fn isolate(&mut self, address: BusAddress, minutes: u8) -> Result<(), BusError> {
        self.send(address, &Command::Isolate { minutes })
    }

    // ------------------------------------------------------------------
    // Motor maintenance
    // ------------------------------------------------------------------

    /// Query drive parameters of one motor.
    pub fn get_motor_info(&mut self, address: BusAddress, motor: u8) -> Result<MotorInfo, BusError> {
        match self.transact(address, &Command::GetMotorInfo { motor })? {
            Response::MotorInfo(info) => Ok(info),
            other => Err(unexpected("motor info", &other)),
        }
    }

    /// Set the drive frequency of one motor.
    pub fn set_motor_frequency(
        &mut self,
        address: BusAddress,
        motor: u8,
        direction: MotorDirection,
        frequency_khz: u16,
        factory_reset: bool,
    ) -> Result<(), BusError> {
        let cmd = Command::SetMotorFrequency {
            motor,
            direction,
            frequency_khz,
            factory_reset,
        };
        let reply = self.transact(address, &cmd)?;
        expect_ok_status(&reply)
    }

    /// Run the resonant frequency search for one motor, saving user data on
    /// success.
    pub fn search_motor_frequency(&mut self, address: BusAddress, motor: u8) -> Result<(), BusError> {
        let reply = self.transact(address, &Command::SearchMotorFrequency { motor })?;
        expect_ok_status(&reply)?;
        self.save_user_data(address)
    }

    /// Run the frequency search on every motor the device class has:
    /// motor 1 for indexed stages, motors 1 and 2 for rotary/linear ones.
    pub fn search_frequency(&mut self, address: BusAddress) -> Result<(), BusError> {
        let info = self.device_info(address)?;
        let motors: &[u8] = if info.is_indexed() {
            &[1]
        } else if info.is_linrot() {
            &[1, 2]
        } else {
            debug!(%address, "device class has no searchable motors");
            &[]
        };
        for &motor in motors {
            self.search_motor_frequency(address, motor)?;
        }
        Ok(())
    }

    /// Scan the motor current curve. The dump is fetched separately with
    /// [`BusSession::get_current_curve`].
    pub fn scan_current_curve(&mut self, address: BusAddress, motor: u8) -> Result<(), BusError> {
        let reply = self.transact(address, &Command::ScanCurrentCurve { motor })?;
        expect_ok_status(&reply)
    }

    /// Fetch the last scanned current curve: 87 (period, current) points.
    pub fn get_current_curve(
        &mut self,
        address: BusAddress,
        motor: u8,
    ) -> Result<Vec<CurvePoint>, BusError> {
        match self.transact(address, &Command::GetCurrentCurve { motor })? {
            Response::CurrentCurve { points, .. } => Ok(points),
            other => Err(unexpected("current curve", &other)),
        }
    }

    /// Run the motor optimization routine. The duration is device-internal,
    /// so the read deadline is disabled for the wait and restored after.
    pub fn optimize_motors(&mut self, address: BusAddress) -> Result<(), BusError> {
        self.unbounded_routine(address, &Command::OptimizeMotors)
    }

    /// Run the mechanics cleaning routine under a disabled read deadline.
    pub fn clean_mechanics(&mut self, address: BusAddress) -> Result<(), BusError> {
        self.unbounded_routine(address, &Command::CleanMechanics)
    }

    /// Stop a running optimize/clean routine.
    pub fn stop_clean(&mut self, address: BusAddress) -> Result<(), BusError> {
        let reply = self.transact(address, &Command::StopClean)?;
        expect_ok_status(&reply)
    }

    fn unbounded_routine(&mut self, address: BusAddress, cmd: &Command) -> Result<(), BusError> {
        self.send(address, cmd)?;
        let line = {
            let mut guard = TimeoutOverride::new(&mut self.transport, None);
            guard.read_frame()?
        };
        let reply = self.decode_reply(&line)?;
        expect_ok_status(&reply)
    }

    // ------------------------------------------------------------------
    // Motion
    // ------------------------------------------------------------------

    /// Home the stage and update the position cache if a position comes back.
    pub fn home(&mut self, address: BusAddress, direction: HomeDirection) -> Result<(), BusError> {
        let reply = self.transact(address, &Command::Home { direction })?;
        match reply {
            Response::Position { .. } | Response::PaddlePosition { .. } | Response::Status { .. } => {
                Ok(())
            }
            other => Err(unexpected("position or status", &other)),
        }
    }

    /// Home a single paddle.
    pub fn paddle_home(&mut self, address: BusAddress, paddle: u8) -> Result<(), BusError> {
        self.require_class(address, DeviceInfo::is_paddle, "paddle homing")?;
        let reply = self.transact(address, &Command::PaddleHome { paddle })?;
        match reply {
            Response::Position { .. } | Response::PaddlePosition { .. } | Response::Status { .. } => {
                Ok(())
            }
            other => Err(unexpected("position or status", &other)),
        }
    }

    /// Move to an absolute physical position (degrees for rotary stages,
    /// millimeters for linear ones) and verify the landing.
    ///
    /// Retries up to [`MAX_MOVE_ATTEMPTS`] times when the reported position
    /// misses the tolerance; running out of retries is reported through
    /// [`MoveOutcome::converged`], not as an error.
    pub fn move_absolute(&mut self, address: BusAddress, target: f64) -> Result<MoveOutcome, BusError> {
        let info = self.device_info(address)?;
        let steps = units::position_to_steps(&info, target)?;
        self.verified_move(&info, Command::MoveAbsolute { steps }, target, target)
    }

    /// Move by a relative physical delta and verify the landing against the
    /// device's last known position (queried beforehand).
    pub fn move_relative(&mut self, address: BusAddress, delta: f64) -> Result<MoveOutcome, BusError> {
        let info = self.device_info(address)?;
        let steps = units::position_to_steps(&info, delta)?;
        let prior = self.get_position(address)?;
        self.verified_move(&info, Command::MoveRelative { steps }, delta, prior + delta)
    }

    fn verified_move(
        &mut self,
        info: &DeviceInfo,
        cmd: Command,
        target: f64,
        expected: f64,
    ) -> Result<MoveOutcome, BusError> {
        let mut reached = None;
        let mut attempts = 0;
        for attempt in 1..=MAX_MOVE_ATTEMPTS {
            attempts = attempt;
            match self.transact(info.address, &cmd)? {
                Response::Position { steps, .. } => {
                    let position = units::steps_to_position(info, steps)?;
                    self.registry.record_position(info.address, position);
                    reached = Some(position);
                    if within_tolerance(info, expected, position)? {
                        debug!(address = %info.address, attempt, position, "move converged");
                        return Ok(MoveOutcome {
                            converged: true,
                            attempts,
                            target,
                            reached,
                        });
                    }
                    warn!(
                        address = %info.address,
                        attempt,
                        expected,
                        position,
                        "move missed tolerance, reissuing"
                    );
                }
                other => {
                    warn!(address = %info.address, attempt, reply = ?other, "move answered without a position");
                }
            }
        }
        warn!(address = %info.address, attempts, "move did not converge");
        Ok(MoveOutcome {
            converged: false,
            attempts,
            target,
            reached,
        })
    }

    /// Jog forward.
    pub fn move_forward(&mut self, address: BusAddress) -> Result<(), BusError> {
        let reply = self.transact(address, &Command::MoveForward)?;
        expect_motion_ack(&reply)
    }

    /// Jog backward.
    pub fn move_backward(&mut self, address: BusAddress) -> Result<(), BusError> {
        let reply = self.transact(address, &Command::MoveBackward)?;
        expect_motion_ack(&reply)
    }

    /// Stop any motion.
    pub fn stop(&mut self, address: BusAddress) -> Result<(), BusError> {
        let reply = self.transact(address, &Command::Stop)?;
        expect_motion_ack(&reply)
    }

    /// Query the position in the device's physical unit and update the
    /// position cache.
    pub fn get_position(&mut self, address: BusAddress) -> Result<f64, BusError> {
        let info = self.device_info(address)?;
        match self.transact(address, &Command::GetPosition)? {
            Response::Position { steps, .. } => {
                let position = units::steps_to_position(&info, steps)?;
                self.registry.record_position(address, position);
                Ok(position)
            }
            other => Err(unexpected("position", &other)),
        }
    }

    /// Query the home offset in physical units.
    pub fn get_home_offset(&mut self, address: BusAddress) -> Result<f64, BusError> {
        let info = self.require_class(address, DeviceInfo::is_linrot, "home offset")?;
        match self.transact(address, &Command::GetHomeOffset)? {
            Response::HomeOffset { steps, .. } => Ok(units::steps_to_position(&info, steps)?),
            other => Err(unexpected("home offset", &other)),
        }
    }

    /// Set the home offset from a physical value.
    pub fn set_home_offset(&mut self, address: BusAddress, offset: f64) -> Result<(), BusError> {
        let info = self.device_info(address)?;
        let steps = units::position_to_steps(&info, offset)?;
        let reply = self.transact(address, &Command::SetHomeOffset { steps })?;
        expect_ok_status(&reply)
    }

    /// Query the jog step size in physical units.
    pub fn get_jog_step_size(&mut self, address: BusAddress) -> Result<f64, BusError> {
        let info = self.require_class(address, DeviceInfo::is_linrot, "jog step size")?;
        match self.transact(address, &Command::GetJogStepSize)? {
            Response::JogStepSize { steps, .. } => Ok(units::steps_to_position(&info, steps)?),
            other => Err(unexpected("jog step size", &other)),
        }
    }

    /// Set the jog step size from a physical value.
    pub fn set_jog_step_size(&mut self, address: BusAddress, size: f64) -> Result<(), BusError> {
        let info = self.device_info(address)?;
        let steps = units::position_to_steps(&info, size)?;
        let reply = self.transact(address, &Command::SetJogStepSize { steps })?;
        expect_ok_status(&reply)
    }

    /// Query the velocity setting, percent of full drive power.
    pub fn get_velocity(&mut self, address: BusAddress) -> Result<u8, BusError> {
        match self.transact(address, &Command::GetVelocity)? {
            Response::Velocity { percent, .. } => Ok(percent),
            other => Err(unexpected("velocity", &other)),
        }
    }

    /// Set the velocity, at most 100 percent. Rejected before any write when
    /// out of range.
    pub fn set_velocity(&mut self, address: BusAddress, percent: u8) -> Result<(), BusError> {
        let reply = self.transact(address, &Command::SetVelocity { percent })?;
        expect_ok_status(&reply)
    }

    // ------------------------------------------------------------------
    // Paddles
    // ------------------------------------------------------------------

    /// Drive one paddle for a time. Returns the reported paddle angle.
    pub fn paddle_drive_time(
        &mut self,
        address: BusAddress,
        paddle: u8,
        milliseconds: u16,
        direction: MotorDirection,
    ) -> Result<f64, BusError> {
        self.require_class(address, DeviceInfo::is_paddle, "paddle drive time")?;
        let cmd = Command::PaddleDriveTime {
            paddle,
            milliseconds,
            direction,
        };
        self.paddle_transaction(address, &cmd)
    }

    /// Move one paddle to an absolute angle in degrees.
    pub fn paddle_move_absolute(
        &mut self,
        address: BusAddress,
        paddle: u8,
        degrees: f64,
    ) -> Result<f64, BusError> {
        self.require_class(address, DeviceInfo::is_paddle, "paddle absolute move")?;
        let steps = units::paddle_degrees_to_steps(degrees);
        self.paddle_transaction(address, &Command::PaddleMoveAbsolute { paddle, steps })
    }

    /// Move one paddle by a relative angle in degrees.
    pub fn paddle_move_relative(
        &mut self,
        address: BusAddress,
        paddle: u8,
        degrees: f64,
    ) -> Result<f64, BusError> {
        self.require_class(address, DeviceInfo::is_paddle, "paddle relative move")?;
        let steps = units::paddle_degrees_to_steps(degrees);
        self.paddle_transaction(address, &Command::PaddleMoveRelative { paddle, steps })
    }

    fn paddle_transaction(&mut self, address: BusAddress, cmd: &Command) -> Result<f64, BusError> {
        match self.transact(address, cmd)? {
            Response::PaddlePosition { steps, .. } => Ok(units::paddle_steps_to_degrees(steps)),
            other => Err(unexpected("paddle position", &other)),
        }
    }

    // ------------------------------------------------------------------
    // Piezo (ELL5)
    // ------------------------------------------------------------------

    /// Energize the piezo at a drive frequency in Hz.
    pub fn energize(&mut self, address: BusAddress, frequency_hz: f64) -> Result<(), BusError> {
        self.require_class(address, DeviceInfo::is_piezo, "energize")?;
        let reply = self.transact(address, &Command::Energize { frequency_hz })?;
        expect_ok_status(&reply)
    }

    /// Halt the piezo.
    pub fn halt(&mut self, address: BusAddress) -> Result<(), BusError> {
        self.require_class(address, DeviceInfo::is_piezo, "halt")?;
        let reply = self.transact(address, &Command::Halt)?;
        expect_ok_status(&reply)
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn device_info(&self, address: BusAddress) -> Result<DeviceInfo, BusError> {
        self.registry
            .lookup(address)
            .map(|r| r.info.clone())
            .ok_or(BusError::DeviceNotFound(address))
    }

    fn require_class(
        &self,
        address: BusAddress,
        predicate: fn(&DeviceInfo) -> bool,
        what: &str,
    ) -> Result<DeviceInfo, BusError> {
        let info = self.device_info(address)?;
        if !predicate(&info) {
            return Err(BusError::Protocol(ProtocolError::UnsupportedOperation(
                format!("device type {} does not support {what}", info.device_type),
            )));
        }
        Ok(info)
    }

    fn send(&mut self, address: BusAddress, cmd: &Command) -> Result<(), BusError> {
        let frame = cmd.encode(address)?;
        debug!(%frame, "send");
        self.transport.write_frame(&frame)
    }

    /// One full request/response round trip. Non-OK status replies become
    /// [`BusError::Device`]; everything else is returned after registry
    /// bookkeeping.
    fn transact(&mut self, address: BusAddress, cmd: &Command) -> Result<Response, BusError> {
        self.send(address, cmd)?;
        let line = self.transport.read_frame()?;
        self.decode_reply(&line)
    }

    fn decode_reply(&mut self, line: &str) -> Result<Response, BusError> {
        let reply = Response::parse(line)?;
        debug!(?reply, "reply");
        self.apply(&reply);
        if let Response::Status { address, status } = reply {
            if !status.is_ok() {
                return Err(BusError::Device { address, status });
            }
        }
        Ok(reply)
    }

    /// Opportunistic bookkeeping on every decoded reply: identity records
    /// feed the registry, position replies refresh the per-device cache.
    fn apply(&mut self, reply: &Response) {
        match reply {
            Response::Info(info) => {
                self.registry.upsert(info.clone());
            }
            Response::Position { address, steps } => {
                let info = self.registry.lookup(*address).map(|r| r.info.clone());
                if let Some(info) = info {
                    if let Ok(position) = units::steps_to_position(&info, *steps) {
                        self.registry.record_position(*address, position);
                    }
                }
            }
            _ => {}
        }
    }
}

impl<T: Transport> Drop for BusSession<T> {
    fn drop(&mut self) {
        self.transport.close();
    }
}

fn expect_ok_status(reply: &Response) -> Result<(), BusError> {
    match reply {
        // Non-OK statuses were already turned into errors by decode_reply.
        Response::Status { .. } => Ok(()),
        other => Err(unexpected("status", other)),
    }
}

/// Jog and stop commands answer with a position or, while moving, a status.
fn expect_motion_ack(reply: &Response) -> Result<(), BusError> {
    match reply {
        Response::Position { .. } | Response::Status { .. } => Ok(()),
        other => Err(unexpected("position or status", other)),
    }
}

fn unexpected(expected: &'static str, got: &Response) -> BusError {
    BusError::UnexpectedReply {
        expected,
        got: format!("{got:?}"),
    }
}
