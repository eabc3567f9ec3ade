//! Dimmer device state engine.
//!
//! Translates intents (on, off, level, scene, refresh) into direct commands
//! and translates acks, broadcasts, and cleanups into state changes. Every
//! state change is published on the dimmer's [`Signal`].
//!
//! ## Intent Encoding
//!
//! | Mode    | On                        | Off                |
//! |---------|---------------------------|--------------------|
//! | normal  | 0x11, cmd2 = level        | 0x13, cmd2 = 0     |
//! | fast    | 0x12, cmd2 = level        | 0x14, cmd2 = 0     |
//! | instant | 0x21, cmd2 = level        | 0x21, cmd2 = 0     |
//! | ramp    | 0x2E, cmd2 = bucket, rate | 0x2F, cmd2 = rate  |
//!
//! An "on" without a level uses the configured on-level, or full brightness
//! if the dimmer is already at the on-level. Fast-on without a level is
//! always full brightness.

use insteon_message::{
    Address, Message, MessageType, CMD_EXTENDED_SET, CMD_INSTANT_CHANGE, CMD_LINK_CLEANUP_REPORT,
    CMD_OFF, CMD_OFF_AT_RAMP_RATE, CMD_OFF_FAST, CMD_ON, CMD_ON_AT_RAMP_RATE, CMD_ON_FAST,
    CMD_START_MANUAL_CHANGE, CMD_STATUS_REQUEST, CMD_STOP_MANUAL_CHANGE, CMD_TRIGGER_SCENE,
    EXT_DATA_SIZE, EXT_SET_ON_LEVEL, LEVEL_FULL, LEVEL_OFF,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::dispatch::AckMatcher;
use crate::link_db::{LinkDatabase, MemoryLinkDb};
use crate::modem::Modem;
use crate::on_off::{Manual, Mode};
use crate::protocol::{AckAction, OnDone, Pending, Protocol};
use crate::ramp::{self, DEFAULT_TRANSITION};
use crate::sequence::{CommandSeq, Completion};
use crate::signal::Signal;

/// Reason attached to state changes reported by the device itself.
pub const REASON_DEVICE: &str = "device";

/// Group a dimmer broadcasts on when its paddle is used.
pub const DEFAULT_GROUP: u8 = 0x01;

/// Per-device configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DimmerSettings {
    /// Device accepts the on/off-at-ramp-rate commands.
    pub on_off_ramp_supported: bool,
    /// Level used by a plain "on".
    pub on_level: u8,
}

impl Default for DimmerSettings {
    fn default() -> Self {
        DimmerSettings {
            on_off_ramp_supported: false,
            on_level: LEVEL_FULL,
        }
    }
}

/// Mode selection for an on/off intent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModeRequest {
    /// Explicit mode; wins over the flags.
    pub mode: Option<Mode>,
    /// Legacy fast flag.
    pub fast: Option<bool>,
    /// Legacy instant flag.
    pub instant: Option<bool>,
    /// Transition time in seconds.
    pub transition: Option<f64>,
}

impl ModeRequest {
    /// Request a specific mode.
    pub fn with_mode(mode: Mode) -> Self {
        ModeRequest {
            mode: Some(mode),
            ..Default::default()
        }
    }

    /// Add a transition time.
    pub fn transition(mut self, seconds: f64) -> Self {
        self.transition = Some(seconds);
        self
    }

    /// Mode before the device's ramp capability is considered.
    pub fn effective_mode(&self) -> Mode {
        Mode::resolve(self.mode, self.fast, self.instant)
    }
}

/// State change published by a dimmer.
#[derive(Debug, Clone, PartialEq)]
pub enum DimmerEvent {
    /// Level (and the mode used to reach it) changed.
    LevelChanged {
        /// Device address.
        device: Address,
        /// New level, 0-255.
        level: u8,
        /// How the change was applied.
        mode: Mode,
        /// Why the change happened.
        reason: String,
    },
    /// A manual level change started or stopped.
    Manual {
        /// Device address.
        device: Address,
        /// Direction.
        manual: Manual,
        /// Why the change happened.
        reason: String,
    },
}

/// Wire encoding chosen for an on/off intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimmerCommand {
    /// Command byte.
    pub cmd1: u8,
    /// Level or ramp byte.
    pub cmd2: u8,
    /// Mode actually used.
    pub mode: Mode,
}

/// Level and mode implied by an acked level command.
pub fn level_from_ack(cmd1: u8, cmd2: u8) -> Option<(u8, Mode)> {
    match cmd1 {
        CMD_ON => Some((cmd2, Mode::Normal)),
        CMD_ON_FAST => Some((cmd2, Mode::Fast)),
        CMD_OFF => Some((LEVEL_OFF, Mode::Normal)),
        CMD_OFF_FAST => Some((LEVEL_OFF, Mode::Fast)),
        CMD_INSTANT_CHANGE => Some((cmd2, Mode::Instant)),
        CMD_ON_AT_RAMP_RATE => Some((ramp::bucket_level(cmd2 >> 4), Mode::Ramp)),
        CMD_OFF_AT_RAMP_RATE => Some((LEVEL_OFF, Mode::Ramp)),
        _ => None,
    }
}

/// A dimmable light switch or module.
#[derive(Debug)]
pub struct Dimmer {
    address: Address,
    name: String,
    settings: DimmerSettings,
    level: Option<u8>,
    mode: Mode,
    manual: Option<Manual>,
    last_broadcast: Option<(u8, u8)>,
    link_db: Box<dyn LinkDatabase>,
    signal: Signal<DimmerEvent>,
}

impl Dimmer {
    /// Create a dimmer with an empty in-memory link database.
    pub fn new(address: Address, name: impl Into<String>, settings: DimmerSettings) -> Self {
        Dimmer {
            address,
            name: name.into(),
            settings,
            level: None,
            mode: Mode::Normal,
            manual: None,
            last_broadcast: None,
            link_db: Box::new(MemoryLinkDb::new()),
            signal: Signal::new(),
        }
    }

    /// Replace the link database.
    pub fn with_link_db(mut self, link_db: Box<dyn LinkDatabase>) -> Self {
        self.link_db = link_db;
        self
    }

    /// Device address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured settings.
    pub fn settings(&self) -> &DimmerSettings {
        &self.settings
    }

    /// Last known level, if any has been observed.
    pub fn level(&self) -> Option<u8> {
        self.level
    }

    /// Mode of the last level change.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Last manual-change state.
    pub fn manual(&self) -> Option<Manual> {
        self.manual
    }

    /// Default level for a plain "on".
    pub fn on_level(&self) -> u8 {
        self.settings.on_level
    }

    /// The device's all-link database.
    pub fn link_db(&self) -> &dyn LinkDatabase {
        self.link_db.as_ref()
    }

    /// Mutable access to the all-link database.
    pub fn link_db_mut(&mut self) -> &mut dyn LinkDatabase {
        self.link_db.as_mut()
    }

    /// Signal carrying this dimmer's state changes.
    pub fn signal_mut(&mut self) -> &mut Signal<DimmerEvent> {
        &mut self.signal
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Choose the wire encoding for an on/off intent.
    pub fn on_off_command(&self, is_on: bool, level: Option<u8>, req: &ModeRequest) -> DimmerCommand {
        let mut mode = req.effective_mode();
        if mode == Mode::Normal && req.transition.is_some() {
            mode = Mode::Ramp;
        }
        if mode == Mode::Ramp && !self.settings.on_off_ramp_supported {
            debug!("[{}] ramp not supported, using normal on/off", self.address);
            mode = Mode::Normal;
        }

        let level = match (is_on, level) {
            (false, _) => LEVEL_OFF,
            (true, Some(level)) => level,
            (true, None) if mode == Mode::Fast => LEVEL_FULL,
            (true, None) => self.default_on_target(),
        };
        let transition = req.transition.unwrap_or(DEFAULT_TRANSITION);

        let (cmd1, cmd2) = match (mode, is_on) {
            (Mode::Normal, true) => (CMD_ON, level),
            (Mode::Normal, false) => (CMD_OFF, LEVEL_OFF),
            (Mode::Fast, true) => (CMD_ON_FAST, level),
            (Mode::Fast, false) => (CMD_OFF_FAST, LEVEL_OFF),
            (Mode::Instant, _) => (CMD_INSTANT_CHANGE, level),
            (Mode::Ramp, true) => (CMD_ON_AT_RAMP_RATE, ramp::ramp_on_cmd2(level, transition)),
            (Mode::Ramp, false) => (CMD_OFF_AT_RAMP_RATE, ramp::ramp_off_cmd2(transition)),
        };
        DimmerCommand { cmd1, cmd2, mode }
    }

    /// Turn on, to `level` or the default on-level.
    pub fn turn_on(
        &self,
        proto: &mut Protocol,
        level: Option<u8>,
        req: &ModeRequest,
        reason: &str,
        on_done: Option<OnDone>,
    ) {
        self.set(proto, true, level, req, reason, on_done);
    }

    /// Turn off.
    pub fn turn_off(&self, proto: &mut Protocol, req: &ModeRequest, reason: &str, on_done: Option<OnDone>) {
        self.set(proto, false, None, req, reason, on_done);
    }

    /// Turn on or off.
    pub fn set(
        &self,
        proto: &mut Protocol,
        is_on: bool,
        level: Option<u8>,
        req: &ModeRequest,
        reason: &str,
        on_done: Option<OnDone>,
    ) {
        let cmd = self.on_off_command(is_on, level, req);
        info!(
            "[{}] {} {} mode={} cmd={:#04x}/{:#04x}",
            self.address,
            self.name,
            if is_on { "on" } else { "off" },
            cmd.mode,
            cmd.cmd1,
            cmd.cmd2
        );
        proto.send_standard(
            self.address,
            cmd.cmd1,
            cmd.cmd2,
            AckMatcher::Command,
            self.pending(AckAction::Level, reason, on_done),
        );
    }

    /// Change the default on-level stored in the device.
    pub fn set_on_level(&self, proto: &mut Protocol, level: u8, reason: &str, on_done: Option<OnDone>) {
        info!("[{}] setting on-level to {}", self.address, level);
        let mut data = [0u8; EXT_DATA_SIZE];
        data[0] = 0x01;
        data[1] = EXT_SET_ON_LEVEL;
        data[2] = level;
        proto.send_extended(
            self.address,
            CMD_EXTENDED_SET,
            0x00,
            data,
            self.pending(AckAction::OnLevel(level), reason, on_done),
        );
    }

    /// Trigger one of the device's scenes. The resulting level arrives as a
    /// separate report, not in the ack.
    pub fn scene(
        &self,
        proto: &mut Protocol,
        is_on: bool,
        group: Option<u8>,
        reason: &str,
        on_done: Option<OnDone>,
    ) {
        let group = group.unwrap_or(DEFAULT_GROUP);
        info!("[{}] scene {} group {}", self.address, if is_on { "on" } else { "off" }, group);
        let mut data = [0u8; EXT_DATA_SIZE];
        data[0] = group;
        data[3] = if is_on { CMD_ON } else { CMD_OFF };
        proto.send_extended(
            self.address,
            CMD_TRIGGER_SCENE,
            0x00,
            data,
            self.pending(AckAction::Scene, reason, on_done),
        );
    }

    /// Ask the device for its current level and link-db delta.
    pub fn refresh(&self, proto: &mut Protocol, reason: &str, on_done: Option<OnDone>) {
        debug!("[{}] refresh", self.address);
        proto.send_standard(
            self.address,
            CMD_STATUS_REQUEST,
            0x00,
            // The status reply carries the link-db delta in cmd1.
            AckMatcher::AnyCommand,
            self.pending(AckAction::Refresh, reason, on_done),
        );
    }

    /// Steps that link this dimmer to the modem: refresh the state, then
    /// make the dimmer a controller of group 1 to the modem.
    pub fn pair_sequence(&self) -> CommandSeq<Modem> {
        let device = self.address;
        let mut seq = CommandSeq::new(format!("pair {device}"));
        seq.add("refresh", move |modem: &mut Modem, done: Completion<Modem>| {
            modem.run_step(device, done, |dimmer, proto, done| {
                dimmer.refresh(proto, "", Some(done));
            });
        });
        seq.add("add controller link", move |modem: &mut Modem, done: Completion<Modem>| {
            let remote = modem.address();
            modem.run_step(device, done, move |dimmer, proto, done| {
                let result = dimmer.link_db.add_ctrl_of(remote, DEFAULT_GROUP, [0x00; 3]);
                proto.defer(Some(done), result);
            });
        });
        seq
    }

    fn pending(&self, action: AckAction, reason: &str, on_done: Option<OnDone>) -> Pending {
        Pending {
            device: self.address,
            action,
            reason: reason.to_string(),
            on_done,
        }
    }

    fn default_on_target(&self) -> u8 {
        if self.level == Some(self.settings.on_level) {
            LEVEL_FULL
        } else {
            self.settings.on_level
        }
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    /// Apply an acked command.
    pub fn complete(&mut self, action: AckAction, reason: &str, reply: &Message) {
        match action {
            AckAction::Level => match level_from_ack(reply.cmd1(), reply.cmd2()) {
                Some((level, mode)) => self.update_level(level, mode, reason),
                None => warn!("[{}] ack {} does not carry a level", self.address, reply),
            },
            AckAction::OnLevel(level) => {
                info!("[{}] on-level is now {}", self.address, level);
                self.settings.on_level = level;
            }
            AckAction::Scene => {
                debug!("[{}] scene acked", self.address);
            }
            AckAction::Refresh => {
                debug!("[{}] status level={} delta={}", self.address, reply.cmd2(), reply.cmd1());
                self.update_level(reply.cmd2(), Mode::Normal, reason);
                self.check_link_db(reply.cmd1());
            }
        }
    }

    /// Handle an unsolicited message from this device.
    pub fn handle_inbound(&mut self, proto: &mut Protocol, msg: &Message) {
        if msg.is_ext() {
            debug!("[{}] ignoring extended {}", self.address, msg);
            return;
        }
        match msg.msg_type() {
            MessageType::Broadcast | MessageType::AllLinkBroadcast => self.handle_broadcast(proto, msg),
            MessageType::AllLinkCleanup => self.handle_cleanup(proto, msg),
            MessageType::Direct => self.handle_direct(msg),
            _ => debug!("[{}] ignoring {}", self.address, msg),
        }
    }

    fn handle_broadcast(&mut self, proto: &mut Protocol, msg: &Message) {
        let Some(group) = msg.group() else {
            debug!("[{}] broadcast without group address {}", self.address, msg);
            return;
        };
        if msg.cmd1() != CMD_LINK_CLEANUP_REPORT {
            self.last_broadcast = Some((group, msg.cmd1()));
        }
        self.apply_group_command(proto, group, msg.cmd1(), msg.cmd2());
    }

    fn handle_cleanup(&mut self, proto: &mut Protocol, msg: &Message) {
        let group = msg.cmd2();
        if self.last_broadcast.take() == Some((group, msg.cmd1())) {
            debug!("[{}] cleanup for group {} already handled", self.address, group);
            return;
        }
        match msg.cmd1() {
            CMD_ON | CMD_OFF | CMD_ON_FAST | CMD_OFF_FAST => {
                self.apply_group_command(proto, group, msg.cmd1(), 0x00);
            }
            _ => debug!("[{}] ignoring cleanup {}", self.address, msg),
        }
    }

    fn handle_direct(&mut self, msg: &Message) {
        match Manual::from_command(msg.cmd1(), msg.cmd2()) {
            Some(manual) => self.update_manual(manual, REASON_DEVICE),
            None => debug!("[{}] ignoring direct {}", self.address, msg),
        }
    }

    fn apply_group_command(&mut self, proto: &mut Protocol, group: u8, cmd1: u8, cmd2: u8) {
        debug!("[{}] group {} command {:#04x}/{:#04x}", self.address, group, cmd1, cmd2);
        match cmd1 {
            CMD_ON => self.update_level(LEVEL_FULL, Mode::Normal, REASON_DEVICE),
            CMD_OFF => self.update_level(LEVEL_OFF, Mode::Normal, REASON_DEVICE),
            CMD_ON_FAST => self.update_level(LEVEL_FULL, Mode::Fast, REASON_DEVICE),
            CMD_OFF_FAST => self.update_level(LEVEL_OFF, Mode::Fast, REASON_DEVICE),
            CMD_START_MANUAL_CHANGE | CMD_STOP_MANUAL_CHANGE => {
                let Some(manual) = Manual::from_command(cmd1, cmd2) else {
                    debug!("[{}] unknown manual direction {:#04x}", self.address, cmd2);
                    return;
                };
                self.update_manual(manual, REASON_DEVICE);
                if manual == Manual::Stop {
                    // The final level is only known by asking.
                    self.refresh(proto, REASON_DEVICE, None);
                }
            }
            CMD_LINK_CLEANUP_REPORT => {
                debug!("[{}] cleanup report for group {}", self.address, group);
            }
            _ => debug!("[{}] ignoring group command {:#04x}", self.address, cmd1),
        }
    }

    fn update_level(&mut self, level: u8, mode: Mode, reason: &str) {
        info!("[{}] {} level={} mode={} reason={:?}", self.address, self.name, level, mode, reason);
        self.level = Some(level);
        self.mode = mode;
        self.emit(DimmerEvent::LevelChanged {
            device: self.address,
            level,
            mode,
            reason: reason.to_string(),
        });
    }

    fn update_manual(&mut self, manual: Manual, reason: &str) {
        info!("[{}] {} manual={}", self.address, self.name, manual);
        self.manual = Some(manual);
        self.emit(DimmerEvent::Manual {
            device: self.address,
            manual,
            reason: reason.to_string(),
        });
    }

    fn check_link_db(&mut self, delta: u8) {
        if self.link_db.delta() == Some(delta) {
            return;
        }
        info!("[{}] link database changed (delta {})", self.address, delta);
        if let Err(err) = self.link_db.refresh(delta) {
            warn!("[{}] link database refresh failed: {}", self.address, err);
        }
    }

    fn emit(&mut self, event: DimmerEvent) {
        if let Err(err) = self.signal.emit(&event) {
            warn!("[{}] {}", self.address, err);
        }
    }
}
