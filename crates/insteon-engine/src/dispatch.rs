//! Direct command dispatch.
//!
//! The [`Dispatcher`] owns every outstanding direct command. Commands to the
//! same device are serialized: only the head of a device's queue is on the
//! wire, and the next one is transmitted when the head resolves. Each
//! command resolves exactly once, as an ack, or as a failure after a nak,
//! a timeout, or cancellation.
//!
//! The dispatcher performs no I/O. Outbound frames collect in an outbox
//! drained by [`Dispatcher::take_outbound`], replies are fed through
//! [`Dispatcher::handle_reply`], and the caller drives timeouts by calling
//! [`Dispatcher::poll`] with the current time.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use insteon_message::{Address, Message, MessageType};
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::error::EngineError;
use crate::telemetry::metric_defs;

/// Default time to wait for a reply before resending.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of resends after the first attempt.
pub const DEFAULT_MAX_RETRIES: u8 = 3;

/// Dispatcher tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Reply timeout in milliseconds.
    pub timeout_ms: u64,
    /// Resends allowed after the first attempt.
    pub max_retries: u8,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl DispatchConfig {
    /// Reply timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Decides whether a direct reply answers the outstanding command.
///
/// The reply must come from the command's target and be an ack or nak;
/// the matcher adds a command-specific check on top.
#[derive(Debug, Clone, Copy)]
pub enum AckMatcher {
    /// Reply cmd1 must equal the sent cmd1.
    Command,
    /// Any reply from the device.
    AnyCommand,
    /// Custom predicate on (sent, reply).
    Custom(fn(&Message, &Message) -> bool),
}

impl AckMatcher {
    /// Check a reply against the sent message.
    pub fn matches(&self, sent: &Message, reply: &Message) -> bool {
        if reply.from() != sent.to() || !reply.msg_type().is_direct_reply() {
            return false;
        }
        match self {
            AckMatcher::Command => reply.cmd1() == sent.cmd1(),
            AckMatcher::AnyCommand => true,
            AckMatcher::Custom(predicate) => predicate(sent, reply),
        }
    }
}

/// A resolved command: the caller's handler plus the outcome.
#[derive(Debug)]
pub struct Resolution<H> {
    /// Target device.
    pub device: Address,
    /// The message as last sent.
    pub sent: Message,
    /// Handler registered with the command.
    pub handler: H,
    /// The ack on success.
    pub outcome: Result<Message, EngineError>,
}

struct Outstanding<H> {
    msg: Message,
    matcher: AckMatcher,
    handler: H,
    retries_left: u8,
    attempts: u32,
    first_sent: Option<Instant>,
    sent_at: Option<Instant>,
}

impl<H> Outstanding<H> {
    fn resolve(self, outcome: Result<Message, EngineError>) -> Resolution<H> {
        Resolution {
            device: self.msg.to(),
            sent: self.msg,
            handler: self.handler,
            outcome,
        }
    }
}

/// Per-device serializing command dispatcher.
pub struct Dispatcher<H> {
    config: DispatchConfig,
    queues: BTreeMap<Address, VecDeque<Outstanding<H>>>,
    outbox: VecDeque<Message>,
}

impl<H> std::fmt::Debug for Dispatcher<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("devices", &self.queues.len())
            .field("outbox", &self.outbox.len())
            .finish()
    }
}

impl<H> Dispatcher<H> {
    /// Create an idle dispatcher.
    pub fn new(config: DispatchConfig) -> Self {
        Dispatcher {
            config,
            queues: BTreeMap::new(),
            outbox: VecDeque::new(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Queue a direct command. It goes on the wire immediately if nothing
    /// else is outstanding for the same device.
    ///
    /// `max_retries` overrides the configured retry count for this command.
    pub fn send(&mut self, msg: Message, matcher: AckMatcher, handler: H, max_retries: Option<u8>) {
        let device = msg.to();
        let entry = Outstanding {
            msg,
            matcher,
            handler,
            retries_left: max_retries.unwrap_or(self.config.max_retries),
            attempts: 0,
            first_sent: None,
            sent_at: None,
        };

        let queue = self.queues.entry(device).or_default();
        queue.push_back(entry);
        if queue.len() == 1 {
            Self::transmit(&mut self.outbox, queue, Instant::now());
        } else {
            debug!("[{}] queued {} behind {} outstanding", device, msg, queue.len() - 1);
        }
    }

    /// Feed a direct reply. Returns the resolution if it completed the
    /// device's outstanding command.
    pub fn handle_reply(&mut self, reply: &Message) -> Option<Resolution<H>> {
        let device = reply.from();
        let queue = self.queues.get_mut(&device)?;
        let head = queue.front_mut()?;
        if head.sent_at.is_none() || !head.matcher.matches(&head.msg, reply) {
            trace!("[{}] reply {} does not match {}", device, reply, head.msg);
            return None;
        }

        let resolution = match reply.msg_type() {
            MessageType::DirectAck => {
                let entry = queue.pop_front()?;
                if let Some(first) = entry.first_sent {
                    let labels = metric_defs::DISPATCH_LATENCY.labels_for(&[device.to_string()]);
                    metrics::histogram!(metric_defs::DISPATCH_LATENCY.name, &labels)
                        .record(first.elapsed().as_secs_f64() * 1000.0);
                }
                entry.resolve(Ok(*reply))
            }
            MessageType::DirectNak => {
                let labels = metric_defs::DISPATCH_NAKS.labels_for(&[device.to_string()]);
                metrics::counter!(metric_defs::DISPATCH_NAKS.name, &labels).increment(1);
                if head.retries_left > 0 {
                    head.retries_left -= 1;
                    warn!("[{}] nak for {}, resending ({} retries left)", device, head.msg, head.retries_left);
                    Self::transmit(&mut self.outbox, queue, Instant::now());
                    return None;
                }
                let entry = queue.pop_front()?;
                warn!("[{}] nak for {}, giving up", device, entry.msg);
                let err = EngineError::Nak {
                    device,
                    cmd1: entry.msg.cmd1(),
                    attempts: entry.attempts,
                };
                entry.resolve(Err(err))
            }
            _ => return None,
        };

        self.advance(device);
        Some(resolution)
    }

    /// Resend or fail every command whose reply deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Vec<Resolution<H>> {
        let timeout = self.config.timeout();
        let mut expired = Vec::new();
        let mut resolved = Vec::new();

        for (device, queue) in self.queues.iter_mut() {
            let Some(head) = queue.front_mut() else {
                continue;
            };
            let Some(sent_at) = head.sent_at else {
                continue;
            };
            if now.saturating_duration_since(sent_at) < timeout {
                continue;
            }

            let labels = metric_defs::DISPATCH_TIMEOUTS.labels_for(&[device.to_string()]);
            metrics::counter!(metric_defs::DISPATCH_TIMEOUTS.name, &labels).increment(1);
            if head.retries_left > 0 {
                head.retries_left -= 1;
                warn!("[{}] timeout on {}, resending ({} retries left)", device, head.msg, head.retries_left);
                Self::transmit(&mut self.outbox, queue, now);
                continue;
            }

            if let Some(entry) = queue.pop_front() {
                warn!("[{}] timeout on {}, giving up", device, entry.msg);
                let err = EngineError::Timeout {
                    device: *device,
                    cmd1: entry.msg.cmd1(),
                    attempts: entry.attempts,
                };
                resolved.push(entry.resolve(Err(err)));
                expired.push(*device);
            }
        }

        for device in expired {
            self.advance_at(device, now);
        }
        resolved
    }

    /// Fail every command queued for a device.
    pub fn cancel_device(&mut self, device: Address) -> Vec<Resolution<H>> {
        let Some(queue) = self.queues.remove(&device) else {
            return Vec::new();
        };
        debug!("[{}] cancelling {} outstanding commands", device, queue.len());
        let labels = metric_defs::DISPATCH_CANCELLED.labels_for(&[device.to_string()]);
        metrics::counter!(metric_defs::DISPATCH_CANCELLED.name, &labels)
            .increment(queue.len() as u64);
        queue
            .into_iter()
            .map(|entry| {
                let err = EngineError::Cancelled {
                    device,
                    cmd1: entry.msg.cmd1(),
                };
                entry.resolve(Err(err))
            })
            .collect()
    }

    /// Handlers queued for a device, head first.
    pub fn pending(&self, device: Address) -> impl Iterator<Item = &H> {
        self.queues
            .get(&device)
            .into_iter()
            .flat_map(|queue| queue.iter().map(|entry| &entry.handler))
    }

    /// The message currently on the wire for a device.
    pub fn in_flight(&self, device: Address) -> Option<&Message> {
        self.queues.get(&device)?.front().map(|entry| &entry.msg)
    }

    /// Number of commands outstanding across all devices.
    pub fn outstanding(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// True if no command is outstanding.
    pub fn is_idle(&self) -> bool {
        self.queues.is_empty()
    }

    /// Drain messages waiting to be written to the transport.
    pub fn take_outbound(&mut self) -> Vec<Message> {
        self.outbox.drain(..).collect()
    }

    fn advance(&mut self, device: Address) {
        self.advance_at(device, Instant::now());
    }

    fn advance_at(&mut self, device: Address, now: Instant) {
        match self.queues.get_mut(&device) {
            Some(queue) if !queue.is_empty() => Self::transmit(&mut self.outbox, queue, now),
            Some(_) => {
                self.queues.remove(&device);
            }
            None => {}
        }
    }

    fn transmit(outbox: &mut VecDeque<Message>, queue: &mut VecDeque<Outstanding<H>>, now: Instant) {
        let Some(head) = queue.front_mut() else {
            return;
        };
        let device = [head.msg.to().to_string()];
        if head.attempts == 0 {
            let labels = metric_defs::DISPATCH_SENT.labels_for(&device);
            metrics::counter!(metric_defs::DISPATCH_SENT.name, &labels).increment(1);
            head.first_sent = Some(now);
        } else {
            let labels = metric_defs::DISPATCH_RETRIES.labels_for(&device);
            metrics::counter!(metric_defs::DISPATCH_RETRIES.name, &labels).increment(1);
        }
        head.attempts += 1;
        head.sent_at = Some(now);
        debug!("[{}] send {} (attempt {})", head.msg.to(), head.msg, head.attempts);
        outbox.push_back(head.msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insteon_message::CMD_ON;

    const MODEM: Address = Address::new(0x44, 0x85, 0x11);
    const LIGHT: Address = Address::new(0x01, 0x02, 0x03);

    fn on(level: u8) -> Message {
        Message::standard(MODEM, LIGHT, MessageType::Direct, CMD_ON, level)
    }

    fn reply(msg_type: MessageType, cmd1: u8, cmd2: u8) -> Message {
        Message::standard(LIGHT, MODEM, msg_type, cmd1, cmd2)
    }

    #[test]
    fn test_config_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_matcher_requires_reply_from_target() {
        let sent = on(0xFF);
        let ack = reply(MessageType::DirectAck, CMD_ON, 0xFF);
        assert!(AckMatcher::Command.matches(&sent, &ack));

        let stranger = Message::standard(
            Address::new(9, 9, 9),
            MODEM,
            MessageType::DirectAck,
            CMD_ON,
            0xFF,
        );
        assert!(!AckMatcher::AnyCommand.matches(&sent, &stranger));

        let broadcast = reply(MessageType::AllLinkBroadcast, CMD_ON, 0xFF);
        assert!(!AckMatcher::AnyCommand.matches(&sent, &broadcast));
    }

    #[test]
    fn test_matcher_custom() {
        fn level_echo(sent: &Message, reply: &Message) -> bool {
            sent.cmd2() == reply.cmd2()
        }
        let matcher = AckMatcher::Custom(level_echo);
        assert!(matcher.matches(&on(5), &reply(MessageType::DirectAck, 0x99, 5)));
        assert!(!matcher.matches(&on(5), &reply(MessageType::DirectAck, CMD_ON, 6)));
    }

    #[test]
    fn test_send_transmits_immediately_when_idle() {
        let mut dispatcher = Dispatcher::new(DispatchConfig::default());
        dispatcher.send(on(0xFF), AckMatcher::Command, "a", None);
        assert_eq!(dispatcher.take_outbound(), vec![on(0xFF)]);
        assert_eq!(dispatcher.in_flight(LIGHT), Some(&on(0xFF)));
        assert_eq!(dispatcher.outstanding(), 1);
    }

    #[test]
    fn test_unmatched_reply_is_ignored() {
        let mut dispatcher = Dispatcher::new(DispatchConfig::default());
        dispatcher.send(on(0xFF), AckMatcher::Command, "a", None);
        assert!(dispatcher
            .handle_reply(&reply(MessageType::DirectAck, 0x13, 0))
            .is_none());
        assert_eq!(dispatcher.outstanding(), 1);
    }

    #[test]
    fn test_nak_then_ack() {
        let mut dispatcher = Dispatcher::new(DispatchConfig::default());
        dispatcher.send(on(0xFF), AckMatcher::Command, "a", None);
        dispatcher.take_outbound();

        assert!(dispatcher
            .handle_reply(&reply(MessageType::DirectNak, CMD_ON, 0xFF))
            .is_none());
        assert_eq!(dispatcher.take_outbound(), vec![on(0xFF)]);

        let res = dispatcher
            .handle_reply(&reply(MessageType::DirectAck, CMD_ON, 0xFF))
            .unwrap();
        assert_eq!(res.handler, "a");
        assert_eq!(res.outcome.unwrap().cmd2(), 0xFF);
        assert!(dispatcher.is_idle());
    }
}
