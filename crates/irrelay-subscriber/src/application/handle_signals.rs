//! SubscriberSession: handles every line the relay sends to a subscriber.
//!
//! ```text
//! "success 1"        ──► log
//! "fail device 2 …"  ──► log
//! "1 40BD01FE"       ──► RepeatDebouncer ──Fire──► HandlerDispatcher
//! "1 repeat"         ──► RepeatDebouncer ──Suppressed──► (nothing)
//! ```
//!
//! In echo mode signals are logged as `<device> <data>` and neither the
//! debouncer nor any handler sees them.  Repeat state belongs to one
//! connection; call [`SubscriberSession::reset`] on connect and disconnect.

use irrelay_core::protocol::{decode_server_line, ServerLine};
use irrelay_core::{RepeatDebouncer, RepeatOutcome};
use tracing::{debug, error, info, trace, warn};

use crate::application::dispatch_handler::HandlerDispatcher;

/// What the session did with one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    Subscribed { device: String },
    Rejected { reason: String },
    /// A handler ran (or was attempted) with `repeat_count`.
    Fired { key: String, repeat_count: u32 },
    /// A repeat inside the debounce window.
    Suppressed,
    /// Echo mode: logged only.
    Echoed,
    /// No keymap, no handler, unknown code, or an undecodable line.
    Ignored,
}

/// Per-connection subscriber state: debouncer, dispatcher, and echo flag.
pub struct SubscriberSession {
    debouncer: RepeatDebouncer,
    dispatcher: HandlerDispatcher,
    echo_mode: bool,
}

impl SubscriberSession {
    pub fn new(debouncer: RepeatDebouncer, dispatcher: HandlerDispatcher, echo_mode: bool) -> Self {
        Self {
            debouncer,
            dispatcher,
            echo_mode,
        }
    }

    pub fn echo_mode(&self) -> bool {
        self.echo_mode
    }

    /// Switches echo mode on or off at runtime.
    pub fn set_echo_mode(&mut self, echo_mode: bool) {
        self.echo_mode = echo_mode;
    }

    /// Clears the repeat state.
    pub fn reset(&mut self) {
        self.debouncer.reset();
    }

    pub fn debouncer(&self) -> &RepeatDebouncer {
        &self.debouncer
    }

    /// Decodes and handles one line from the relay.
    pub fn handle_line(&mut self, raw: &str) -> SignalOutcome {
        match decode_server_line(raw) {
            Ok(Some(line)) => self.handle_server_line(line),
            Ok(None) => SignalOutcome::Ignored,
            Err(e) => {
                error!("unable to extract device/data: {e}");
                SignalOutcome::Ignored
            }
        }
    }

    /// Handles a decoded [`ServerLine`].
    pub fn handle_server_line(&mut self, line: ServerLine) -> SignalOutcome {
        match line {
            ServerLine::Subscribed { device } => {
                info!("subscribed to device {device}");
                SignalOutcome::Subscribed { device }
            }
            ServerLine::Rejected { reason } => {
                error!("subscription failed: {reason}");
                SignalOutcome::Rejected { reason }
            }
            ServerLine::Signal { device, data } => self.handle_signal(&device, &data),
        }
    }

    /// Feeds one `(device, data)` signal through the debouncer and runs the
    /// handler if it fires.
    pub fn handle_signal(&mut self, device: &str, data: &str) -> SignalOutcome {
        if self.echo_mode {
            info!("{device} {data}");
            return SignalOutcome::Echoed;
        }
        trace!("{device} {data}");

        match self.debouncer.handle_frame(device, data) {
            RepeatOutcome::Fire {
                key,
                handler,
                repeat_count,
            } => {
                if let Err(e) = self.dispatcher.execute(handler, repeat_count) {
                    error!("{device}/{key}: {e}");
                }
                SignalOutcome::Fired {
                    key: key.to_string(),
                    repeat_count,
                }
            }
            RepeatOutcome::Suppressed { key, repeat_count } => {
                debug!("{device}/{key}: repeat {repeat_count} suppressed");
                SignalOutcome::Suppressed
            }
            RepeatOutcome::NoHandler { key, repeat_count } => {
                if key.is_empty() {
                    warn!("{device}: repeat {repeat_count} with no preceding key");
                } else if repeat_count == 0 {
                    warn!("no handler registered for {key} on device {device}");
                } else {
                    warn!("no handler registered for {key} on device {device} (repeat {repeat_count})");
                }
                SignalOutcome::Ignored
            }
            RepeatOutcome::NoKeymap => {
                error!("no keymap found for device {device}");
                SignalOutcome::Ignored
            }
            RepeatOutcome::Unrecognized => {
                error!("unrecognized signal {data} from device {device}");
                SignalOutcome::Ignored
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use irrelay_core::keymap::{CodeMap, Handler, Keymaps, MouseAction};

    use super::*;
    use crate::infrastructure::action_executor::mock::{MockActionExecutor, RecordedAction};

    fn make_session(global_delay: u32) -> (SubscriberSession, Arc<MockActionExecutor>) {
        let codemap: CodeMap = [
            ("40BD01FE".to_string(), "HOME".to_string()),
            ("40BD41BE".to_string(), "UP".to_string()),
        ]
        .into_iter()
        .collect();
        let mut keymaps = Keymaps::new();
        keymaps.insert("1", "HOME", Handler::key("space"));
        keymaps.insert(
            "1",
            "UP",
            Handler::mouse(MouseAction::Move { dx: 0, dy: -10 }).with_delay(1),
        );

        let executor = Arc::new(MockActionExecutor::new());
        let session = SubscriberSession::new(
            RepeatDebouncer::new(codemap, keymaps, global_delay),
            HandlerDispatcher::new(executor.clone()),
            false,
        );
        (session, executor)
    }

    #[test]
    fn test_signal_line_runs_handler() {
        // Arrange
        let (mut session, executor) = make_session(3);

        // Act
        let outcome = session.handle_line("1 40BD01FE\n");

        // Assert
        assert_eq!(
            outcome,
            SignalOutcome::Fired {
                key: "HOME".to_string(),
                repeat_count: 0
            }
        );
        assert_eq!(executor.actions(), vec![RecordedAction::Key("space".to_string())]);
    }

    #[test]
    fn test_held_button_is_debounced() {
        let (mut session, executor) = make_session(3);

        let outcomes: Vec<SignalOutcome> = ["1 40BD01FE", "1 repeat", "1 repeat", "1 repeat"]
            .iter()
            .map(|line| session.handle_line(line))
            .collect();

        assert_eq!(outcomes[1], SignalOutcome::Suppressed);
        assert_eq!(outcomes[2], SignalOutcome::Suppressed);
        assert!(matches!(outcomes[3], SignalOutcome::Fired { repeat_count: 1, .. }));
        assert_eq!(executor.actions().len(), 2);
    }

    #[test]
    fn test_echo_mode_logs_without_dispatch_or_state_change() {
        let (mut session, executor) = make_session(0);
        session.set_echo_mode(true);

        let outcome = session.handle_line("1 40BD01FE");

        assert_eq!(outcome, SignalOutcome::Echoed);
        assert!(executor.actions().is_empty());
        assert_eq!(session.debouncer().previous_key(), None);
    }

    #[test]
    fn test_echo_mode_can_be_switched_off() {
        let (mut session, executor) = make_session(0);
        session.set_echo_mode(true);
        session.set_echo_mode(false);

        session.handle_line("1 40BD41BE");

        assert!(!session.echo_mode());
        assert_eq!(executor.actions(), vec![RecordedAction::MouseMove(0, -10)]);
    }

    #[test]
    fn test_server_responses_are_reported() {
        let (mut session, executor) = make_session(0);

        assert_eq!(
            session.handle_line("success 1"),
            SignalOutcome::Subscribed {
                device: "1".to_string()
            }
        );
        assert_eq!(
            session.handle_line("fail device 2 is not registered"),
            SignalOutcome::Rejected {
                reason: "device 2 is not registered".to_string()
            }
        );
        assert!(executor.actions().is_empty());
    }

    #[test]
    fn test_unknown_device_and_garbage_are_ignored() {
        let (mut session, executor) = make_session(0);

        assert_eq!(session.handle_line("9 40BD01FE"), SignalOutcome::Ignored);
        assert_eq!(session.handle_line("1 DEADBEEF"), SignalOutcome::Ignored);
        assert_eq!(session.handle_line("one two three"), SignalOutcome::Ignored);
        assert!(executor.actions().is_empty());
    }

    #[test]
    fn test_reset_forgets_previous_key() {
        let (mut session, executor) = make_session(0);
        session.handle_line("1 40BD01FE");
        executor.clear();

        session.reset();
        let outcome = session.handle_line("1 repeat");

        assert_eq!(outcome, SignalOutcome::Ignored);
        assert!(executor.actions().is_empty());
    }

    #[test]
    fn test_failing_executor_does_not_stop_session() {
        let codemap: CodeMap = [("A".to_string(), "HOME".to_string())].into_iter().collect();
        let mut keymaps = Keymaps::new();
        keymaps.insert("1", "HOME", Handler::key("space"));
        let mut session = SubscriberSession::new(
            RepeatDebouncer::new(codemap, keymaps, 0),
            HandlerDispatcher::new(Arc::new(MockActionExecutor::failing())),
            false,
        );

        assert!(matches!(session.handle_line("1 A"), SignalOutcome::Fired { .. }));
        assert!(matches!(session.handle_line("1 repeat"), SignalOutcome::Fired { .. }));
    }
}
