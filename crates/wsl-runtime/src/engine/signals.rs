use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{at, never, select, Receiver};
use tracing::debug;
use wsl_core::ScriptError;

use super::stream::StreamEvent;

/// Messages sent to a script thread from the outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Control {
    Stop,
    Goto(String),
    Resume,
}

/// Why a blocking call gave control back early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Stop,
    Goto,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    Script(ScriptError),
    Interrupted(Interrupt),
}

impl From<ScriptError> for CommandError {
    fn from(error: ScriptError) -> Self {
        Self::Script(error)
    }
}

impl From<Interrupt> for CommandError {
    fn from(interrupt: Interrupt) -> Self {
        Self::Interrupted(interrupt)
    }
}

pub type CommandResult = Result<(), CommandError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    Event(StreamEvent),
    TimedOut,
}

/// Script-thread side of the control channel. Every blocking call goes
/// through here so stop and cross-thread goto can cut it short.
#[derive(Debug)]
pub(crate) struct Waiter {
    control: Receiver<Control>,
    pending_goto: Option<String>,
    /// Raised while blocked on stream events with no deadline.
    open_wait: Arc<AtomicBool>,
}

/// Deadline `duration` from now, or `None` when it lies past what
/// `Instant` can represent.
pub(crate) fn deadline_after(duration: Duration) -> Option<Instant> {
    Instant::now().checked_add(duration)
}

/// Seconds as a `Duration`; `None` when the value does not fit.
pub(crate) fn seconds_to_duration(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds).ok()
}

impl Waiter {
    pub(crate) fn new(control: Receiver<Control>) -> Self {
        Self {
            control,
            pending_goto: None,
            open_wait: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn open_wait_flag(&self) -> Arc<AtomicBool> {
        self.open_wait.clone()
    }

    fn handle(&mut self, control: Control) -> Option<Interrupt> {
        match control {
            Control::Stop => Some(Interrupt::Stop),
            Control::Goto(label) => {
                debug!(target: "script", %label, "goto requested from another thread");
                self.pending_goto = Some(label);
                Some(Interrupt::Goto)
            }
            Control::Resume => None,
        }
    }

    pub(crate) fn take_pending_goto(&mut self) -> Option<String> {
        self.pending_goto.take()
    }

    /// Drains queued control messages without blocking.
    pub(crate) fn poll(&mut self) -> Result<(), Interrupt> {
        let mut result = Ok(());
        while let Ok(control) = self.control.try_recv() {
            match self.handle(control) {
                Some(Interrupt::Stop) => return Err(Interrupt::Stop),
                Some(interrupt) => result = Err(interrupt),
                None => {}
            }
        }
        result
    }

    pub(crate) fn wait_event(
        &mut self,
        events: Option<&Receiver<StreamEvent>>,
        deadline: Option<Instant>,
    ) -> Result<WaitOutcome, Interrupt> {
        self.open_wait
            .store(events.is_some() && deadline.is_none(), Ordering::SeqCst);
        let outcome = self.select_event(events, deadline);
        self.open_wait.store(false, Ordering::SeqCst);
        outcome
    }

    fn select_event(
        &mut self,
        events: Option<&Receiver<StreamEvent>>,
        deadline: Option<Instant>,
    ) -> Result<WaitOutcome, Interrupt> {
        let control = self.control.clone();
        let no_events = never::<StreamEvent>();
        let events = events.unwrap_or(&no_events);
        let timeout = match deadline {
            Some(deadline) => at(deadline),
            None => never(),
        };

        loop {
            select! {
                recv(control) -> message => match message {
                    Ok(control) => {
                        if let Some(interrupt) = self.handle(control) {
                            return Err(interrupt);
                        }
                    }
                    Err(_) => return Err(Interrupt::Stop),
                },
                recv(events) -> event => match event {
                    Ok(event) => return Ok(WaitOutcome::Event(event)),
                    Err(_) => return Err(Interrupt::Stop),
                },
                recv(timeout) -> _ => return Ok(WaitOutcome::TimedOut),
            }
        }
    }

    /// Sleeps for `duration`. A duration too long to schedule sleeps
    /// until interrupted.
    pub(crate) fn sleep(&mut self, duration: Duration) -> Result<(), Interrupt> {
        self.wait_event(None, deadline_after(duration)).map(|_| ())
    }

    pub(crate) fn sleep_seconds(&mut self, seconds: f64) -> Result<(), Interrupt> {
        match seconds_to_duration(seconds) {
            Some(duration) => self.sleep(duration),
            None => self.wait_event(None, None).map(|_| ()),
        }
    }

    /// Blocks until a resume (or an interrupt) arrives.
    pub(crate) fn wait_resume(&mut self) -> Result<(), Interrupt> {
        loop {
            match self.control.recv() {
                Ok(Control::Resume) => return Ok(()),
                Ok(control) => {
                    if let Some(interrupt) = self.handle(control) {
                        return Err(interrupt);
                    }
                }
                Err(_) => return Err(Interrupt::Stop),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use crossbeam_channel::unbounded;

    use super::*;

    #[test]
    fn stream_event_ends_the_wait() {
        let (_control_tx, control_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let mut waiter = Waiter::new(control_rx);
        event_tx
            .send(StreamEvent::Line("hello".to_string()))
            .expect("send should pass");
        let outcome = waiter
            .wait_event(Some(&event_rx), None)
            .expect("wait should not be interrupted");
        assert_eq!(outcome, WaitOutcome::Event(StreamEvent::Line("hello".to_string())));
    }

    #[test]
    fn deadline_times_out() {
        let (_control_tx, control_rx) = unbounded();
        let mut waiter = Waiter::new(control_rx);
        let outcome = waiter
            .wait_event(None, Some(Instant::now() + Duration::from_millis(20)))
            .expect("wait should not be interrupted");
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[test]
    fn goto_interrupts_and_is_kept_pending() {
        let (control_tx, control_rx) = unbounded();
        let mut waiter = Waiter::new(control_rx);
        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            control_tx
                .send(Control::Goto("escape".to_string()))
                .expect("send should pass");
        });
        let interrupt = waiter
            .wait_event(None, None)
            .expect_err("goto should interrupt an unbounded wait");
        sender.join().expect("sender thread should finish");
        assert_eq!(interrupt, Interrupt::Goto);
        assert_eq!(waiter.take_pending_goto().as_deref(), Some("escape"));
        assert!(waiter.take_pending_goto().is_none());
    }

    #[test]
    fn resume_does_not_interrupt_a_wait_but_ends_wait_resume() {
        let (control_tx, control_rx) = unbounded();
        let mut waiter = Waiter::new(control_rx);
        control_tx.send(Control::Resume).expect("send should pass");
        let outcome = waiter
            .wait_event(None, Some(Instant::now() + Duration::from_millis(10)))
            .expect("resume should be ignored");
        assert_eq!(outcome, WaitOutcome::TimedOut);

        control_tx.send(Control::Resume).expect("send should pass");
        waiter.wait_resume().expect("resume should end the suspension wait");
    }

    #[test]
    fn overlong_sleep_waits_until_stopped() {
        assert!(deadline_after(Duration::MAX).is_none());
        assert!(seconds_to_duration(1e20).is_none());
        assert_eq!(seconds_to_duration(1.5), Some(Duration::from_millis(1500)));

        let (control_tx, control_rx) = unbounded();
        let mut waiter = Waiter::new(control_rx);
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            control_tx.send(Control::Stop).expect("send should pass");
        });
        assert_eq!(waiter.sleep_seconds(1e19), Err(Interrupt::Stop));
        stopper.join().expect("stopper thread should finish");
    }

    #[test]
    fn open_wait_flag_tracks_stream_waits_without_deadline() {
        let (control_tx, control_rx) = unbounded();
        let (event_tx, event_rx) = unbounded::<StreamEvent>();
        let mut waiter = Waiter::new(control_rx);
        let flag = waiter.open_wait_flag();
        let observer = thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(5);
            while !flag.load(Ordering::SeqCst) && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(2));
            }
            let seen = flag.load(Ordering::SeqCst);
            event_tx
                .send(StreamEvent::Prompt)
                .expect("send should pass");
            seen
        });
        waiter
            .wait_event(Some(&event_rx), None)
            .expect("wait should not be interrupted");
        assert!(observer.join().expect("observer should finish"));
        assert!(!waiter.open_wait_flag().load(Ordering::SeqCst));

        let (_idle_tx, idle_rx) = unbounded::<StreamEvent>();
        control_tx.send(Control::Resume).expect("send should pass");
        waiter
            .wait_event(Some(&idle_rx), Some(Instant::now() + Duration::from_millis(10)))
            .expect("bounded wait should time out");
        assert!(!waiter.open_wait_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn poll_prefers_stop_over_goto() {
        let (control_tx, control_rx) = unbounded();
        let mut waiter = Waiter::new(control_rx);
        control_tx
            .send(Control::Goto("a".to_string()))
            .expect("send should pass");
        control_tx.send(Control::Stop).expect("send should pass");
        assert_eq!(waiter.poll(), Err(Interrupt::Stop));
        assert!(waiter.poll().is_ok());
    }
}
