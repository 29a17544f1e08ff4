//! Event-Bus (C9)
//!
//! Eine beschraenkte FIFO-Warteschlange kleiner, getaggter Ereignisse.
//! Erzeuger koennen beliebige Tasks oder Interrupt-aehnliche Kontexte sein;
//! letztere nutzen `post_from_isr`, das niemals blockiert. Ein normaler
//! `post` auf eine volle Warteschlange liefert nach Ablauf des
//! Caller-Timeouts `VaError::Timeout` zurueck – Ereignisse werden nie
//! stillschweigend verworfen.
//!
//! Implementiert ueber `crossbeam_channel`, dessen begrenzter Kanal sowohl
//! eine nicht-blockierende (`try_send`) als auch eine fristbehaftete
//! (`send_timeout`) Sendeoperation bereitstellt – genau die zwei Formen,
//! die C9 verlangt.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use tracing::{trace, warn};

use crate::error::{Result, VaError};
use crate::event::Event;

/// Standard-Tiefe der Warteschlange, sofern nicht anders konfiguriert.
pub const DEFAULT_DEPTH: usize = 20;

/// Empfaenger-Seite des Event-Bus. Ein Bus hat konzeptionell einen
/// Konsumenten (die Session-State-Machine); weitere Klone sind moeglich,
/// teilen sich dann aber die Ereignisse (Competing-Consumers), nicht
/// Broadcast.
#[derive(Clone)]
pub struct EventReceiver {
    rx: Receiver<Event>,
}

impl EventReceiver {
    /// Wartet bis zu `timeout` auf das naechste Ereignis. Liefert `Ok(None)`
    /// bei Ablauf der Frist, damit der Aufrufer periodisch pollen kann
    /// (die Session-State-Machine nutzt hierfuer 100 ms).
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Event>> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(VaError::InvalidState("event bus geschlossen".into()))
            }
        }
    }
}

/// Sende-Seite des Event-Bus. Guenstig zu klonen (ein `crossbeam_channel`
/// Sender pro Erzeuger-Task).
#[derive(Clone)]
pub struct EventBus {
    tx: Sender<Event>,
}

impl EventBus {
    /// Erstellt einen neuen Bus mit der gegebenen Tiefe und gibt Sender- und
    /// Empfaenger-Seite zurueck. Der Bus selbst haelt keine interne
    /// Kopie der Empfaengerseite – Aufrufer verdrahten das Paar bei Init.
    pub fn new(depth: usize) -> (Self, EventReceiver) {
        let (tx, rx) = crossbeam_channel::bounded(depth.max(1));
        (Self { tx }, EventReceiver { rx })
    }

    /// Erstellt einen Bus mit der Standardtiefe (20).
    pub fn with_default_depth() -> (Self, EventReceiver) {
        Self::new(DEFAULT_DEPTH)
    }

    /// Reiht ein Ereignis ein; blockiert bis zu `timeout` falls die
    /// Warteschlange voll ist. Liefert `VaError::Timeout`, wenn die Frist
    /// ohne freien Platz verstreicht.
    pub fn post(&self, event: Event, timeout: Duration) -> Result<()> {
        match self.tx.send_timeout(event, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                Err(VaError::Timeout("event bus voll".into()))
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                Err(VaError::InvalidState("event bus geschlossen".into()))
            }
        }
    }

    /// Reiht ein Ereignis nicht-blockierend ein. Gedacht fuer
    /// Interrupt-aehnliche/Callback-Kontexte, die niemals warten duerfen
    /// (Netzwerk-Callbacks, Audio-Callback-Thread). Bei voller
    /// Warteschlange wird das Ereignis mit einer Warnung verworfen statt
    /// den Aufrufer zu blockieren.
    pub fn post_from_isr(&self, event: Event) {
        match self.tx.try_send(event) {
            Ok(()) => trace!("event aus isr-kontext eingereiht"),
            Err(TrySendError::Full(ev)) => {
                warn!(kind = ev.kind(), "event bus voll, isr-post verworfen");
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("event bus geschlossen, isr-post verworfen");
            }
        }
    }

    /// Aktuelle Fuellstand-Schaetzung (nur fuer Diagnose/Tests relevant).
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn post_und_recv_fifo() {
        let (bus, rx) = EventBus::new(4);
        bus.post(Event::UserTap, Duration::from_millis(10)).unwrap();
        bus.post(Event::Cancel, Duration::from_millis(10)).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)).unwrap(), Some(Event::UserTap));
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)).unwrap(), Some(Event::Cancel));
    }

    #[test]
    fn recv_timeout_liefert_none() {
        let (_bus, rx) = EventBus::new(4);
        assert_eq!(rx.recv_timeout(Duration::from_millis(5)).unwrap(), None);
    }

    #[test]
    fn post_timeout_bei_voller_queue() {
        let (bus, _rx) = EventBus::new(1);
        bus.post(Event::UserTap, Duration::from_millis(10)).unwrap();
        let err = bus.post(Event::UserTap, Duration::from_millis(10));
        assert!(matches!(err, Err(VaError::Timeout(_))));
    }

    #[test]
    fn post_from_isr_niemals_blockierend() {
        let (bus, rx) = EventBus::new(1);
        bus.post_from_isr(Event::NetUp);
        bus.post_from_isr(Event::NetDown); // queue voll, wird verworfen, nicht blockierend
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)).unwrap(), Some(Event::NetUp));
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)).unwrap(), None);
    }

    #[test]
    fn bus_von_mehreren_threads_nutzbar() {
        let (bus, rx) = EventBus::new(10);
        let b2 = bus.clone();
        let handle = thread::spawn(move || {
            for _ in 0..5 {
                b2.post(Event::ButtonPress, Duration::from_millis(50)).unwrap();
            }
        });
        handle.join().unwrap();
        let mut count = 0;
        while rx.recv_timeout(Duration::from_millis(10)).unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
    }
}
