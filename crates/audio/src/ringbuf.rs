//! Bounded Byte-Ring-Buffer (C2)
//!
//! Ein byte-granularer, beschraenkter Puffer mit fristbehafteten
//! `push`/`pop_up_to` Operationen und atomarem `reset`. Sicher fuer genau
//! einen Produzenten und einen Konsumenten gleichzeitig; mehrere
//! Produzenten/Konsumenten serialisieren ueber das interne Lock.
//!
//! Das Lehrer-Repo nutzt fuer die cpal-Callback-Grenze das externe
//! `ringbuf`-Crate, dessen lock-freie API aber keine fristbehaftete
//! Blockierung kennt (siehe `push(bytes, timeout) -> written` /
//! `pop_up_to(max, timeout) -> bytes` in der Spezifikation). Deshalb ist
//! dies eine eigene, auf `parking_lot::Mutex` + `Condvar` aufgebaute
//! Implementierung, im Sperr-Stil der Engine aus `engine.rs` gehalten.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct Inner {
    data: Vec<u8>,
    capacity: usize,
    /// Index des ersten gueltigen Bytes
    head: usize,
    /// Anzahl gueltiger Bytes
    len: usize,
}

impl Inner {
    fn free(&self) -> usize {
        self.capacity - self.len
    }

    fn write_slice(&mut self, bytes: &[u8]) {
        let tail = (self.head + self.len) % self.capacity;
        let first = (self.capacity - tail).min(bytes.len());
        self.data[tail..tail + first].copy_from_slice(&bytes[..first]);
        if first < bytes.len() {
            let rest = bytes.len() - first;
            self.data[..rest].copy_from_slice(&bytes[first..]);
        }
        self.len += bytes.len();
    }

    fn read_slice(&mut self, max: usize) -> Vec<u8> {
        let n = max.min(self.len);
        let mut out = Vec::with_capacity(n);
        let first = (self.capacity - self.head).min(n);
        out.extend_from_slice(&self.data[self.head..self.head + first]);
        if first < n {
            out.extend_from_slice(&self.data[..n - first]);
        }
        self.head = (self.head + n) % self.capacity;
        self.len -= n;
        out
    }
}

/// Bounded byte ring buffer, ein Produzent/ein Konsument pro Instanz.
pub struct RingBuffer {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl RingBuffer {
    /// Erstellt einen Ring-Buffer mit der gegebenen Kapazitaet in Bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                data: vec![0u8; capacity.max(1)],
                capacity: capacity.max(1),
                head: 0,
                len: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Schreibt bis zu `bytes.len()` Bytes, blockiert bis zu `timeout`
    /// falls der Puffer voll ist. Gibt zurueck, wie viele Bytes tatsaechlich
    /// geschrieben wurden (bei Timeout ggf. ein Teilstueck).
    pub fn push(&self, bytes: &[u8], timeout: Duration) -> usize {
        if bytes.is_empty() {
            return 0;
        }
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock();
        let mut written = 0usize;
        while written < bytes.len() {
            if guard.free() == 0 {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                let wait_for = deadline - now;
                let result = self.not_full.wait_for(&mut guard, wait_for);
                if result.timed_out() && guard.free() == 0 {
                    break;
                }
                continue;
            }
            let take = guard.free().min(bytes.len() - written);
            guard.write_slice(&bytes[written..written + take]);
            written += take;
            self.not_empty.notify_all();
        }
        written
    }

    /// Liest bis zu `max` Bytes, blockiert bis zu `timeout` falls der
    /// Puffer leer ist. Liefert 0 Bytes nur bei Ablauf der Frist.
    pub fn pop_up_to(&self, max: usize, timeout: Duration) -> Vec<u8> {
        if max == 0 {
            return Vec::new();
        }
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock();
        while guard.len == 0 {
            let now = Instant::now();
            if now >= deadline {
                return Vec::new();
            }
            let wait_for = deadline - now;
            let result = self.not_empty.wait_for(&mut guard, wait_for);
            if result.timed_out() && guard.len == 0 {
                return Vec::new();
            }
        }
        let out = guard.read_slice(max);
        self.not_full.notify_all();
        out
    }

    /// Leert den Puffer atomar.
    pub fn reset(&self) {
        let mut guard = self.inner.lock();
        guard.head = 0;
        guard.len = 0;
        self.not_full.notify_all();
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_pop_roundtrip() {
        let rb = RingBuffer::new(16);
        let written = rb.push(b"hello", Duration::from_millis(10));
        assert_eq!(written, 5);
        let read = rb.pop_up_to(5, Duration::from_millis(10));
        assert_eq!(read, b"hello");
    }

    #[test]
    fn pop_timeout_liefert_leer() {
        let rb = RingBuffer::new(16);
        let read = rb.pop_up_to(4, Duration::from_millis(5));
        assert!(read.is_empty());
    }

    #[test]
    fn push_timeout_partial_bei_vollem_puffer() {
        let rb = RingBuffer::new(4);
        let written = rb.push(b"abcdef", Duration::from_millis(5));
        assert_eq!(written, 4, "nur 4 Bytes passen in die Kapazitaet");
    }

    #[test]
    fn reset_leert_puffer() {
        let rb = RingBuffer::new(16);
        rb.push(b"data", Duration::from_millis(10));
        rb.reset();
        assert_eq!(rb.len(), 0);
        assert!(rb.is_empty());
    }

    #[test]
    fn wrap_around_funktioniert() {
        let rb = RingBuffer::new(8);
        rb.push(b"abcdef", Duration::from_millis(10));
        let _ = rb.pop_up_to(4, Duration::from_millis(10)); // head nach vorne schieben
        rb.push(b"ghij", Duration::from_millis(10)); // wrap um das Ende
        let rest = rb.pop_up_to(100, Duration::from_millis(10));
        assert_eq!(rest, b"efghij");
    }

    #[test]
    fn produzent_konsument_threads() {
        let rb = Arc::new(RingBuffer::new(64));
        let producer = Arc::clone(&rb);
        let handle = thread::spawn(move || {
            for _ in 0..10 {
                producer.push(&[1u8; 8], Duration::from_millis(200));
            }
        });
        let mut total = 0;
        while total < 80 {
            let chunk = rb.pop_up_to(8, Duration::from_millis(500));
            total += chunk.len();
        }
        handle.join().unwrap();
        assert_eq!(total, 80);
    }
}
