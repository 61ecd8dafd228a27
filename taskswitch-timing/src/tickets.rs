/// Named, timestamped events registered at offsets relative to trial start.
/// State transitions query `before`/`after` against the elapsed trial time
/// instead of sleeping, so a trial can be replayed under a simulated clock.
#[derive(Debug, Clone)]
pub struct TicketSchedule<K> {
    tickets: Vec<(K, u64)>,
}

impl<K: Copy + PartialEq> TicketSchedule<K> {
    pub fn new() -> Self {
        Self {
            tickets: Vec::new(),
        }
    }

    /// Registers `key` at `offset_ns` from trial start. Re-registering a
    /// key replaces its old offset.
    pub fn register(&mut self, key: K, offset_ns: u64) {
        if let Some(slot) = self.tickets.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = offset_ns;
        } else {
            self.tickets.push((key, offset_ns));
        }
    }

    pub fn offset_ns(&self, key: K) -> Option<u64> {
        self.tickets
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, off)| *off)
    }

    /// True while `elapsed_ns` has not yet reached the ticket. Unknown
    /// tickets are never "before".
    pub fn before(&self, key: K, elapsed_ns: u64) -> bool {
        self.offset_ns(key).is_some_and(|off| elapsed_ns < off)
    }

    /// True once `elapsed_ns` has reached or passed the ticket.
    pub fn after(&self, key: K, elapsed_ns: u64) -> bool {
        self.offset_ns(key).is_some_and(|off| elapsed_ns >= off)
    }

    /// True while elapsed time sits at or past `a` but not yet at `b`.
    pub fn between(&self, a: K, b: K, elapsed_ns: u64) -> bool {
        self.after(a, elapsed_ns) && self.before(b, elapsed_ns)
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

impl<K: Copy + PartialEq> Default for TicketSchedule<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Ev {
        On,
        Off,
    }

    #[test]
    fn before_and_after_pivot_on_the_offset() {
        let mut sched = TicketSchedule::new();
        sched.register(Ev::On, 1_000);
        sched.register(Ev::Off, 2_000);

        assert!(sched.before(Ev::On, 999));
        assert!(!sched.before(Ev::On, 1_000));
        assert!(sched.after(Ev::On, 1_000));
        assert!(sched.between(Ev::On, Ev::Off, 1_500));
        assert!(!sched.between(Ev::On, Ev::Off, 2_000));
    }

    #[test]
    fn zero_width_window_never_opens() {
        let mut sched = TicketSchedule::new();
        sched.register(Ev::On, 500);
        sched.register(Ev::Off, 500);
        for t in [0, 499, 500, 501, 1_000] {
            assert!(!sched.between(Ev::On, Ev::Off, t));
        }
    }

    #[test]
    fn re_registering_replaces_the_offset() {
        let mut sched = TicketSchedule::new();
        sched.register(Ev::On, 100);
        sched.register(Ev::On, 300);
        assert_eq!(sched.len(), 1);
        assert_eq!(sched.offset_ns(Ev::On), Some(300));
    }
}
