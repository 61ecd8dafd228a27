pub mod tickets;
pub mod timer;

pub use tickets::TicketSchedule;
pub use timer::{CalibrationStats, HighPrecisionTimer, SimTimer, Timer};
