pub mod area;
pub mod change_log;
pub mod entity;
pub mod person;
pub mod roster;
pub mod session;
pub mod source;
pub mod tour;

pub use area::{Area, TourLocations};
pub use change_log::{ChangeLog, ChangeType, FieldChange};
pub use entity::EntityKind;
pub use person::Person;
pub use roster::{BreakSlot, PushError, Roster, RosterKey};
pub use session::Session;
pub use source::{ChangeSource, SourceRowState};
pub use tour::{Bikes, Tour};
