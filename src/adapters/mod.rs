//! Device adapters: the AUDAC MTX client and its zone poller

pub mod audac;
pub mod traits;
pub mod zone_poller;

pub use audac::AudacClient;
pub use traits::Startable;
pub use zone_poller::ZonePoller;
