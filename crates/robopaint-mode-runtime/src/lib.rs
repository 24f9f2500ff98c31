//! # RoboPaint Mode Runtime
//!
//! Runs one mode against the host: boots it, hands it a [`ModeContext`],
//! routes host events to its [`ModeCallbacks`] and mediates the close
//! handshake.
//!
//! Everything here is single-threaded. Capabilities are plain `FnMut`
//! closures and may hold `Rc` state; drive the coordinator on a
//! current-thread runtime.
//!
//! ```ignore
//! let mut coordinator = boot(&options, backend, &prerequisites, page, callbacks, LineTransport::stdio()).await?;
//! coordinator.start();
//! coordinator.run().await?;
//! ```

pub mod boot;
pub mod callbacks;
pub mod context;
pub mod coordinator;
pub mod transport;

pub use boot::{boot, join_prerequisites, BootOptions, DeviceInfoSource, LibraryLoader, Prerequisites};
pub use callbacks::{CloseAck, ModeCallbacks};
pub use context::{ModeContext, ModeParts, CANCELLED_KEY};
pub use coordinator::Coordinator;
pub use transport::{channel_pair, ChannelTransport, HostChannel, HostEndpoint, LineTransport};
