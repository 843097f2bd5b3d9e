//! # Events Module
//!
//! Event-driven progress reporting for the sync engine.
//!
//! ## Design
//! The core library emits events through channels, allowing any UI
//! (CLI, GUI, web) to subscribe and display progress.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! // In a separate thread, listen for events
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Fetch(FetchEvent::FileCopied { name, bytes }) => {
//!                 println!("Copied {name} ({bytes} bytes)")
//!             }
//!             Event::Fetch(FetchEvent::FileSkipped { name }) => {
//!                 println!("Already have {name}")
//!             }
//!             _ => {}
//!         }
//!     }
//! });
//!
//! // Run the engine with the sender
//! engine.run_with_events(&device, sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
