//! Browser side of a Vigil scan.
//!
//! Drives Chromium through isolated browsing contexts, applies persona
//! emulation to each page and lends contexts out from a fixed-size pool.

pub mod engine;
pub mod error;
pub mod location;
pub mod persona;
pub mod pool;
pub mod provider;
pub mod session;

pub use engine::ChromiumEngine;
pub use error::{BrowserError, PersonaError, PoolError, Result};
pub use persona::{AccessibilityMode, Persona, PersonaRegistry, ProxySpec, SessionParams, Viewport};
pub use pool::{ContextPool, PooledContext};
pub use provider::{ContextProvider, EphemeralProvider, PooledProvider};
pub use session::{BrowsingContext, ContextFactory, PageSession};
