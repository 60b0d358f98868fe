// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Handler trait notified at observation lifecycle transitions.

use std::fmt;

use super::context::{Context, Event};
use crate::error::HandlerError;

/// Pluggable observer of observation lifecycles.
///
/// `supports_context` is asked once per observation, when it starts. A handler
/// that answers `true` receives `on_start` and exactly one terminal callback
/// (`on_stop` or `on_error`); a handler that answers `false` receives nothing
/// for that observation.
///
/// Errors returned from the callbacks are logged and dropped by the dispatcher.
/// They never reach the observed caller and never stop later handlers.
///
/// # Example
///
/// ```rust,ignore
/// use observe::observation::{Context, ObservationHandler};
/// use observe::error::HandlerError;
///
/// struct PrintHandler;
///
/// impl ObservationHandler for PrintHandler {
///     fn on_start(&self, context: &Context) -> Result<(), HandlerError> {
///         println!("start {}", context.name());
///         Ok(())
///     }
///
///     fn on_stop(&self, context: &Context) -> Result<(), HandlerError> {
///         println!("stop {}", context.name());
///         Ok(())
///     }
/// }
/// ```
pub trait ObservationHandler: Send + Sync {
    /// Identity used in failure logs and for [`unregister`](super::ObservationRegistry::unregister).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether this handler wants callbacks for `context`.
    fn supports_context(&self, _context: &Context) -> bool {
        true
    }

    fn on_start(&self, context: &Context) -> Result<(), HandlerError>;

    fn on_stop(&self, context: &Context) -> Result<(), HandlerError>;

    /// Terminal callback for the error path. The cause is in [`Context::error`].
    fn on_error(&self, _context: &Context) -> Result<(), HandlerError> {
        Ok(())
    }

    fn on_event(&self, _event: &Event, _context: &Context) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Lifecycle phase being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase<'a> {
    Start,
    Stop,
    Error,
    Event(&'a Event),
}

impl Phase<'_> {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Stop => "stop",
            Phase::Error => "error",
            Phase::Event(_) => "event",
        }
    }

    pub(crate) fn invoke(
        &self,
        handler: &dyn ObservationHandler,
        context: &Context,
    ) -> Result<(), HandlerError> {
        match self {
            Phase::Start => handler.on_start(context),
            Phase::Stop => handler.on_stop(context),
            Phase::Error => handler.on_error(context),
            Phase::Event(event) => handler.on_event(event, context),
        }
    }
}

impl fmt::Display for Phase<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Minimal;

    impl ObservationHandler for Minimal {
        fn on_start(&self, _context: &Context) -> Result<(), HandlerError> {
            Ok(())
        }

        fn on_stop(&self, _context: &Context) -> Result<(), HandlerError> {
            Err(HandlerError::failed("stop"))
        }
    }

    #[test]
    fn test_defaults() {
        let handler = Minimal;
        let ctx = Context::new("op", "");
        assert!(handler.name().ends_with("Minimal"));
        assert!(handler.supports_context(&ctx));
        assert!(handler.on_error(&ctx).is_ok());
        assert!(handler.on_event(&Event::new("tick"), &ctx).is_ok());
    }

    #[test]
    fn test_phase_invoke_routes_callbacks() {
        let handler = Minimal;
        let ctx = Context::new("op", "");
        assert!(Phase::Start.invoke(&handler, &ctx).is_ok());
        assert!(Phase::Stop.invoke(&handler, &ctx).is_err());
        assert_eq!(Phase::Event(&Event::new("tick")).to_string(), "event");
    }
}
