// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

type BoxedError = dyn core::error::Error + Send + Sync + 'static;

/// A captured failure.
///
/// This is what travels through [`Outcome::Failure`](crate::Outcome::Failure): any error type, a
/// plain message, or the payload of a panic raised by a continuation. Clones share the same
/// underlying error, [`PartialEq`] compares identity.
#[derive(Clone)]
pub struct Failure(Arc<BoxedError>);

/// The failure stored when a continuation panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panicked {
    message: String,
}

#[derive(Debug)]
struct Message(String);

// === impl Failure ===

impl Failure {
    pub fn new<E>(err: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(err))
    }

    /// A failure carrying nothing but `msg`.
    pub fn msg(msg: impl Into<String>) -> Self {
        Self::new(Message(msg.into()))
    }

    /// Captures the payload of a caught panic.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "Box<dyn Any>".to_string()
        };

        Self::new(Panicked { message })
    }

    /// Returns a reference to the inner error if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: core::error::Error + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Returns `true` if the inner error is of type `E`.
    pub fn is<E>(&self) -> bool
    where
        E: core::error::Error + 'static,
    {
        self.0.is::<E>()
    }

    pub fn as_error(&self) -> &(dyn core::error::Error + Send + Sync + 'static) {
        &*self.0
    }

    /// Whether the failure was produced by a panicking continuation.
    pub fn is_panic(&self) -> bool {
        self.is::<Panicked>()
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Failure").field(&self.0).finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl PartialEq for Failure {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Failure {}

impl<E> From<E> for Failure
where
    E: core::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::new(err)
    }
}

// === impl Panicked ===

impl Panicked {
    /// The panic message, or `"Box<dyn Any>"` for payloads that are not strings.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Panicked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "continuation panicked: {}", self.message)
    }
}

impl core::error::Error for Panicked {}

// === impl Message ===

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl core::error::Error for Message {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn downcast() {
        let failure = Failure::new(Error::Timeout);
        assert!(failure.is::<Error>());
        assert_eq!(failure.downcast_ref::<Error>(), Some(&Error::Timeout));
        assert!(!failure.is_panic());
    }

    #[test]
    fn identity() {
        let a = Failure::msg("boom");
        let b = a.clone();
        let c = Failure::msg("boom");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "boom");
    }

    #[test]
    fn panic_payloads() {
        let failure = Failure::from_panic(Box::new("static str"));
        assert_eq!(
            failure.downcast_ref::<Panicked>().unwrap().message(),
            "static str"
        );

        let failure = Failure::from_panic(Box::new(String::from("owned")));
        assert_eq!(failure.to_string(), "continuation panicked: owned");

        let failure = Failure::from_panic(Box::new(42_u32));
        assert!(failure.is_panic());
    }
}
