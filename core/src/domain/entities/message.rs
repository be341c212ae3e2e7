//! Rendered notification message.

/// A fully rendered message, ready for a transport
///
/// The body carries the plaintext code, so `Debug` prints only its length.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    to: String,
    subject: String,
    body: String,
}

impl Message {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("to", &self.to)
            .field("subject", &self.subject)
            .field("body", &format_args!("<redacted {} bytes>", self.body.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_body() {
        let message = Message::new("jane@example.com", "Your code", "Your code is 482913");
        let debug = format!("{:?}", message);
        assert!(debug.contains("jane@example.com"));
        assert!(!debug.contains("482913"));
        assert!(debug.contains("redacted"));
    }
}
