//! # Dispatch URL parsing.
//!
//! A dispatch URL has the form `"<scheme>:<command>[#<argument>]"`:
//!
//! - `scheme` — namespace of the command vocabulary (e.g. `wm`)
//! - `command` — identifier looked up in the router's handler table
//! - `argument` — optional, percent-encoded; defaults to the empty string
//!
//! The argument is percent-decoded as UTF-8. A decode failure is not a hard
//! failure: the argument degrades to the empty string and the caller reports
//! it (taxonomy: decode errors are logged, processing continues).

use thiserror::Error;

/// Errors for inputs that do not match `scheme:command#argument` at all.
///
/// These abort resolution (there is no command to route to), unlike decode
/// failures, which merely empty the argument.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UrlError {
    /// The input has no `:` separator.
    #[error("dispatch url {url:?} has no scheme separator")]
    MissingScheme {
        /// The offending input.
        url: String,
    },

    /// The command part between `:` and `#` is empty.
    #[error("dispatch url {url:?} has an empty command")]
    EmptyCommand {
        /// The offending input.
        url: String,
    },
}

/// A parsed dispatch URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchUrl {
    /// Command namespace (the part before `:`).
    pub scheme: String,
    /// Command identifier (between `:` and `#`).
    pub command: String,
    /// Decoded argument; empty when absent or undecodable.
    pub argument: String,
    decode_failed: bool,
}

impl DispatchUrl {
    /// Parses `raw` into scheme, command, and decoded argument.
    ///
    /// # Example
    /// ```
    /// use formwork::DispatchUrl;
    ///
    /// let url = DispatchUrl::parse("wm:openTemplate#mein%20Brief").unwrap();
    /// assert_eq!(url.command, "openTemplate");
    /// assert_eq!(url.argument, "mein Brief");
    ///
    /// let url = DispatchUrl::parse("wm:openTemplate").unwrap();
    /// assert_eq!(url.argument, "");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let (scheme, rest) = raw.split_once(':').ok_or_else(|| UrlError::MissingScheme {
            url: raw.to_string(),
        })?;

        let (command, raw_argument) = match rest.split_once('#') {
            Some((command, argument)) => (command, Some(argument)),
            None => (rest, None),
        };
        if command.is_empty() {
            return Err(UrlError::EmptyCommand {
                url: raw.to_string(),
            });
        }

        let (argument, decode_failed) = match raw_argument {
            None => (String::new(), false),
            Some(enc) => match urlencoding::decode(enc) {
                Ok(decoded) => (decoded.into_owned(), false),
                Err(_) => (String::new(), true),
            },
        };

        Ok(Self {
            scheme: scheme.to_string(),
            command: command.to_string(),
            argument,
            decode_failed,
        })
    }

    /// True when the argument failed to decode and was replaced by `""`.
    pub fn decode_failed(&self) -> bool {
        self.decode_failed
    }
}
