//! Escaping for values placed into SOAP request envelopes.
//!
//! Every caller-provided value (member names, process ids, credentials)
//! MUST go through [`xml::escape`] before being written into an envelope.
//!
//! ```rust
//! use sforge_client::security::xml;
//!
//! let member = xml::escape("Account<Test>");
//! let element = format!("<met:members>{}</met:members>", member);
//! assert_eq!(element, "<met:members>Account&lt;Test&gt;</met:members>");
//! ```

/// XML escaping utilities.
pub mod xml {
    /// Escape a string for safe inclusion in XML content.
    ///
    /// This escapes the five predefined XML entities.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sforge_client::security::xml;
    ///
    /// let safe = xml::escape("Hello <World> & 'Friends'");
    /// assert_eq!(safe, "Hello &lt;World&gt; &amp; &apos;Friends&apos;");
    /// ```
    #[must_use]
    pub fn escape(value: &str) -> String {
        let mut escaped = String::with_capacity(value.len() + 16);
        for ch in value.chars() {
            match ch {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&apos;"),
                _ => escaped.push(ch),
            }
        }
        escaped
    }
}
