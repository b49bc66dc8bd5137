//! Built-in rule tables
//!
//! Card templates mix HTML, CSS and JavaScript in one document, so a
//! single table covers all three.

mod template;

pub use template::template_rules;
