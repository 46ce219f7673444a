//! Default deny lists, denied unless explicitly overridden via `!`/`!!`.

pub(crate) const SYSTEM_PACKAGE_PREFIXES: &[&str] = &["java", "javax", "sun", "jdk/internal"];
